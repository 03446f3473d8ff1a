//! Coordinating module for the pull-rewrite-push batch.

use crate::command::CommandRunner;
use crate::config::MirrorConfig;
use crate::transfer;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

/// Outcome for a single configured kernel, in configured order.
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub notebook: String,
    pub success: bool,
}

/// Summary of one full pass over all configured kernels. Serialised
/// verbatim as the trigger endpoint's response body.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    pub status: String,
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub duration_seconds: f64,
    pub timestamp: String,
    pub results: Vec<ItemResult>,
}

/// Run the transfer worker over every configured item in order, pausing the
/// configured delay between consecutive items. Worker failures are already
/// converted to results upstream; this never errors.
pub async fn mirror_all(config: &MirrorConfig, runner: &dyn CommandRunner) -> MirrorReport {
    let started = std::time::Instant::now();
    info!(items = config.items.len(), "Batch started");

    let mut results = Vec::with_capacity(config.items.len());
    for (i, item) in config.items.iter().enumerate() {
        let success = match transfer::execute(config, runner, item).await {
            Ok(url) => {
                info!(kernel = %item.kernel_name, url = %url, "Transfer succeeded");
                true
            }
            Err(e) => {
                error!(
                    kernel = %item.kernel_name,
                    error = %transfer::truncate(&e.to_string(), 200),
                    "Transfer failed"
                );
                false
            }
        };
        results.push(ItemResult {
            notebook: item.kernel_name.clone(),
            success,
        });

        if i < config.items.len() - 1 {
            info!(delay_secs = config.delay_between_items.as_secs_f64(), "Pausing between items");
            tokio::time::sleep(config.delay_between_items).await;
        }
    }

    let successful = results.iter().filter(|r| r.success).count();
    let failed = results.len() - successful;
    let duration = started.elapsed().as_secs_f64();

    info!(
        successful = successful,
        failed = failed,
        total = results.len(),
        duration_seconds = duration,
        "Batch completed"
    );

    MirrorReport {
        status: "completed".to_string(),
        successful,
        failed,
        total: results.len(),
        duration_seconds: (duration * 100.0).round() / 100.0,
        timestamp: Utc::now().to_rfc3339(),
        results,
    }
}
