use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// A credential pair the platform CLI uses to act as one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub key: String,
}

/// One configured (source, destination) kernel pair to be copied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorItem {
    pub source_slug: String,
    pub kernel_name: String,
    pub dest_slug: String,
}

/// Static configuration for the whole mirroring process. Immutable once
/// loaded; item order determines processing order.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub source_account: Account,
    pub dest_account: Account,
    pub items: Vec<MirrorItem>,
    /// Binary invoked for pull/push, usually `kaggle`.
    pub cli_bin: String,
    /// Where the CLI reads its credentials on every invocation.
    pub credentials_path: PathBuf,
    /// Parent directory for per-item workspaces.
    pub workspace_root: PathBuf,
    pub delay_between_items: Duration,
    pub command_timeout: Duration,
}

impl MirrorConfig {
    pub fn trace_loaded(&self) {
        info!(
            items_count = self.items.len(),
            source = %self.source_account.username,
            dest = %self.dest_account.username,
            cli_bin = %self.cli_bin,
            "Loaded MirrorConfig"
        );
        for item in &self.items {
            debug!(
                source_slug = %item.source_slug,
                dest_slug = %item.dest_slug,
                "Loaded mirror item"
            );
        }
    }

    /// Default location the CLI reads: `~/.kaggle/kaggle.json`.
    pub fn default_credentials_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".kaggle")
            .join("kaggle.json")
    }
}
