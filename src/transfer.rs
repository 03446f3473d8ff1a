//! Per-item transfer: pull the kernel with the source identity, rewrite its
//! ownership metadata, push it with the destination identity. One failure
//! here never aborts the batch; everything comes back as a TransferError.

use crate::command::CommandRunner;
use crate::config::{MirrorConfig, MirrorItem};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const METADATA_FILE: &str = "kernel-metadata.json";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to write CLI credentials: {0}")]
    Credentials(#[source] std::io::Error),
    #[error("failed to prepare workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("pull failed: {0}")]
    Pull(String),
    #[error("metadata file not found after pull")]
    MissingMetadata,
    #[error("failed to rewrite metadata: {0}")]
    Metadata(String),
    #[error("push failed: {0}")]
    Push(String),
}

/// Transient per-item working directory. Removing it on drop guarantees the
/// cleanup invariant on every exit path, early returns included.
struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Removes any stale directory for this item, then creates a fresh one.
    fn create(root: &Path, kernel_name: &str) -> Result<Self, TransferError> {
        let path = root.join(format!("temp_{kernel_name}"));
        if path.exists() {
            fs::remove_dir_all(&path).map_err(TransferError::Workspace)?;
            debug!(path = %path.display(), "Removed stale workspace");
        }
        fs::create_dir_all(&path).map_err(TransferError::Workspace)?;
        Ok(Workspace { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        // Best effort; a failure to remove must not mask the real outcome.
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if self.path.exists() {
                warn!(error = ?e, path = %self.path.display(), "Failed to remove workspace");
            }
        } else {
            debug!(path = %self.path.display(), "Removed workspace");
        }
    }
}

/// Copy one kernel from the source account to the destination account.
/// Returns the public URL of the pushed kernel on success.
pub async fn execute(
    config: &MirrorConfig,
    runner: &dyn CommandRunner,
    item: &MirrorItem,
) -> Result<String, TransferError> {
    info!(kernel = %item.kernel_name, source_slug = %item.source_slug, "Starting transfer");

    // Pull acts as the source account.
    crate::credentials::apply(&config.source_account, &config.credentials_path)
        .map_err(TransferError::Credentials)?;

    let workspace = Workspace::create(&config.workspace_root, &item.kernel_name)?;

    let pull_cmd = format!(
        "{} kernels pull {} -p {} -m",
        config.cli_bin,
        item.source_slug,
        workspace.path().display()
    );
    let pulled = runner.run(&pull_cmd, None).await;
    if !pulled.success {
        error!(
            kernel = %item.kernel_name,
            stderr = %truncate(&pulled.stderr, 200),
            "Pull failed"
        );
        return Err(TransferError::Pull(truncate(&pulled.stderr, 200)));
    }
    info!(kernel = %item.kernel_name, "Pull successful");

    let title = rewrite_metadata(workspace.path(), item)?;
    info!(kernel = %item.kernel_name, title = %title, "Metadata updated");

    // Push acts as the destination account and reads the metadata file from
    // its working directory, so the child runs inside the workspace.
    crate::credentials::apply(&config.dest_account, &config.credentials_path)
        .map_err(TransferError::Credentials)?;

    let push_cmd = format!("{} kernels push", config.cli_bin);
    let pushed = runner
        .run(&push_cmd, Some(workspace.path().to_path_buf()))
        .await;
    if !pushed.success {
        error!(
            kernel = %item.kernel_name,
            stderr = %truncate(&pushed.stderr, 200),
            "Push failed"
        );
        return Err(TransferError::Push(truncate(&pushed.stderr, 200)));
    }

    let url = format!("https://www.kaggle.com/code/{}", item.dest_slug);
    info!(kernel = %item.kernel_name, url = %url, "Push successful");
    Ok(url)
}

/// Overwrites `id`, `slug` and `title` in the pulled metadata descriptor,
/// preserving every other field, and writes it back pretty-printed.
/// Returns the stamped title.
fn rewrite_metadata(workspace: &Path, item: &MirrorItem) -> Result<String, TransferError> {
    let metadata_path = workspace.join(METADATA_FILE);
    if !metadata_path.exists() {
        error!(path = %metadata_path.display(), "Metadata file not found after pull");
        return Err(TransferError::MissingMetadata);
    }

    let raw = fs::read_to_string(&metadata_path)
        .map_err(|e| TransferError::Metadata(e.to_string()))?;
    let mut metadata: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| TransferError::Metadata(e.to_string()))?;

    let obj = metadata
        .as_object_mut()
        .ok_or_else(|| TransferError::Metadata("descriptor is not a JSON object".into()))?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let title = format!("{}-{}", item.kernel_name, timestamp);
    obj.insert("id".into(), serde_json::Value::String(item.dest_slug.clone()));
    obj.insert(
        "slug".into(),
        serde_json::Value::String(item.kernel_name.clone()),
    );
    obj.insert("title".into(), serde_json::Value::String(title.clone()));

    let pretty = serde_json::to_string_pretty(&metadata)
        .map_err(|e| TransferError::Metadata(e.to_string()))?;
    fs::write(&metadata_path, pretty).map_err(|e| TransferError::Metadata(e.to_string()))?;

    Ok(title)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
