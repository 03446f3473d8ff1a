//! Writes the active account's credentials to the file the platform CLI
//! reads on every invocation. Identity is global process state keyed by
//! this file, so this must run immediately before any identity-scoped
//! CLI call.

use crate::config::Account;
use serde_json::json;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{error, info};

/// Persist `account` to `path`, overwriting any prior identity. The file is
/// restricted to owner read/write.
pub fn apply(account: &Account, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let payload = json!({
        "username": account.username,
        "key": account.key,
    });
    fs::write(path, payload.to_string())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    info!(username = %account.username, path = ?path, "Configured CLI credentials");
    Ok(())
}

/// Like [`apply`], but logs instead of propagating. Used at startup where a
/// failure should not abort the server.
pub fn apply_best_effort(account: &Account, path: &Path) {
    if let Err(e) = apply(account, path) {
        error!(error = ?e, path = ?path, "Failed to write CLI credentials");
    }
}
