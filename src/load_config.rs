use crate::config::{Account, MirrorConfig, MirrorItem};
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_CLI_BIN: &str = "kaggle";
const DEFAULT_DELAY_SECS: u64 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Deserialize)]
struct StaticConfig {
    source_account: AccountYaml,
    dest_account: AccountYaml,
    #[serde(default)]
    kernels: Vec<KernelYaml>,
    #[serde(default)]
    cli_bin: Option<String>,
    #[serde(default)]
    credentials_path: Option<PathBuf>,
    #[serde(default)]
    workspace_root: Option<PathBuf>,
    #[serde(default)]
    delay_between_items_secs: Option<u64>,
    #[serde(default)]
    command_timeout_secs: Option<u64>,
}

#[derive(Deserialize)]
struct AccountYaml {
    username: String,
    key: String,
}

#[derive(Deserialize)]
struct KernelYaml {
    source_slug: String,
    kernel_name: String,
    dest_slug: String,
}

/// Loads the static YAML config file and merges in defaults for optional
/// fields. Returns a fully populated MirrorConfig or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MirrorConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let static_conf: StaticConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if static_conf.kernels.is_empty() {
        error!(config_path = ?path_ref, "Config declares no kernels to mirror");
        anyhow::bail!("Config declares no kernels to mirror");
    }

    let config = MirrorConfig {
        source_account: Account {
            username: static_conf.source_account.username,
            key: static_conf.source_account.key,
        },
        dest_account: Account {
            username: static_conf.dest_account.username,
            key: static_conf.dest_account.key,
        },
        items: static_conf
            .kernels
            .into_iter()
            .map(|k| MirrorItem {
                source_slug: k.source_slug,
                kernel_name: k.kernel_name,
                dest_slug: k.dest_slug,
            })
            .collect(),
        cli_bin: static_conf
            .cli_bin
            .unwrap_or_else(|| DEFAULT_CLI_BIN.to_string()),
        credentials_path: static_conf
            .credentials_path
            .unwrap_or_else(MirrorConfig::default_credentials_path),
        workspace_root: static_conf.workspace_root.unwrap_or_else(|| PathBuf::from(".")),
        delay_between_items: Duration::from_secs(
            static_conf.delay_between_items_secs.unwrap_or(DEFAULT_DELAY_SECS),
        ),
        command_timeout: Duration::from_secs(
            static_conf.command_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
    };

    config.trace_loaded();

    Ok(config)
}
