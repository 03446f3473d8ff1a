//! Sole boundary between the orchestration logic and external processes.
//!
//! All external-tool failures surface here as ordinary results: a non-zero
//! exit, a spawn error and a timeout all come back as `success == false`
//! with the detail in `stderr`. Nothing in this module returns `Err`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Captured outcome of one external command invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn failure(stderr: impl Into<String>) -> Self {
        CommandOutput {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Trait for running external commands. Implemented by [`ShellRunner`] in
/// production and by mocks/fakes in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute a shell command string, optionally with a working directory
    /// for the child process. Never errors; inspect `success`.
    async fn run(&self, command: &str, cwd: Option<PathBuf>) -> CommandOutput;
}

/// Runs commands through `sh -c` with a bounded timeout.
pub struct ShellRunner {
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, cwd: Option<PathBuf>) -> CommandOutput {
        debug!(command = %command, cwd = ?cwd, "Running external command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cwd {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(error = ?e, command = %command, "Failed to spawn external command");
                return CommandOutput::failure(e.to_string());
            }
            Err(_) => {
                error!(
                    command = %command,
                    timeout_secs = self.timeout.as_secs(),
                    "External command timed out"
                );
                return CommandOutput::failure("Timeout");
            }
        };

        let result = CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(
            command = %command,
            success = result.success,
            "External command finished"
        );
        result
    }
}
