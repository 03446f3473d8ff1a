use async_trait::async_trait;
use kernel_mirror::command::{CommandOutput, CommandRunner};
use kernel_mirror::config::{Account, MirrorConfig, MirrorItem};
use kernel_mirror::mirror::mirror_all;
use kernel_mirror::transfer::METADATA_FILE;
use serial_test::serial;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// One recorded external-command invocation, with enough context to assert
/// on credential sequencing and workspace contents at call time.
struct Invocation {
    command: String,
    cwd: Option<PathBuf>,
    at: Instant,
    /// Active identity (the credential file's username) when the call ran.
    identity: Option<String>,
    /// Descriptor contents visible to a push in its working directory.
    descriptor: Option<String>,
}

type Behavior = Box<dyn Fn(&str, Option<&Path>) -> CommandOutput + Send + Sync>;

/// Scripted stand-in for the platform CLI, recording every invocation.
struct FakeRunner {
    credentials_path: PathBuf,
    calls: Mutex<Vec<Invocation>>,
    behavior: Behavior,
}

impl FakeRunner {
    fn new(credentials_path: PathBuf, behavior: Behavior) -> Self {
        Self {
            credentials_path,
            calls: Mutex::new(Vec::new()),
            behavior,
        }
    }

    fn pull_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.command.contains("kernels pull"))
            .map(|c| c.command.clone())
            .collect()
    }

    fn push_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.command.contains("kernels push"))
            .count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str, cwd: Option<PathBuf>) -> CommandOutput {
        let identity = std::fs::read_to_string(&self.credentials_path)
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|v| v["username"].as_str().map(str::to_string));
        let descriptor = cwd
            .as_deref()
            .and_then(|dir| std::fs::read_to_string(dir.join(METADATA_FILE)).ok());
        let output = (self.behavior)(command, cwd.as_deref());
        self.calls.lock().unwrap().push(Invocation {
            command: command.to_string(),
            cwd,
            at: Instant::now(),
            identity,
            descriptor,
        });
        output
    }
}

fn ok() -> CommandOutput {
    CommandOutput {
        success: true,
        stdout: String::new(),
        stderr: String::new(),
    }
}

/// Extracts the workspace path from a `kernels pull ... -p <path> -m` command.
fn workspace_from_pull(command: &str) -> PathBuf {
    let rest = command
        .split(" -p ")
        .nth(1)
        .expect("pull command carries a -p flag");
    PathBuf::from(rest.trim_end_matches(" -m"))
}

/// Writes a plausible pulled descriptor into the workspace.
fn seed_descriptor(workspace: &Path, source_slug: &str) {
    let descriptor = serde_json::json!({
        "id": source_slug,
        "slug": source_slug.split('/').last().unwrap(),
        "title": "Original Title",
        "language": "python",
        "kernel_type": "notebook",
        "is_private": true,
    });
    std::fs::write(workspace.join(METADATA_FILE), descriptor.to_string()).unwrap();
}

fn test_config(dir: &TempDir, items: Vec<MirrorItem>, delay: Duration) -> MirrorConfig {
    MirrorConfig {
        source_account: Account {
            username: "src-user".into(),
            key: "src-key".into(),
        },
        dest_account: Account {
            username: "dst-user".into(),
            key: "dst-key".into(),
        },
        items,
        cli_bin: "kaggle".into(),
        credentials_path: dir.path().join("kaggle.json"),
        workspace_root: dir.path().join("work"),
        delay_between_items: delay,
        command_timeout: Duration::from_secs(5),
    }
}

fn item(name: &str) -> MirrorItem {
    MirrorItem {
        source_slug: format!("src-user/{name}"),
        kernel_name: name.into(),
        dest_slug: format!("dst-user/{name}"),
    }
}

#[tokio::test]
async fn pull_failure_short_circuits_push() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, vec![item("alpha")], Duration::ZERO);

    let runner = FakeRunner::new(
        config.credentials_path.clone(),
        Box::new(|cmd, _| {
            assert!(cmd.contains("kernels pull"), "only pull should run");
            CommandOutput::failure("403 Forbidden")
        }),
    );

    let report = mirror_all(&config, &runner).await;

    assert_eq!(report.total, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.results[0].success);
    assert_eq!(runner.push_count(), 0);
    // Cleanup invariant holds on the failure path too.
    assert!(!config.workspace_root.join("temp_alpha").exists());
}

#[tokio::test]
async fn successful_transfer_rewrites_descriptor_and_switches_identity() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, vec![item("alpha")], Duration::ZERO);

    let runner = FakeRunner::new(
        config.credentials_path.clone(),
        Box::new(|cmd, _| {
            if cmd.contains("kernels pull") {
                seed_descriptor(&workspace_from_pull(cmd), "src-user/alpha");
            }
            ok()
        }),
    );

    let report = mirror_all(&config, &runner).await;

    assert_eq!(report.successful, 1);
    assert!(report.results[0].success);
    assert_eq!(report.results[0].notebook, "alpha");

    let calls = runner.calls.lock().unwrap();
    let pull = calls
        .iter()
        .find(|c| c.command.contains("kernels pull"))
        .unwrap();
    let push = calls
        .iter()
        .find(|c| c.command.contains("kernels push"))
        .unwrap();

    // Pull acts as the source account, push as the destination account.
    assert_eq!(pull.identity.as_deref(), Some("src-user"));
    assert_eq!(push.identity.as_deref(), Some("dst-user"));

    // Push runs inside the workspace and sees the rewritten descriptor.
    let workspace = config.workspace_root.join("temp_alpha");
    assert_eq!(push.cwd.as_deref(), Some(workspace.as_path()));
    let descriptor: serde_json::Value =
        serde_json::from_str(push.descriptor.as_deref().unwrap()).unwrap();
    assert_eq!(descriptor["id"], "dst-user/alpha");
    assert_eq!(descriptor["slug"], "alpha");
    let title = descriptor["title"].as_str().unwrap();
    assert!(title.starts_with("alpha-"));
    // Fields the worker does not own survive verbatim.
    assert_eq!(descriptor["language"], "python");
    assert_eq!(descriptor["is_private"], true);

    drop(calls);
    // Workspace never outlives the worker call.
    assert!(!workspace.exists());
}

#[tokio::test]
async fn missing_descriptor_fails_item_without_push() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, vec![item("alpha")], Duration::ZERO);

    // Pull reports success but produces no descriptor.
    let runner = FakeRunner::new(config.credentials_path.clone(), Box::new(|_, _| ok()));

    let report = mirror_all(&config, &runner).await;

    assert_eq!(report.failed, 1);
    assert!(!report.results[0].success);
    assert_eq!(runner.push_count(), 0);
    assert!(!config.workspace_root.join("temp_alpha").exists());
}

#[tokio::test]
async fn mixed_batch_reports_counts_in_configured_order() {
    let dir = TempDir::new().unwrap();
    let config = test_config(
        &dir,
        vec![item("first"), item("second")],
        Duration::from_millis(10),
    );

    let runner = FakeRunner::new(
        config.credentials_path.clone(),
        Box::new(|cmd, _| {
            if cmd.contains("kernels pull") {
                if cmd.contains("src-user/first") {
                    return CommandOutput::failure("pull exploded");
                }
                seed_descriptor(&workspace_from_pull(cmd), "src-user/second");
            }
            ok()
        }),
    );

    let report = mirror_all(&config, &runner).await;

    assert_eq!(report.total, 2);
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.successful + report.failed, report.total);
    assert_eq!(report.results[0].notebook, "first");
    assert!(!report.results[0].success);
    assert_eq!(report.results[1].notebook, "second");
    assert!(report.results[1].success);
    assert_eq!(report.status, "completed");
}

#[tokio::test]
#[serial]
async fn delay_elapses_between_consecutive_items_but_not_after_last() {
    let dir = TempDir::new().unwrap();
    let delay = Duration::from_millis(150);
    let config = test_config(&dir, vec![item("first"), item("second")], delay);

    let runner = FakeRunner::new(
        config.credentials_path.clone(),
        Box::new(|_, _| CommandOutput::failure("nope")),
    );

    let started = Instant::now();
    let report = mirror_all(&config, &runner).await;
    let elapsed = started.elapsed();

    assert_eq!(report.total, 2);
    // One inter-item pause, none after the last item.
    assert!(elapsed >= delay, "batch finished before the pause: {elapsed:?}");
    assert!(
        elapsed < delay * 2,
        "unexpected pause after the last item: {elapsed:?}"
    );

    let pulls: Vec<Instant> = runner
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.command.contains("kernels pull"))
        .map(|c| c.at)
        .collect();
    assert_eq!(pulls.len(), 2);
    assert!(pulls[1].duration_since(pulls[0]) >= delay);
}

#[tokio::test]
async fn every_item_fails_when_commands_always_time_out() {
    let dir = TempDir::new().unwrap();
    let config = test_config(
        &dir,
        vec![item("a"), item("b"), item("c")],
        Duration::from_millis(10),
    );

    let runner = FakeRunner::new(
        config.credentials_path.clone(),
        Box::new(|_, _| CommandOutput::failure("Timeout")),
    );

    let report = mirror_all(&config, &runner).await;

    assert_eq!(report.total, 3);
    assert_eq!(report.successful, 0);
    assert_eq!(report.failed, 3);
    assert_eq!(runner.pull_calls().len(), 3);
    assert_eq!(runner.push_count(), 0);
    for name in ["a", "b", "c"] {
        assert!(!config.workspace_root.join(format!("temp_{name}")).exists());
    }
}
