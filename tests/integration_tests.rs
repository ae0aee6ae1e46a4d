//! Integration tests for Herald
//!
//! These cover the CLI surface and the streaming pipeline end to end, with
//! real `sh` children standing in for the agent.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use async_trait::async_trait;
use herald::ai::{AgentBackend, BackendKind, CliBackend};
use herald::blocks::{Classifier, FenceClassifier};
use herald::errors::{RunError, SinkError};
use herald::exec::CommandExecutor;
use herald::notify::{
    BatcherOptions, MessageBatcher, NotificationSink, Outbound, SinkAck,
};
use herald::process::{RunOptions, spawn_streaming};
use herald::supervisor::{RunOutcome, RunSupervisor, SupervisorConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Helper to create a herald Command
fn herald() -> Command {
    cargo_bin_cmd!("herald")
}

/// Sink double shared by the pipeline tests.
struct RecordingSink {
    sent: std::sync::Mutex<Vec<String>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, text: &str) -> Result<SinkAck, SinkError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(SinkAck {
            id: "test".into(),
            timestamp: chrono::Utc::now(),
        })
    }
}

fn quick_supervisor(dir: &Path, sink: Arc<RecordingSink>) -> (RunSupervisor, Arc<dyn Outbound>) {
    let outbound: Arc<dyn Outbound> = Arc::new(MessageBatcher::new(
        sink,
        BatcherOptions {
            interval: Duration::from_millis(20),
            max_batch_size: 10,
            summarizer: None,
        },
    ));
    let supervisor = RunSupervisor::new(
        SupervisorConfig {
            silence_threshold: Duration::from_secs(30),
            silence_check_period: Duration::from_secs(10),
            hard_deadline: Duration::from_secs(60),
        },
        Arc::clone(&outbound),
        CommandExecutor::new(dir),
    );
    (supervisor, outbound)
}

fn write_stub_agent(dir: &Path, body: &str) -> String {
    write_dispatching_agent(dir, &format!("cat > /dev/null\n{body}"))
}

/// Stub agent script with full control over how stdin is handled.
fn write_dispatching_agent(dir: &Path, body: &str) -> String {
    let path = dir.join("stub-agent.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }
    path.to_string_lossy().to_string()
}

/// Hand-built configuration: `Config::load` reads process-wide env, which
/// would race with the CLI tests.
fn default_config() -> herald::config::Config {
    herald::config::Config {
        repo_url: None,
        base_branch: "main".to_string(),
        backend: BackendKind::Qwen,
        backend_command: None,
        webhook_url: None,
        thread_id: String::new(),
        delivery: herald::config::DeliveryStrategy::Interval,
        classifier_mode: herald::config::ClassifierMode::Fenced,
        narration_marker: "#>".to_string(),
        silence_threshold: Duration::from_secs(60),
        silence_check_period: Duration::from_secs(30),
        hard_deadline: Duration::from_secs(120),
        batch_interval: Duration::from_millis(20),
        batch_max_size: 10,
        debounce_quiet: Duration::from_millis(20),
        summarize_batches: false,
    }
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;
    use predicates::prelude::*;

    #[test]
    fn test_herald_help() {
        herald().arg("--help").assert().success();
    }

    #[test]
    fn test_herald_version() {
        herald().arg("--version").assert().success();
    }

    #[test]
    fn test_herald_config_shows_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        herald()
            .current_dir(dir.path())
            .env_remove("HERALD_REPO_URL")
            .env_remove("HERALD_BACKEND")
            .arg("config")
            .assert()
            .success()
            .stdout(predicate::str::contains("Herald configuration"))
            .stdout(predicate::str::contains("Claude"));
    }

    #[test]
    fn test_disabled_flag_rejects_tasks() {
        let dir = tempfile::TempDir::new().unwrap();
        herald()
            .current_dir(dir.path())
            .args(["--disabled", "run", "do", "something"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("disabled"));
    }

    #[test]
    fn test_exec_reports_pipeline_summary() {
        let dir = tempfile::TempDir::new().unwrap();
        herald()
            .current_dir(dir.path())
            .args(["exec", "sh", "-c", "echo one narration line"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Completed:"));
    }

    #[test]
    fn test_exec_surfaces_child_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        herald()
            .current_dir(dir.path())
            .args(["exec", "sh", "-c", "exit 3"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("exit code 3"));
    }
}

// =============================================================================
// Streaming pipeline, end to end
// =============================================================================

mod pipeline {
    use super::*;

    #[tokio::test]
    async fn test_narration_commands_and_results_reach_the_sink() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = RecordingSink::new();
        let (supervisor, outbound) = quick_supervisor(dir.path(), sink.clone());

        let script = "printf 'Starting work\\n```bash\\necho done > artifact.txt\\n```\\nWrapping up\\n'";
        let handle = spawn_streaming("sh", &["-c", script], &RunOptions::in_dir(dir.path()))
            .await
            .unwrap();
        let report = supervisor
            .run(handle, Classifier::Fenced(FenceClassifier::new()))
            .await
            .unwrap();
        outbound.drain().await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.commands_run, 1);
        // The nested command really ran in the working directory.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("artifact.txt")).unwrap(),
            "done\n"
        );

        let all = sink.sent().join("\n---\n");
        assert!(all.contains("Starting work"));
        assert!(all.contains("Wrapping up"));
        assert!(all.contains("echo done"));
    }

    #[tokio::test]
    async fn test_commands_execute_in_order_with_failure_isolation() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = RecordingSink::new();
        let (supervisor, outbound) = quick_supervisor(dir.path(), sink.clone());

        let script = "printf '```bash\\necho a >> order.txt\\n```\\n```bash\\nfalse\\n```\\n```bash\\necho c >> order.txt\\n```\\n'";
        let handle = spawn_streaming("sh", &["-c", script], &RunOptions::in_dir(dir.path()))
            .await
            .unwrap();
        let report = supervisor
            .run(handle, Classifier::Fenced(FenceClassifier::new()))
            .await
            .unwrap();
        outbound.drain().await;

        assert_eq!(report.commands_run, 3);
        assert_eq!(report.commands_failed, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("order.txt")).unwrap(),
            "a\nc\n"
        );
    }

    #[tokio::test]
    async fn test_deadline_cuts_off_a_runaway_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = RecordingSink::new();
        let outbound: Arc<dyn Outbound> = Arc::new(MessageBatcher::new(
            sink.clone(),
            BatcherOptions {
                interval: Duration::from_millis(20),
                max_batch_size: 10,
                summarizer: None,
            },
        ));
        let supervisor = RunSupervisor::new(
            SupervisorConfig {
                silence_threshold: Duration::from_secs(30),
                silence_check_period: Duration::from_secs(10),
                hard_deadline: Duration::from_millis(250),
            },
            Arc::clone(&outbound),
            CommandExecutor::new(dir.path()),
        );

        let handle = spawn_streaming(
            "sh",
            &["-c", "while true; do echo spinning; sleep 0.05; done"],
            &RunOptions::in_dir(dir.path()),
        )
        .await
        .unwrap();
        let report = supervisor
            .run(handle, Classifier::Fenced(FenceClassifier::new()))
            .await
            .unwrap();
        outbound.drain().await;

        assert_eq!(report.outcome, RunOutcome::TimedOut);
        let terminal: Vec<_> = sink
            .sent()
            .into_iter()
            .filter(|m| m.contains("time limit"))
            .collect();
        assert_eq!(terminal.len(), 1);
    }

    #[tokio::test]
    async fn test_execute_plan_through_stub_agent() {
        let dir = tempfile::TempDir::new().unwrap();
        let agent = write_stub_agent(
            dir.path(),
            "printf 'Implementing the plan\\n```bash\\necho hi > impl.txt\\n```\\nFinished\\n'",
        );
        let backend = CliBackend::new(BackendKind::Qwen, Some(agent));

        let sink = RecordingSink::new();
        let (supervisor, outbound) = quick_supervisor(dir.path(), sink.clone());
        let report = backend
            .execute_plan(
                "1. write impl.txt",
                dir.path(),
                &supervisor,
                Classifier::Fenced(FenceClassifier::new()),
            )
            .await
            .unwrap();
        outbound.drain().await;

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(dir.path().join("impl.txt").exists());
        assert!(sink.sent().iter().any(|m| m.contains("Implementing the plan")));
    }

    #[tokio::test]
    async fn test_execute_plan_surfaces_agent_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let agent = write_stub_agent(dir.path(), "echo 'partial work'; exit 2");
        let backend = CliBackend::new(BackendKind::Qwen, Some(agent));

        let sink = RecordingSink::new();
        let (supervisor, outbound) = quick_supervisor(dir.path(), sink.clone());
        let err = backend
            .execute_plan(
                "plan",
                dir.path(),
                &supervisor,
                Classifier::Fenced(FenceClassifier::new()),
            )
            .await
            .unwrap_err();
        outbound.drain().await;

        assert!(matches!(err, RunError::AgentFailed { .. }));
        // Output produced before the failure was still relayed.
        assert!(sink.sent().iter().any(|m| m.contains("partial work")));
    }

    #[tokio::test]
    async fn test_full_agent_task_flow_up_to_the_pull_request() {
        // A stub agent that answers each kind of request: branch name, plan,
        // plan execution (with a fenced command), and commit metadata.
        let scratch = tempfile::TempDir::new().unwrap();
        let agent = write_dispatching_agent(
            scratch.path(),
            r#"input=$(cat)
case "$input" in
  *"branch name"*) echo "demo branch" ;;
  *"implementation plan"*) echo "1. Write the greeting file" ;;
  *"execute the following plan"*)
    printf 'Writing the file\n```bash\ngit config user.name test\ngit config user.email test@test.com\necho hello > greeting.txt\n```\nFinished writing\n'
    ;;
  *"pull-request metadata"*)
    echo '{"commit_message": "Add greeting file", "pr_title": "Add greeting", "pr_body": "Adds greeting.txt"}'
    ;;
  *) echo "ok" ;;
esac"#,
        );

        // A local source repository standing in for the remote.
        let source = tempfile::TempDir::new().unwrap();
        for args in [
            vec!["init"],
            vec!["config", "user.name", "test"],
            vec!["config", "user.email", "test@test.com"],
        ] {
            herald::process::run_buffered("git", &args, &RunOptions::in_dir(source.path()))
                .await
                .unwrap();
        }
        std::fs::write(source.path().join("README.md"), "# demo\n").unwrap();
        for args in [vec!["add", "."], vec!["commit", "-m", "initial"]] {
            herald::process::run_buffered("git", &args, &RunOptions::in_dir(source.path()))
                .await
                .unwrap();
        }

        let sink = RecordingSink::new();
        let mut config = default_config();
        config.repo_url = Some(source.path().to_string_lossy().to_string());
        let ctx = herald::agent::TaskContext {
            config,
            backend: Arc::new(CliBackend::new(BackendKind::Qwen, Some(agent))),
            sink: sink.clone(),
            summarizer: None,
        };

        // Everything up to the PR works against local state; `gh` cannot, so
        // the task must fail at exactly that step.
        let err = herald::agent::run_agent_task("add a greeting file", &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open pull request"));

        // The branch was pushed back to the source repository with the commit.
        let log = herald::process::run_buffered(
            "git",
            &["log", "agent/demo-branch", "-1", "--format=%s"],
            &RunOptions::in_dir(source.path()),
        )
        .await
        .unwrap();
        assert_eq!(log.stdout.trim(), "Add greeting file");

        let milestones = sink.sent().join("\n---\n");
        assert!(milestones.contains("Cloned repository successfully."));
        assert!(milestones.contains("agent/demo-branch"));
        assert!(milestones.contains("1. Write the greeting file"));
        assert!(milestones.contains("greeting.txt"));
    }

    #[tokio::test]
    async fn test_agent_task_reports_no_changes() {
        let scratch = tempfile::TempDir::new().unwrap();
        // Whatever it is asked, this agent only ever talks.
        let agent = write_stub_agent(scratch.path(), "echo 'nothing to do'");

        let source = tempfile::TempDir::new().unwrap();
        for args in [
            vec!["init"],
            vec!["config", "user.name", "test"],
            vec!["config", "user.email", "test@test.com"],
        ] {
            herald::process::run_buffered("git", &args, &RunOptions::in_dir(source.path()))
                .await
                .unwrap();
        }
        std::fs::write(source.path().join("README.md"), "# demo\n").unwrap();
        for args in [vec!["add", "."], vec!["commit", "-m", "initial"]] {
            herald::process::run_buffered("git", &args, &RunOptions::in_dir(source.path()))
                .await
                .unwrap();
        }

        let sink = RecordingSink::new();
        let mut config = default_config();
        config.repo_url = Some(source.path().to_string_lossy().to_string());
        let ctx = herald::agent::TaskContext {
            config,
            backend: Arc::new(CliBackend::new(BackendKind::Qwen, Some(agent))),
            sink,
            summarizer: None,
        };

        let summary = herald::agent::run_agent_task("noop request", &ctx)
            .await
            .unwrap();
        assert!(summary.contains("no changes to make"));
    }

    #[tokio::test]
    async fn test_missing_agent_binary_is_a_spawn_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = CliBackend::new(
            BackendKind::Qwen,
            Some("herald-no-such-agent".to_string()),
        );
        let sink = RecordingSink::new();
        let (supervisor, _outbound) = quick_supervisor(dir.path(), sink);

        let err = backend
            .execute_plan(
                "plan",
                dir.path(),
                &supervisor,
                Classifier::Fenced(FenceClassifier::new()),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Runner(herald::errors::RunnerError::Spawn { .. })
        ));
    }
}
