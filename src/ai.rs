//! AI backend collaborators: one-shot text generation and plan execution.
//!
//! Backends are CLI invocations of a coding agent. The flavor (argument set)
//! is a configuration variant, not a subclass hierarchy.

use crate::blocks::Classifier;
use crate::errors::{RunError, RunnerError};
use crate::process::{self, ExitOutcome, RunOptions};
use crate::supervisor::{RunOutcome, RunReport, RunSupervisor};
use crate::util::{extract_json_object, slugify, truncate_str};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

/// Which CLI flavor the backend drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Claude,
    Qwen,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "claude" => Ok(BackendKind::Claude),
            "qwen" => Ok(BackendKind::Qwen),
            other => bail!("Unknown backend '{other}' (expected claude or qwen)"),
        }
    }
}

impl BackendKind {
    pub fn default_command(&self) -> &'static str {
        match self {
            BackendKind::Claude => "claude",
            BackendKind::Qwen => "qwen",
        }
    }

    /// Flags for a one-shot generation that must print and exit.
    fn oneshot_args(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Claude => &["--print"],
            BackendKind::Qwen => &[],
        }
    }

    /// Flags for a full implementation run with write access.
    fn exec_args(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Claude => &["--print", "--dangerously-skip-permissions"],
            BackendKind::Qwen => &["-y"],
        }
    }
}

/// Commit and PR metadata for the finished change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitInfo {
    #[serde(alias = "commitMessage")]
    pub commit_message: String,
    #[serde(alias = "prTitle")]
    pub pr_title: String,
    #[serde(alias = "prBody")]
    pub pr_body: String,
}

impl CommitInfo {
    /// Deterministic metadata for when the backend's answer is unusable.
    pub fn fallback(prompt: &str) -> Self {
        Self {
            commit_message: format!("Apply requested change: {}", truncate_str(prompt, 60)),
            pr_title: truncate_str(prompt, 72),
            pr_body: format!("Automated change for the request:\n\n> {prompt}"),
        }
    }
}

/// Capability surface of a text-generating agent backend.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn generate_plan(&self, prompt: &str, cwd: &Path) -> Result<String>;

    /// Never fails: unusable suggestions fall back to a deterministic name.
    async fn generate_branch_name(&self, prompt: &str, cwd: &Path) -> Result<String>;

    /// Never fails: extraction or parse problems fall back to
    /// `CommitInfo::fallback`.
    async fn generate_commit_info(
        &self,
        prompt: &str,
        diff: &str,
        cwd: &Path,
    ) -> Result<CommitInfo>;

    /// Run the implementation through the supervised streaming pipeline.
    async fn execute_plan(
        &self,
        plan: &str,
        cwd: &Path,
        supervisor: &RunSupervisor,
        classifier: Classifier,
    ) -> Result<RunReport, RunError>;
}

/// Drives a coding-agent CLI. One-shot generations run buffered with the
/// prompt piped to stdin; plan execution streams.
#[derive(Debug, Clone)]
pub struct CliBackend {
    kind: BackendKind,
    command: String,
}

impl CliBackend {
    pub fn new(kind: BackendKind, command: Option<String>) -> Self {
        let command = command.unwrap_or_else(|| kind.default_command().to_string());
        Self { kind, command }
    }

    async fn generate(&self, prompt: String, cwd: &Path) -> Result<String, RunnerError> {
        let options = RunOptions::in_dir(cwd).with_stdin(prompt);
        let output = process::run_buffered(&self.command, self.kind.oneshot_args(), &options).await?;
        Ok(output.stdout)
    }
}

#[async_trait]
impl AgentBackend for CliBackend {
    async fn generate_plan(&self, prompt: &str, cwd: &Path) -> Result<String> {
        let planning_prompt = format!(
            "Based on the user request, create a detailed implementation plan. \
             Do not execute any commands or modify any files; only output the plan.\n\n\
             Request:\n{prompt}"
        );
        let plan = self
            .generate(planning_prompt, cwd)
            .await
            .context("Plan generation failed")?;
        Ok(plan.trim().to_string())
    }

    async fn generate_branch_name(&self, prompt: &str, cwd: &Path) -> Result<String> {
        let naming_prompt = format!(
            "Suggest a short git branch name (lowercase, hyphen-separated, no prefix) \
             for this change. Output only the name.\n\nChange:\n{prompt}"
        );
        let suggestion = match self.generate(naming_prompt, cwd).await {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(|line| slugify(line, 40))
                .unwrap_or_default(),
            Err(err) => {
                warn!(err = %err, "branch name generation failed");
                String::new()
            }
        };

        if suggestion.is_empty() {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            Ok(format!("agent/{}-{}", slugify(prompt, 24), &suffix[..8]))
        } else {
            Ok(format!("agent/{suggestion}"))
        }
    }

    async fn generate_commit_info(
        &self,
        prompt: &str,
        diff: &str,
        cwd: &Path,
    ) -> Result<CommitInfo> {
        let metadata_prompt = format!(
            "Write commit and pull-request metadata for the staged change below. \
             Output a JSON object with keys commit_message, pr_title and pr_body, \
             and nothing else.\n\nUser request:\n{prompt}\n\nStaged diff:\n{diff}"
        );
        let info = match self.generate(metadata_prompt, cwd).await {
            Ok(text) => parse_commit_info(&text),
            Err(err) => {
                warn!(err = %err, "commit metadata generation failed");
                None
            }
        };
        Ok(info.unwrap_or_else(|| CommitInfo::fallback(prompt)))
    }

    async fn execute_plan(
        &self,
        plan: &str,
        cwd: &Path,
        supervisor: &RunSupervisor,
        classifier: Classifier,
    ) -> Result<RunReport, RunError> {
        let execution_prompt = format!("Please execute the following plan:\n\n{plan}");
        let options = RunOptions::in_dir(cwd).with_stdin(execution_prompt);
        let handle =
            process::spawn_streaming(&self.command, self.kind.exec_args(), &options).await?;

        let report = supervisor.run(handle, classifier).await?;
        match report.outcome {
            RunOutcome::Completed => Ok(report),
            RunOutcome::Failed => Err(RunError::AgentFailed {
                exit: report.exit.unwrap_or(ExitOutcome::Signaled(None)),
            }),
            RunOutcome::TimedOut => Err(RunError::DeadlineExceeded {
                limit: supervisor.hard_deadline(),
            }),
        }
    }
}

#[async_trait]
impl crate::notify::Summarizer for CliBackend {
    async fn summarize(&self, messages: &[String]) -> Result<String> {
        let prompt = format!(
            "Condense these progress updates from a coding agent into one short \
             status message:\n{}",
            messages.join("\n")
        );
        let summary = self.generate(prompt, Path::new(".")).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            bail!("summarizer returned empty output");
        }
        Ok(summary.to_string())
    }
}

/// Best-effort extraction of commit metadata from free-form backend output.
fn parse_commit_info(text: &str) -> Option<CommitInfo> {
    let json = extract_json_object(text)?;
    match serde_json::from_str::<CommitInfo>(&json) {
        Ok(info) if !info.commit_message.trim().is_empty() => Some(info),
        Ok(_) => None,
        Err(err) => {
            warn!(err = %err, "backend emitted unparseable commit metadata");
            None
        }
    }
}
