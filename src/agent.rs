//! End-to-end agent task: clone, branch, plan, implement, commit, push, PR.

use crate::ai::AgentBackend;
use crate::config::{Config, DeliveryStrategy};
use crate::exec::CommandExecutor;
use crate::git::Git;
use crate::notify::{
    BatcherOptions, MessageBatcher, MessageStreamer, NotificationSink, Outbound, StreamerOptions,
    Summarizer,
};
use crate::supervisor::RunSupervisor;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a task needs besides the prompt.
pub struct TaskContext {
    pub config: Config,
    pub backend: Arc<dyn AgentBackend>,
    pub sink: Arc<dyn NotificationSink>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

/// The configured pacing strategy in front of the sink.
pub fn build_outbound(
    config: &Config,
    sink: Arc<dyn NotificationSink>,
    summarizer: Option<Arc<dyn Summarizer>>,
) -> Arc<dyn Outbound> {
    match config.delivery {
        DeliveryStrategy::Interval => Arc::new(MessageBatcher::new(
            sink,
            BatcherOptions {
                interval: config.batch_interval,
                max_batch_size: config.batch_max_size,
                summarizer,
            },
        )),
        DeliveryStrategy::Debounce => Arc::new(MessageStreamer::new(
            sink,
            StreamerOptions {
                quiet_period: config.debounce_quiet,
                prefix: String::new(),
            },
        )),
    }
}

/// Run one full task and return the summary line for the requester.
///
/// The scratch checkout is removed when this returns, success or not.
/// Milestone messages go straight to the sink; the implementation run's
/// streamed narration goes through the configured outbound adapter.
pub async fn run_agent_task(prompt: &str, ctx: &TaskContext) -> Result<String> {
    let repo_url = ctx.config.repo_url.as_deref().context(
        "No target repository configured (set HERALD_REPO_URL or repo_url in herald.toml)",
    )?;

    let workspace = tempfile::Builder::new()
        .prefix("herald-")
        .tempdir()
        .context("Failed to create scratch workspace")?;
    let workdir = workspace.path();
    let git = Git::new(workdir);

    git.clone_into(repo_url)
        .await
        .context("Failed to clone target repository")?;
    notify(&ctx.sink, "Cloned repository successfully.").await;

    notify(&ctx.sink, "Choosing a branch name...").await;
    let branch = ctx.backend.generate_branch_name(prompt, workdir).await?;
    git.create_branch(&branch)
        .await
        .with_context(|| format!("Failed to create branch {branch}"))?;
    notify(&ctx.sink, &format!("Created and checked out branch `{branch}`.")).await;

    notify(&ctx.sink, "Generating an implementation plan...").await;
    let plan = ctx.backend.generate_plan(prompt, workdir).await?;
    notify(
        &ctx.sink,
        &format!("Plan:\n```\n{plan}\n```\nProceeding with the implementation."),
    )
    .await;

    info!(branch = %branch, "starting implementation run");
    let outbound = build_outbound(&ctx.config, Arc::clone(&ctx.sink), ctx.summarizer.clone());
    let supervisor = RunSupervisor::new(
        ctx.config.supervisor(),
        Arc::clone(&outbound),
        CommandExecutor::new(workdir),
    );
    let run = ctx
        .backend
        .execute_plan(&plan, workdir, &supervisor, ctx.config.classifier())
        .await;
    // Queued narration still lands even when the run went bad.
    outbound.drain().await;
    let report = run?;
    info!(
        commands = report.commands_run,
        failed = report.commands_failed,
        secs = report.duration.as_secs(),
        "implementation run finished"
    );

    git.stage_all().await.context("Failed to stage changes")?;
    let status = git.status_summary().await?;
    if status.is_empty() {
        return Ok(format!(
            "Task complete for \"{prompt}\". The agent found no changes to make."
        ));
    }
    notify(&ctx.sink, &format!("Changed files:\n```\n{status}\n```")).await;

    notify(&ctx.sink, "Writing commit and pull request metadata...").await;
    let diff = git.diff_staged().await?;
    let metadata = ctx.backend.generate_commit_info(prompt, &diff, workdir).await?;

    git.commit(&metadata.commit_message)
        .await
        .context("Failed to commit changes")?;
    notify(&ctx.sink, &format!("Committed: {}", metadata.commit_message)).await;

    git.push(&branch).await.context("Failed to push branch")?;
    let pr_url = git
        .open_pull_request(&metadata.pr_title, &metadata.pr_body, &ctx.config.base_branch)
        .await
        .context("Failed to open pull request")?;

    Ok(format!("Task complete! Pull request: {pr_url}"))
}

/// Milestone delivery is best-effort; a failed notification never fails the
/// task.
async fn notify(sink: &Arc<dyn NotificationSink>, text: &str) {
    if let Err(err) = sink.send(text).await {
        warn!(err = %err, "milestone notification failed");
    }
}
