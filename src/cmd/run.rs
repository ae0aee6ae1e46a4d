//! Task execution commands — `herald run` and `herald exec`.

use anyhow::{Result, bail};
use console::style;
use herald::agent::{TaskContext, build_outbound, run_agent_task};
use herald::ai::CliBackend;
use herald::config::Config;
use herald::controller::AgentController;
use herald::exec::CommandExecutor;
use herald::notify::{ConsoleSink, NotificationSink, Summarizer, WebhookSink};
use herald::process::{RunOptions, spawn_streaming};
use herald::supervisor::{RunOutcome, RunSupervisor};
use std::path::Path;
use std::sync::Arc;

fn make_sink(config: &Config) -> Arc<dyn NotificationSink> {
    match &config.webhook_url {
        Some(url) => Arc::new(WebhookSink::new(url.clone(), config.thread_id.clone())),
        None => Arc::new(ConsoleSink),
    }
}

fn check_enabled(controller: &AgentController) -> Result<()> {
    if !controller.is_enabled() {
        bail!("Agent is currently disabled; restart without --disabled to accept tasks.");
    }
    Ok(())
}

pub async fn cmd_run(
    project_dir: &Path,
    controller: &AgentController,
    prompt: &str,
) -> Result<()> {
    check_enabled(controller)?;
    if prompt.trim().is_empty() {
        bail!("Provide a task description: herald run <prompt>");
    }

    let config = Config::load(project_dir)?;
    let sink = make_sink(&config);
    let backend = Arc::new(CliBackend::new(config.backend, config.backend_command.clone()));
    let summarizer = config
        .summarize_batches
        .then(|| Arc::clone(&backend) as Arc<dyn Summarizer>);

    println!(
        "{} \"{}\" (this may take a few minutes)",
        style("Task received:").bold(),
        prompt
    );

    let ctx = TaskContext {
        config,
        backend,
        sink,
        summarizer,
    };
    let summary = run_agent_task(prompt, &ctx).await?;
    println!("{} {}", style("Done:").green().bold(), summary);
    Ok(())
}

/// Run any command through the supervised streaming pipeline, without the
/// repository orchestration around it.
pub async fn cmd_exec(
    project_dir: &Path,
    controller: &AgentController,
    command: &str,
    args: &[String],
) -> Result<()> {
    check_enabled(controller)?;

    let config = Config::load(project_dir)?;
    let sink = make_sink(&config);
    let outbound = build_outbound(&config, sink, None);
    let supervisor = RunSupervisor::new(
        config.supervisor(),
        Arc::clone(&outbound),
        CommandExecutor::new(project_dir),
    );

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let handle = spawn_streaming(command, &arg_refs, &RunOptions::in_dir(project_dir)).await?;
    let report = supervisor.run(handle, config.classifier()).await;
    outbound.drain().await;
    let report = report?;

    match report.outcome {
        RunOutcome::Completed => {
            println!(
                "{} {} narration block(s), {} command(s), {} failed, {:.1}s",
                style("Completed:").green().bold(),
                report.narration_blocks,
                report.commands_run,
                report.commands_failed,
                report.duration.as_secs_f64()
            );
            Ok(())
        }
        RunOutcome::Failed => {
            bail!(
                "Process failed with {}",
                report
                    .exit
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "an unknown outcome".to_string())
            )
        }
        RunOutcome::TimedOut => bail!(
            "Process exceeded the {}s deadline and was terminated",
            config.hard_deadline.as_secs()
        ),
    }
}
