//! Supervision of a streaming agent run.
//!
//! One select loop owns the consumption path: chunks are fed through the
//! reassembler and classifier, narration goes to the outbound adapter, and
//! command blocks run through the executor between chunks. Two independent
//! timers watch the run from the side: a silence check that only warns, and a
//! hard deadline that kills.

use crate::blocks::{Block, BlockKind, Classifier};
use crate::errors::RunError;
use crate::exec::{CommandExecutor, CommandResult};
use crate::notify::Outbound;
use crate::process::{ExitOutcome, ProcessHandle};
use crate::stream::LineAssembler;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Timer settings for one supervised run.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Silence longer than this draws a warning notification.
    pub silence_threshold: Duration,
    /// How often the silence check runs.
    pub silence_check_period: Duration,
    /// Total run time after which the process is forcibly terminated.
    pub hard_deadline: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_secs(120),
            silence_check_period: Duration::from_secs(60),
            hard_deadline: Duration::from_secs(1800),
        }
    }
}

/// Terminal state of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    TimedOut,
}

/// What happened during a run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub exit: Option<ExitOutcome>,
    pub duration: Duration,
    pub narration_blocks: usize,
    pub commands_run: usize,
    pub commands_failed: usize,
}

/// Liveness bookkeeping between timer checks. Written by the stream path,
/// read by the silence check.
#[derive(Debug)]
struct WatchdogState {
    last_output: Instant,
    last_warning: Option<Instant>,
}

impl WatchdogState {
    fn new() -> Self {
        Self {
            last_output: Instant::now(),
            last_warning: None,
        }
    }

    fn record_output(&mut self) {
        self.last_output = Instant::now();
        self.last_warning = None;
    }

    /// A warning fires after a full threshold of silence, measured from the
    /// later of the last output and the previous warning (re-arm).
    fn check_silence(&mut self, threshold: Duration) -> Option<Duration> {
        let now = Instant::now();
        let silent_for = now.duration_since(self.last_output);
        if silent_for < threshold {
            return None;
        }
        if let Some(warned_at) = self.last_warning
            && now.duration_since(warned_at) < threshold
        {
            return None;
        }
        self.last_warning = Some(now);
        Some(silent_for)
    }
}

#[derive(Debug, Default)]
struct Tally {
    narration: usize,
    commands: usize,
    failed: usize,
}

pub struct RunSupervisor {
    config: SupervisorConfig,
    outbound: Arc<dyn Outbound>,
    executor: CommandExecutor,
}

impl RunSupervisor {
    pub fn new(
        config: SupervisorConfig,
        outbound: Arc<dyn Outbound>,
        executor: CommandExecutor,
    ) -> Self {
        Self {
            config,
            outbound,
            executor,
        }
    }

    pub fn hard_deadline(&self) -> Duration {
        self.config.hard_deadline
    }

    /// Drive the agent process to completion. Consumes the handle; the
    /// process is dead when this returns.
    ///
    /// Infrastructure problems (stream I/O, wait) come back as errors; the
    /// agent's own fate is reported in `RunReport::outcome`, the way a nested
    /// command's failure is reported in its result.
    pub async fn run(
        &self,
        mut handle: ProcessHandle,
        mut classifier: Classifier,
    ) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let deadline = tokio::time::sleep(self.config.hard_deadline);
        tokio::pin!(deadline);
        let mut checker = tokio::time::interval(self.config.silence_check_period);
        checker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        checker.tick().await; // consume the immediate first tick

        let mut watchdog = WatchdogState::new();
        let mut assembler = LineAssembler::new();
        let mut tally = Tally::default();

        loop {
            tokio::select! {
                chunk = handle.next_chunk() => match chunk {
                    Ok(Some(bytes)) => {
                        watchdog.record_output();
                        let lines = assembler.feed(&bytes);
                        if !lines.is_empty() {
                            let blocks = classifier.push_lines(&lines);
                            self.dispatch(&blocks, &mut tally).await;
                        }
                    }
                    Ok(None) => break, // stdout closed; the agent is done talking
                    Err(source) => {
                        handle.start_kill();
                        let _ = handle.wait().await;
                        return Err(RunError::Stream(source));
                    }
                },
                _ = checker.tick() => {
                    if let Some(silent_for) = watchdog.check_silence(self.config.silence_threshold) {
                        warn!(silent_secs = silent_for.as_secs(), "agent has gone quiet");
                        self.outbound
                            .push(format!(
                                "Agent has produced no output for {}s; still waiting.",
                                silent_for.as_secs()
                            ))
                            .await;
                    }
                }
                _ = &mut deadline => {
                    warn!(
                        limit_secs = self.config.hard_deadline.as_secs(),
                        "hard deadline exceeded, terminating agent"
                    );
                    handle.start_kill();
                    let _ = handle.wait().await;
                    self.flush_tail(&mut assembler, &mut classifier, &mut tally, false).await;
                    self.outbound
                        .push(format!(
                            "Run aborted: the agent exceeded the {}s time limit and was terminated.",
                            self.config.hard_deadline.as_secs()
                        ))
                        .await;
                    return Ok(self.report(RunOutcome::TimedOut, None, started, tally));
                }
            }
        }

        self.flush_tail(&mut assembler, &mut classifier, &mut tally, true).await;
        let exit = handle.wait().await?;

        if exit.success() {
            info!(
                secs = started.elapsed().as_secs(),
                narration = tally.narration,
                commands = tally.commands,
                "agent run completed"
            );
            Ok(self.report(RunOutcome::Completed, Some(exit), started, tally))
        } else {
            warn!(%exit, "agent run failed");
            Ok(self.report(RunOutcome::Failed, Some(exit), started, tally))
        }
    }

    fn report(
        &self,
        outcome: RunOutcome,
        exit: Option<ExitOutcome>,
        started: Instant,
        tally: Tally,
    ) -> RunReport {
        RunReport {
            outcome,
            exit,
            duration: started.elapsed(),
            narration_blocks: tally.narration,
            commands_run: tally.commands,
            commands_failed: tally.failed,
        }
    }

    async fn dispatch(&self, blocks: &[Block], tally: &mut Tally) {
        for block in blocks {
            match block.kind {
                BlockKind::Narration => {
                    tally.narration += 1;
                    self.outbound.push(block.text.clone()).await;
                }
                BlockKind::Command => {
                    tally.commands += 1;
                    let result = self.executor.execute(block).await;
                    if !result.success {
                        tally.failed += 1;
                    }
                    self.outbound.push(format_command_result(&result)).await;
                }
                BlockKind::Passthrough => {
                    debug!(output = %block.text, "child output");
                }
            }
        }
    }

    /// Flush the held partial line and any open fence. Nothing is dropped at
    /// stream end. With `execute` false (deadline abort), a command block
    /// completed by the flush is relayed as fenced text instead of running.
    async fn flush_tail(
        &self,
        assembler: &mut LineAssembler,
        classifier: &mut Classifier,
        tally: &mut Tally,
        execute: bool,
    ) {
        let mut blocks = Vec::new();
        if let Some(partial) = assembler.flush() {
            blocks.extend(classifier.push_lines(&[partial]));
        }
        blocks.extend(classifier.finish());

        if execute {
            self.dispatch(&blocks, tally).await;
            return;
        }
        for block in &blocks {
            match block.kind {
                BlockKind::Narration | BlockKind::Command => {
                    tally.narration += 1;
                    let text = if block.kind == BlockKind::Command {
                        format!(
                            "```{}\n{}\n```",
                            block.language.as_deref().unwrap_or_default(),
                            block.text
                        )
                    } else {
                        block.text.clone()
                    };
                    self.outbound.push(text).await;
                }
                BlockKind::Passthrough => debug!(output = %block.text, "child output"),
            }
        }
    }
}

fn format_command_result(result: &CommandResult) -> String {
    let output = result.reportable_output().trim();
    if result.success {
        if output.is_empty() {
            format!("Ran `{}` (no output)", result.command)
        } else {
            format!("Ran `{}`:\n```\n{}\n```", result.command, output)
        }
    } else {
        format!("Command `{}` failed:\n```\n{}\n```", result.command, output)
    }
}
