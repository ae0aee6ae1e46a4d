//! Typed error hierarchy for Herald.
//!
//! Three enums cover the three subsystems:
//! - `RunnerError` — spawning and waiting on child processes
//! - `RunError` — supervised agent runs
//! - `SinkError` — notification delivery

use crate::process::ExitOutcome;
use std::time::Duration;
use thiserror::Error;

/// Errors from the process runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed with {exit}\nstdout: {stdout}\nstderr: {stderr}")]
    NonZeroExit {
        command: String,
        args: Vec<String>,
        stdout: String,
        stderr: String,
        exit: ExitOutcome,
    },

    #[error("I/O error while running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from a supervised run of the outer agent process.
///
/// A timeout is deliberately distinct from a non-zero exit: the caller reports
/// them differently.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Agent process exited with {exit}")]
    AgentFailed { exit: ExitOutcome },

    #[error("Run exceeded the {}s deadline and was terminated", limit.as_secs())]
    DeadlineExceeded { limit: Duration },

    #[error("Failed reading agent output: {0}")]
    Stream(#[source] std::io::Error),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Errors from the notification sink collaborator.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to reach notification sink: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification sink rejected the message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
