//! Sequential execution of command blocks as nested shell processes.

use crate::blocks::Block;
use crate::errors::RunnerError;
use crate::process::{self, RunOptions};
use std::path::PathBuf;
use tracing::{info, warn};

/// Outcome of one executed command block. Reported, then discarded.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandResult {
    /// The text worth relaying: stdout, or stderr when stdout is empty.
    pub fn reportable_output(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Runs command blocks one at a time in a fixed working directory.
///
/// Execution is strictly sequential in classification order: later commands
/// may depend on filesystem state produced by earlier ones.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    cwd: PathBuf,
}

impl CommandExecutor {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Execute one block. Failures are captured in the result, never
    /// returned: a failing command must not abort the enclosing run.
    pub async fn execute(&self, block: &Block) -> CommandResult {
        let script = block.text.trim();
        info!(command = script, cwd = %self.cwd.display(), "executing command block");

        // The script travels as a single argv element; nothing is
        // interpolated into a larger command string.
        let options = RunOptions::in_dir(&self.cwd);
        match process::run_buffered("sh", &["-c", script], &options).await {
            Ok(output) => CommandResult {
                command: script.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
                success: true,
            },
            Err(RunnerError::NonZeroExit {
                stdout,
                stderr,
                exit,
                ..
            }) => {
                warn!(command = script, %exit, "command block failed");
                CommandResult {
                    command: script.to_string(),
                    stdout,
                    stderr,
                    success: false,
                }
            }
            Err(err) => {
                warn!(command = script, err = %err, "command block could not run");
                CommandResult {
                    command: script.to_string(),
                    stdout: String::new(),
                    stderr: err.to_string(),
                    success: false,
                }
            }
        }
    }
}
