//! Child process execution: buffered one-shot runs and streaming handles.
//!
//! Arguments always travel as a discrete vector; untrusted text is never
//! interpolated into a shell command string.

use crate::errors::RunnerError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info, warn};

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own with this code.
    Exited(i32),
    /// The process was terminated by a signal (or exited without a code).
    Signaled(Option<i32>),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }

    fn from_status(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ExitOutcome::Exited(code),
            None => {
                #[cfg(unix)]
                {
                    use std::os::unix::process::ExitStatusExt;
                    ExitOutcome::Signaled(status.signal())
                }
                #[cfg(not(unix))]
                {
                    ExitOutcome::Signaled(None)
                }
            }
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exit code {code}"),
            ExitOutcome::Signaled(Some(sig)) => write!(f, "signal {sig}"),
            ExitOutcome::Signaled(None) => write!(f, "an unknown signal"),
        }
    }
}

/// Options shared by both execution modes.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl RunOptions {
    pub fn in_dir(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: Some(cwd.as_ref().to_path_buf()),
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }
}

/// Captured output of a completed buffered run.
#[derive(Debug)]
pub struct BufferedOutput {
    pub stdout: String,
    pub stderr: String,
}

fn build_command(command: &str, args: &[&str], options: &RunOptions) -> Command {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd.stdin(if options.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    cmd
}

/// Write the stdin payload as a single piece and close the write side.
async fn write_stdin(child: &mut Child, options: &RunOptions, command: &str) -> Result<(), RunnerError> {
    if let (Some(payload), Some(mut stdin)) = (&options.stdin, child.stdin.take()) {
        debug!(command, bytes = payload.len(), "piping payload to stdin");
        stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|source| RunnerError::Io {
                command: command.to_string(),
                source,
            })?;
        stdin.shutdown().await.map_err(|source| RunnerError::Io {
            command: command.to_string(),
            source,
        })?;
    }
    Ok(())
}

/// Run a command to completion, capturing stdout and stderr.
///
/// A non-zero exit (or death by signal) is an error carrying the captured
/// output for diagnostics.
pub async fn run_buffered(
    command: &str,
    args: &[&str],
    options: &RunOptions,
) -> Result<BufferedOutput, RunnerError> {
    info!(command, ?args, cwd = ?options.cwd, "running command");

    let mut child = build_command(command, args, options)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            command: command.to_string(),
            source,
        })?;
    write_stdin(&mut child, options, command).await?;

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| RunnerError::Io {
            command: command.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !stderr.trim().is_empty() {
        debug!(command, stderr = %stderr.trim(), "command stderr");
    }

    let exit = ExitOutcome::from_status(output.status);
    if exit.success() {
        Ok(BufferedOutput { stdout, stderr })
    } else {
        warn!(command, %exit, "command failed");
        Err(RunnerError::NonZeroExit {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdout,
            stderr,
            exit,
        })
    }
}

/// Spawn a command for live consumption and return immediately.
pub async fn spawn_streaming(
    command: &str,
    args: &[&str],
    options: &RunOptions,
) -> Result<ProcessHandle, RunnerError> {
    info!(command, ?args, cwd = ?options.cwd, "spawning streaming command");

    let mut child = build_command(command, args, options)
        .spawn()
        .map_err(|source| RunnerError::Spawn {
            command: command.to_string(),
            source,
        })?;
    write_stdin(&mut child, options, command).await?;

    let stdout = child.stdout.take().ok_or_else(|| RunnerError::Io {
        command: command.to_string(),
        source: std::io::Error::other("stdout was not piped"),
    })?;
    let stderr = child.stderr.take();

    Ok(ProcessHandle {
        command: command.to_string(),
        child,
        stdout,
        stderr,
    })
}

/// Live handle on a streaming child process.
///
/// Owned by the caller that spawned it; the process is dead once `wait`
/// returns or the handle is dropped after `start_kill`.
pub struct ProcessHandle {
    command: String,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<ChildStderr>,
}

impl ProcessHandle {
    /// Pull the next chunk of stdout. Returns `None` once the child closes
    /// its output. Chunks arrive in order; this is a single-pass stream.
    pub async fn next_chunk(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; 8192];
        let n = self.stdout.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    /// Begin forceful termination without waiting for the process to die.
    /// The signal is non-catchable: the monitored process is untrusted and
    /// may not honor graceful shutdown.
    pub fn start_kill(&mut self) {
        if let Err(err) = self.child.start_kill() {
            warn!(command = %self.command, err = %err, "failed to kill process");
        }
    }

    /// Wait for the child to exit, draining stderr into the log first.
    pub async fn wait(mut self) -> Result<ExitOutcome, RunnerError> {
        if let Some(mut stderr) = self.stderr.take() {
            let mut content = String::new();
            if stderr.read_to_string(&mut content).await.is_ok() && !content.trim().is_empty() {
                debug!(command = %self.command, stderr = %content.trim(), "process stderr");
            }
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| RunnerError::Io {
                command: self.command.clone(),
                source,
            })?;
        Ok(ExitOutcome::from_status(status))
    }
}
