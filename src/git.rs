//! Version control collaborator: subprocess `git` and `gh` in one checkout.

use crate::errors::RunnerError;
use crate::process::{self, RunOptions};
use std::path::{Path, PathBuf};

/// Git operations for a single working copy.
#[derive(Debug, Clone)]
pub struct Git {
    cwd: PathBuf,
}

impl Git {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, RunnerError> {
        let output = process::run_buffered("git", args, &RunOptions::in_dir(&self.cwd)).await?;
        Ok(output.stdout)
    }

    pub async fn clone_into(&self, url: &str) -> Result<(), RunnerError> {
        self.git(&["clone", url, "."]).await.map(|_| ())
    }

    pub async fn create_branch(&self, name: &str) -> Result<(), RunnerError> {
        self.git(&["checkout", "-b", name]).await.map(|_| ())
    }

    pub async fn stage_all(&self) -> Result<(), RunnerError> {
        self.git(&["add", "."]).await.map(|_| ())
    }

    /// Porcelain status of staged and unstaged changes. Empty means a clean
    /// tree.
    pub async fn status_summary(&self) -> Result<String, RunnerError> {
        Ok(self.git(&["status", "--porcelain"]).await?.trim().to_string())
    }

    pub async fn diff_staged(&self) -> Result<String, RunnerError> {
        Ok(self.git(&["diff", "--staged"]).await?.trim().to_string())
    }

    /// Commit with the message on stdin, so arbitrary content survives.
    pub async fn commit(&self, message: &str) -> Result<(), RunnerError> {
        let options = RunOptions::in_dir(&self.cwd).with_stdin(message);
        process::run_buffered("git", &["commit", "-F", "-"], &options)
            .await
            .map(|_| ())
    }

    pub async fn push(&self, branch: &str) -> Result<(), RunnerError> {
        self.git(&["push", "origin", branch]).await.map(|_| ())
    }

    /// Open a pull request via `gh`, body on stdin. Returns the PR URL.
    pub async fn open_pull_request(
        &self,
        title: &str,
        body: &str,
        base: &str,
    ) -> Result<String, RunnerError> {
        let options = RunOptions::in_dir(&self.cwd).with_stdin(body);
        let output = process::run_buffered(
            "gh",
            &["pr", "create", "--base", base, "--title", title, "-F", "-"],
            &options,
        )
        .await?;
        Ok(output.stdout.trim().to_string())
    }
}
