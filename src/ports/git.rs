//! Git CLI adapter.
//!
//! Shells out to the `git` binary. Every call is blocking; failures carry
//! the first line of stderr.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{CancelToken, CommitInfo, Git};
use crate::error::{GitError, Result};

const GIT_BINARY: &str = "git";

/// Production [`Git`] capability backed by the `git` command-line tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl GitCli {
    fn run(&self, cancel: &CancelToken, op: &'static str, args: &[&str]) -> Result<GitOutput> {
        cancel.check()?;
        debug!(op, ?args, "running git");
        let output = Command::new(GIT_BINARY)
            .args(args)
            .output()
            .map_err(|e| GitError::Command {
                op,
                message: e.to_string(),
            })?;
        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_ok(&self, cancel: &CancelToken, op: &'static str, args: &[&str]) -> Result<String> {
        let out = self.run(cancel, op, args)?;
        if !out.success {
            return Err(GitError::Command {
                op,
                message: first_line(&out.stderr),
            }
            .into());
        }
        Ok(out.stdout)
    }
}

struct GitOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl Git for GitCli {
    fn is_repo(&self, cancel: &CancelToken, path: &Path) -> Result<bool> {
        let path = path.to_string_lossy();
        let out = self.run(
            cancel,
            "rev-parse",
            &["-C", &path, "rev-parse", "--is-inside-work-tree"],
        )?;
        Ok(out.success && out.stdout.trim() == "true")
    }

    fn init_repo(&self, cancel: &CancelToken, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.run_ok(cancel, "init", &["-C", &path, "init"])?;
        Ok(())
    }

    fn top_level(&self, cancel: &CancelToken, path: &Path) -> Result<PathBuf> {
        let path = path.to_string_lossy();
        let stdout = self.run_ok(
            cancel,
            "rev-parse",
            &["-C", &path, "rev-parse", "--show-toplevel"],
        )?;
        Ok(PathBuf::from(stdout.trim()))
    }

    fn is_path_tracked(
        &self,
        cancel: &CancelToken,
        repo_root: &Path,
        path: &Path,
    ) -> Result<bool> {
        let rel = path.strip_prefix(repo_root).unwrap_or(path);
        let root = repo_root.to_string_lossy();
        let rel = rel.to_string_lossy();
        let out = self.run(
            cancel,
            "ls-files",
            &["-C", &root, "ls-files", "--error-unmatch", &rel],
        )?;
        Ok(out.success)
    }

    fn is_dirty(&self, cancel: &CancelToken, repo_root: &Path) -> Result<bool> {
        let root = repo_root.to_string_lossy();
        let stdout = self.run_ok(cancel, "status", &["-C", &root, "status", "--porcelain"])?;
        Ok(!stdout.trim().is_empty())
    }

    fn last_commit_info(
        &self,
        cancel: &CancelToken,
        repo_root: &Path,
        path: &Path,
    ) -> Result<CommitInfo> {
        let rel = path.strip_prefix(repo_root).unwrap_or(path);
        let root = repo_root.to_string_lossy();
        let rel = rel.to_string_lossy();
        let stdout = self.run_ok(
            cancel,
            "log",
            &[
                "-C",
                &root,
                "log",
                "-1",
                "--format=%H|%an|%ai|%s",
                "--",
                &rel,
            ],
        )?;
        let line = stdout.trim();
        let mut parts = line.splitn(4, '|');
        let (hash, author, time, message) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(h), Some(a), Some(t), Some(m)) => (h, a, t, m),
            _ => return Err(GitError::UnexpectedOutput(line.to_string()).into()),
        };
        Ok(CommitInfo {
            hash: hash.to_string(),
            author: author.to_string(),
            time: time.to_string(),
            message: message.to_string(),
        })
    }

    fn pull(&self, cancel: &CancelToken, repo_root: &Path) -> Result<()> {
        let root = repo_root.to_string_lossy();
        self.run_ok(cancel, "pull", &["-C", &root, "pull", "--rebase"])?;
        Ok(())
    }

    fn push(&self, cancel: &CancelToken, repo_root: &Path) -> Result<()> {
        let root = repo_root.to_string_lossy();
        self.run_ok(cancel, "push", &["-C", &root, "push"])?;
        Ok(())
    }
}

fn first_line(stderr: &str) -> String {
    stderr.lines().next().unwrap_or("").trim().to_string()
}
