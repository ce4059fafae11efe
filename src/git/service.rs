//! Typed git operations used by the commit workflow.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::{CommandError, WorkflowError};
use crate::git::executor::{CommandExecutor, ExecOptions};
use crate::git::status::{StatusEntry, parse_porcelain};

/// Which flavour of `git commit` to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitMode {
    #[default]
    Normal,
    AllowEmpty,
    NoVerify,
}

impl CommitMode {
    /// `--allow-empty` wins over `--no-verify` when both are requested.
    pub fn from_flags(allow_empty: bool, no_verify: bool) -> Self {
        if allow_empty {
            CommitMode::AllowEmpty
        } else if no_verify {
            CommitMode::NoVerify
        } else {
            CommitMode::Normal
        }
    }

    fn flag(self) -> Option<&'static str> {
        match self {
            CommitMode::Normal => None,
            CommitMode::AllowEmpty => Some("--allow-empty"),
            CommitMode::NoVerify => Some("--no-verify"),
        }
    }
}

/// Local commits not yet on the remote branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushCount {
    /// The remote branch does not exist; pushing creates it.
    RemoteBranchMissing,
    Ahead(usize),
}

/// Staged diff text sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDiff {
    pub text: String,
    /// True when `--stat` replaced the full diff.
    pub condensed: bool,
}

impl StagedDiff {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Git operations over a [`CommandExecutor`].
#[derive(Debug, Clone)]
pub struct GitService<E> {
    executor: E,
}

impl<E: CommandExecutor> GitService<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Find the git binary and return its version line.
    pub fn check_installed(&self) -> Result<String, WorkflowError> {
        which::which("git").map_err(|_| WorkflowError::GitNotInstalled)?;
        self.executor
            .run(&["--version"])
            .map_err(|_| WorkflowError::GitNotInstalled)
    }

    pub fn check_repository(&self) -> Result<(), WorkflowError> {
        self.executor
            .run(&["rev-parse", "--is-inside-work-tree"])
            .map(|_| ())
            .map_err(WorkflowError::NotARepository)
    }

    /// Path of the current directory relative to the repository root,
    /// with a trailing slash (`""` at the root).
    pub fn working_prefix(&self) -> Result<String, CommandError> {
        self.executor.run(&["rev-parse", "--show-prefix"])
    }

    pub fn toplevel(&self) -> Result<PathBuf, CommandError> {
        self.executor
            .run(&["rev-parse", "--show-toplevel"])
            .map(PathBuf::from)
    }

    /// Stage everything under the current directory.
    pub fn add_all(&self) -> Result<(), CommandError> {
        self.executor.run(&["add", "."]).map(|_| ())
    }

    /// Configured `user.name`, if any.
    pub fn user_name(&self) -> Option<String> {
        self.executor
            .run(&["config", "user.name"])
            .ok()
            .filter(|name| !name.is_empty())
    }

    /// Untrimmed `git status --porcelain` output.
    pub fn status_text(&self) -> Result<String, CommandError> {
        self.executor
            .execute(&["status", "--porcelain"], &ExecOptions::raw())
    }

    pub fn status(&self) -> Result<Vec<StatusEntry>, CommandError> {
        self.status_text().map(|out| parse_porcelain(&out))
    }

    /// Staged changes with zero context lines.
    ///
    /// Falls back to `--stat` when the full diff is longer than `max_chars`
    /// or could not be produced.
    pub fn staged_diff(&self, max_chars: usize) -> Result<StagedDiff, CommandError> {
        match self.executor.run(&["diff", "--staged", "-U0"]) {
            Ok(text) if text.is_empty() => Ok(StagedDiff {
                text,
                condensed: false,
            }),
            Ok(text) if text.chars().count() <= max_chars => Ok(StagedDiff {
                text,
                condensed: false,
            }),
            Ok(text) => {
                debug!(length = text.chars().count(), max_chars, "diff over budget");
                self.stat_diff()
            }
            Err(e) => {
                warn!(error = %e, "full diff failed, using --stat");
                self.stat_diff()
            }
        }
    }

    fn stat_diff(&self) -> Result<StagedDiff, CommandError> {
        self.executor
            .run(&["diff", "--staged", "--stat"])
            .map(|text| StagedDiff {
                text,
                condensed: true,
            })
    }

    /// Commit the index. The message goes through stdin so hooks and
    /// multi-line bodies behave as with `git commit -F`.
    pub fn commit(&self, mode: CommitMode, message: &str) -> Result<String, CommandError> {
        let mut args = vec!["commit", "-F", "-"];
        args.extend(mode.flag());
        let options = ExecOptions {
            stdin: Some(message.as_bytes().to_vec()),
            ..ExecOptions::capture_all()
        };
        self.executor.execute(&args, &options)
    }

    /// Unstage everything (keeps the working tree).
    pub fn reset(&self) -> Result<(), CommandError> {
        self.executor.run(&["reset"]).map(|_| ())
    }

    pub fn current_branch(&self) -> Result<String, CommandError> {
        self.executor.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Resolve the remote for `branch`: tracking config, then upstream,
    /// then `origin`, then the first remote. The result must exist.
    pub fn remote_name(&self, branch: &str) -> Result<String, WorkflowError> {
        let candidate = self
            .tracking_remote(branch)
            .or_else(|| self.upstream_remote())
            .or_else(|| self.fallback_remote())
            .ok_or_else(|| WorkflowError::RemoteResolution("no remote configured".to_string()))?;

        if !self.executor.succeeds(&["remote", "get-url", &candidate]) {
            return Err(WorkflowError::RemoteResolution(format!(
                "remote \"{candidate}\" does not exist"
            )));
        }
        Ok(candidate)
    }

    fn tracking_remote(&self, branch: &str) -> Option<String> {
        let key = format!("branch.{branch}.remote");
        self.executor
            .run(&["config", "--get", &key])
            .ok()
            .filter(|r| !r.is_empty())
    }

    fn upstream_remote(&self) -> Option<String> {
        let upstream = self
            .executor
            .run(&["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"])
            .ok()?;
        upstream
            .split_once('/')
            .map(|(remote, _)| remote.to_string())
            .filter(|r| !r.is_empty())
    }

    fn fallback_remote(&self) -> Option<String> {
        let remotes = self.executor.run(&["remote"]).ok()?;
        let names: Vec<&str> = remotes.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        names
            .iter()
            .find(|name| **name == "origin")
            .or_else(|| names.first())
            .map(|name| name.to_string())
    }

    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool {
        let reference = format!("refs/remotes/{remote}/{branch}");
        self.executor
            .succeeds(&["rev-parse", "--verify", "--quiet", &reference])
    }

    /// A merge is in progress when `MERGE_HEAD` exists.
    pub fn is_merging(&self) -> bool {
        self.executor
            .succeeds(&["rev-parse", "--verify", "--quiet", "MERGE_HEAD"])
    }

    /// Conclude an in-progress merge with the prepared message.
    pub fn finish_merge(&self) -> Result<String, CommandError> {
        self.executor
            .execute(&["commit", "--no-edit"], &ExecOptions::capture_all())
    }

    pub fn fetch(&self, remote: &str) -> Result<(), CommandError> {
        self.executor
            .execute(&["fetch", remote], &ExecOptions::capture_all())
            .map(|_| ())
    }

    pub fn merge(&self, remote: &str, branch: &str) -> Result<String, CommandError> {
        let target = format!("{remote}/{branch}");
        self.executor
            .execute(&["merge", "--no-edit", &target], &ExecOptions::capture_all())
    }

    /// Commits on the remote branch missing locally.
    pub fn ahead_count(&self, remote: &str, branch: &str) -> Result<usize, CommandError> {
        let range = format!("HEAD..{remote}/{branch}");
        self.count_commits(&range)
    }

    /// Local commits missing on the remote branch.
    pub fn push_count(&self, remote: &str, branch: &str) -> Result<PushCount, CommandError> {
        if !self.remote_branch_exists(remote, branch) {
            return Ok(PushCount::RemoteBranchMissing);
        }
        let range = format!("{remote}/{branch}..HEAD");
        self.count_commits(&range).map(PushCount::Ahead)
    }

    fn count_commits(&self, range: &str) -> Result<usize, CommandError> {
        let out = self.executor.run(&["rev-list", "--count", range])?;
        out.parse().map_err(|_| CommandError::UnexpectedOutput {
            command: format!("git rev-list --count {range}"),
            output: out.clone(),
        })
    }

    /// Push and set upstream.
    pub fn push(&self, remote: &str, branch: &str) -> Result<(), CommandError> {
        self.executor
            .execute(&["push", "-u", remote, branch], &ExecOptions::capture_all())
            .map(|_| ())
    }
}
