//! Synchronous git command execution.
//!
//! Every git call in the workflow goes through a [`CommandExecutor`], which
//! shells out to the system `git` binary so the user's config, hooks, SSH agent
//! and credential store all apply. Each invocation is mirrored into the
//! [`RunLog`] with a sanitized snapshot of its options.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde_json::{Value, json};
use tracing::debug;

use crate::error::CommandError;
use crate::logging::{CommandRecord, RunLog};

/// How a single command should be run.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Capture stderr instead of discarding it (needed for hook output).
    pub capture_stderr: bool,
    /// Trim surrounding whitespace from stdout.
    pub trim: bool,
    /// Bytes written to the child's stdin.
    pub stdin: Option<Vec<u8>>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            capture_stderr: false,
            trim: true,
            stdin: None,
        }
    }
}

impl ExecOptions {
    /// Keep stdout exactly as produced (porcelain output has significant leading spaces).
    pub fn raw() -> Self {
        Self {
            trim: false,
            ..Self::default()
        }
    }

    /// Capture both streams so failures carry hook output.
    pub fn capture_all() -> Self {
        Self {
            capture_stderr: true,
            ..Self::default()
        }
    }

    /// Loggable view of the options: binary payloads become placeholders.
    pub fn sanitized(&self) -> Value {
        json!({
            "stdio": ["pipe", "pipe", if self.capture_stderr { "pipe" } else { "ignore" }],
            "encoding": "utf8",
            "trim": self.trim,
            "stdin": self.stdin.as_ref().map(|b| format!("[Buffer length={}]", b.len())),
        })
    }
}

/// Runs one git command to completion and returns its stdout.
pub trait CommandExecutor {
    fn execute(&self, args: &[&str], options: &ExecOptions) -> Result<String, CommandError>;

    /// Run with default options (stderr discarded, output trimmed).
    fn run(&self, args: &[&str]) -> Result<String, CommandError> {
        self.execute(args, &ExecOptions::default())
    }

    /// True when the command exits successfully; output is discarded.
    fn succeeds(&self, args: &[&str]) -> bool {
        self.run(args).is_ok()
    }
}

/// Executor backed by `std::process::Command`.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    workdir: Option<PathBuf>,
    log: RunLog,
}

impl SystemExecutor {
    /// Run commands in the process's current directory.
    pub fn new(log: RunLog) -> Self {
        Self { workdir: None, log }
    }

    /// Run commands in `workdir` instead of the current directory.
    pub fn in_dir(workdir: impl Into<PathBuf>, log: RunLog) -> Self {
        Self {
            workdir: Some(workdir.into()),
            log,
        }
    }

    fn spawn(&self, args: &[&str], options: &ExecOptions) -> Result<String, CommandError> {
        let command_line = display_command(args);
        let mut command = Command::new("git");
        command
            .args(args)
            .stdin(if options.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(if options.capture_stderr { Stdio::piped() } else { Stdio::null() });
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        let spawn_err = |source| CommandError::Spawn {
            command: command_line.clone(),
            source,
        };

        let mut child = command.spawn().map_err(spawn_err)?;
        if let (Some(input), Some(mut pipe)) = (&options.stdin, child.stdin.take()) {
            pipe.write_all(input).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(CommandError::Failed {
                command: command_line,
                code: output.status.code(),
                stdout,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(if options.trim { stdout.trim().to_string() } else { stdout })
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, args: &[&str], options: &ExecOptions) -> Result<String, CommandError> {
        let result = self.spawn(args, options);
        let command = display_command(args);
        debug!(command = %command, ok = result.is_ok(), "git");

        self.log.command(CommandRecord {
            command,
            options: options.sanitized(),
            success: result.is_ok(),
            output: result.as_ref().map(String::clone).unwrap_or_default(),
            error: result.as_ref().err().map(ToString::to_string).unwrap_or_default(),
        });
        result
    }
}

/// Render args the way a user would type them.
pub fn display_command(args: &[&str]) -> String {
    let mut line = String::from("git");
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
            line.push_str(&format!("{arg:?}"));
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_replaces_stdin_buffer() {
        let options = ExecOptions {
            stdin: Some(vec![0u8; 12]),
            ..ExecOptions::default()
        };
        let value = options.sanitized();
        assert_eq!(value["stdin"], "[Buffer length=12]");
        assert_eq!(value["stdio"][2], "ignore");
    }

    #[test]
    fn test_sanitized_capture_all_pipes_stderr() {
        let value = ExecOptions::capture_all().sanitized();
        assert_eq!(value["stdio"][2], "pipe");
        assert!(value["stdin"].is_null());
    }

    #[test]
    fn test_display_command_quotes_messages() {
        assert_eq!(
            display_command(&["commit", "-m", "feat(a): b"]),
            r#"git commit -m "feat(a): b""#
        );
        assert_eq!(display_command(&["status", "--porcelain"]), "git status --porcelain");
    }

    #[test]
    fn test_run_git_version_succeeds_and_is_logged() {
        let log = RunLog::new();
        let executor = SystemExecutor::new(log.clone());
        let version = executor.run(&["--version"]).unwrap();
        assert!(version.starts_with("git version"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_run_invalid_command_fails_with_command_line() {
        let log = RunLog::new();
        let executor = SystemExecutor::new(log.clone());
        let err = executor.run(&["not-a-real-command"]).unwrap_err();
        assert_eq!(err.command(), "git not-a-real-command");
        assert!(matches!(err, CommandError::Failed { .. }));
        assert!(log.has_errors());
    }

    #[test]
    fn test_capture_all_keeps_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let executor = SystemExecutor::in_dir(dir.path(), RunLog::new());
        let err = executor
            .execute(&["rev-parse", "--is-inside-work-tree"], &ExecOptions::capture_all())
            .unwrap_err();
        assert!(err.hook_output().to_lowercase().contains("not a git repository"));
    }
}
