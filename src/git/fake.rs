//! Scripted [`CommandExecutor`] for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::error::CommandError;
use crate::git::executor::{CommandExecutor, ExecOptions};

#[derive(Debug, Clone)]
enum Reply {
    Ok(String),
    Fail(String),
}

/// Replies are keyed by the space-joined args. Queued replies are consumed in
/// order and the last one repeats; unscripted commands succeed with no output.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    replies: RefCell<HashMap<String, VecDeque<Reply>>>,
    calls: RefCell<Vec<String>>,
    stdin: RefCell<Option<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, command: &str, output: &str) {
        self.push(command, Reply::Ok(output.to_string()));
    }

    pub fn fail(&self, command: &str, stderr: &str) {
        self.push(command, Reply::Fail(stderr.to_string()));
    }

    /// Replace whatever was scripted for `command`.
    pub fn set_reply(&self, command: &str, output: &str) {
        self.replies.borrow_mut().remove(command);
        self.reply(command, output);
    }

    pub fn set_fail(&self, command: &str, stderr: &str) {
        self.replies.borrow_mut().remove(command);
        self.fail(command, stderr);
    }

    fn push(&self, command: &str, reply: Reply) {
        self.replies
            .borrow_mut()
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn was_called(&self, command: &str) -> bool {
        self.calls.borrow().iter().any(|c| c == command)
    }

    pub fn call_count(&self, command: &str) -> usize {
        self.calls.borrow().iter().filter(|c| *c == command).count()
    }

    pub fn last_stdin(&self) -> Option<String> {
        self.stdin.borrow().clone()
    }

    fn next_reply(&self, command: &str) -> Reply {
        let mut replies = self.replies.borrow_mut();
        match replies.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Reply::Ok(String::new())),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Ok(String::new())),
            None => Reply::Ok(String::new()),
        }
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, args: &[&str], options: &ExecOptions) -> Result<String, CommandError> {
        let command = args.join(" ");
        self.calls.borrow_mut().push(command.clone());
        if let Some(input) = &options.stdin {
            *self.stdin.borrow_mut() = Some(String::from_utf8_lossy(input).into_owned());
        }

        match self.next_reply(&command) {
            Reply::Ok(out) => Ok(out),
            Reply::Fail(stderr) => Err(CommandError::Failed {
                command: format!("git {command}"),
                code: Some(1),
                stdout: String::new(),
                stderr,
            }),
        }
    }
}
