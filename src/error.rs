//! Error types for aicommit modules using thiserror.

use thiserror::Error;

/// Errors from running an external command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}{}", .code.map_or("a signal".to_string(), |c| format!("code {c}")), summarize_output(.stderr, .stdout))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Unexpected output from `{command}`: {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

impl CommandError {
    /// The command line that failed.
    pub fn command(&self) -> &str {
        match self {
            CommandError::Spawn { command, .. }
            | CommandError::Failed { command, .. }
            | CommandError::UnexpectedOutput { command, .. } => command,
        }
    }

    /// Captured stdout and stderr, trimmed and joined, for hook diagnosis.
    pub fn hook_output(&self) -> String {
        match self {
            CommandError::Spawn { .. } | CommandError::UnexpectedOutput { .. } => String::new(),
            CommandError::Failed { stdout, stderr, .. } => [stdout.trim(), stderr.trim()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

fn summarize_output(stderr: &str, stdout: &str) -> String {
    let detail = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

/// Errors from the chat-completion endpoint.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No {0} configured. Run `aicommit set-{0} <value>` first")]
    NotConfigured(&'static str),

    #[error("Chat request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Chat endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Diff exceeds the model's context window: {0}")]
    ContextLengthExceeded(String),

    #[error("Chat endpoint reported an error{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Api {
        code: Option<String>,
        message: String,
    },

    #[error("Chat endpoint returned an unreadable body: {0}")]
    InvalidBody(String),
}

/// Errors from normalizing a chat completion into one message.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Completion has no choices[0].message.content")]
    MissingContent,

    #[error("Streamed completion contained no usable fragments")]
    EmptyStream,
}

/// Errors from one AI call (commit message or diagnosis).
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Errors from the persisted settings store.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine a config directory; set AICOMMIT_CONFIG_DIR")]
    NoConfigDir,

    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml_edit::TomlError),

    #[error("Invalid max token value \"{0}\": expected a positive integer")]
    InvalidMaxToken(String),

    #[error("{0}")]
    Selection(String),
}

/// Fatal outcomes of the commit-and-sync workflow.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("git is not installed. Install git and try again")]
    GitNotInstalled,

    #[error("Current directory is not a git repository. Run `git init` first\n{0}")]
    NotARepository(#[source] CommandError),

    #[error("Conflict markers found, resolve these files manually:\n  - {}", .files.join("\n  - "))]
    ManualResolutionRequired { files: Vec<String> },

    #[error("Resolve the git conflicts manually, then run again")]
    ConflictNotConfirmed,

    #[error("Unresolved merge conflicts remain. Resolve them and run again")]
    UnresolvedMerge,

    #[error("Failed to finish the in-progress merge: {0}")]
    MergeFinalize(#[source] CommandError),

    #[error("git user.name is not set. Run `git config user.name <your name>`")]
    IdentityMissing,

    #[error("Failed to generate commit message: {source}{}", .hint.as_deref().map(|h| format!("\n{h}")).unwrap_or_default())]
    Generation {
        #[source]
        source: GenerationError,
        hint: Option<String>,
    },

    #[error("Generated commit message does not match the required format:\n{message}")]
    GrammarValidation { message: String },

    #[error("git commit failed{}{}", .diagnosis.as_deref().map(|d| format!(", AI diagnosis:\n{d}")).unwrap_or_default(), .usage.as_deref().map(|u| format!("\n\n{u}")).unwrap_or_default())]
    CommitFailed {
        diagnosis: Option<String>,
        usage: Option<String>,
        #[source]
        source: CommandError,
    },

    #[error("No usable git remote found: {0}")]
    RemoteResolution(String),

    #[error("Failed to push to the remote: {0}")]
    PushFailed(#[source] CommandError),

    #[error("git command failed: {0}")]
    Git(#[from] CommandError),

    #[error("Prompt failed: {0}")]
    Prompt(String),
}
