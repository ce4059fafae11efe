//! aicommit - stage, commit with an AI-generated message, and sync.
//!
//! # Overview
//!
//! aicommit stages the working tree, asks an OpenAI-compatible chat endpoint
//! for a `type(scope): subject` commit message scoped to the committer,
//! validates and commits it, then fetches, merges and pushes the current
//! branch. Every git command and warning of a run is collected and written
//! to a dated log file.

pub mod commands;
pub mod commit;
pub mod config;
pub mod error;
pub mod git;
pub mod interrupt;
pub mod llm;
pub mod logging;
pub mod prompt;

// Re-export commonly used types
pub use commit::{CommitGrammar, CommitOptions, CommitWorkflow, WorkflowOutcome, format_message};
pub use config::Settings;
pub use error::{
    ChatError, CommandError, CompletionError, ConfigError, GenerationError, WorkflowError,
};
pub use logging::{Console, RunLog};
