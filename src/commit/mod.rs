//! AI-generated commit messages and the commit-and-sync workflow.

pub mod ai;
pub mod message;
pub mod workflow;

pub use ai::{CommitMessageService, FailureContext};
pub use message::{COMMIT_TYPES, CommitGrammar, format_message};
pub use workflow::{COMMIT_DELAY, CommitOptions, CommitWorkflow, Session, WorkflowOutcome};
