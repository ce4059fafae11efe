//! Git operations through the system `git` binary.

pub mod conflict;
pub mod executor;
pub mod service;
pub mod status;

#[cfg(test)]
pub(crate) mod fake;

pub use conflict::{ConflictScan, has_conflict_markers, scan_conflicts};
pub use executor::{CommandExecutor, ExecOptions, SystemExecutor};
pub use service::{CommitMode, GitService, PushCount, StagedDiff};
pub use status::{ConflictState, StatusClassification, StatusEntry, parse_porcelain};
