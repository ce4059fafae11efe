//! The commit-and-sync state machine.
//!
//! One run walks these steps in order, each depending on the previous one:
//!
//! 1. check git and the repository, resolve the working prefix
//! 2. check conflicts, stage, finish an in-progress merge
//! 3. read the committer identity, compute the staged diff
//! 4. generate, validate and commit the message
//! 5. resolve branch and remote, fetch, merge, re-check conflicts, push
//!
//! Any fatal error after `git add` unstages the index again, except a
//! rejected commit message, which leaves the changes staged for a retry.
//! A failed push also unstages.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::commit::ai::{CommitMessageService, FailureContext};
use crate::commit::message::{CommitGrammar, format_message};
use crate::config::DEFAULT_MAX_TOKEN;
use crate::error::{ChatError, CommandError, GenerationError, WorkflowError};
use crate::git::{
    CommandExecutor, CommitMode, ConflictState, GitService, PushCount, StatusClassification,
    StatusEntry, scan_conflicts,
};
use crate::llm::ChatClient;
use crate::logging::Console;
use crate::prompt::Prompter;

/// Pause before `git commit`, so the generated message can be read.
pub const COMMIT_DELAY: Duration = Duration::from_secs(1);

/// Ignored paths listed one by one up to this many.
const MAX_LISTED_IGNORED: usize = 6;

/// Flags of the default command.
#[derive(Debug, Clone)]
pub struct CommitOptions {
    pub allow_empty: bool,
    pub no_verify: bool,
    /// Commit only what is already staged.
    pub skip_add: bool,
    /// Diff length (in characters) above which `--stat` is sent instead.
    pub max_token: usize,
    pub commit_delay: Duration,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            allow_empty: false,
            no_verify: false,
            skip_add: false,
            max_token: DEFAULT_MAX_TOKEN,
            commit_delay: COMMIT_DELAY,
        }
    }
}

impl CommitOptions {
    pub fn mode(&self) -> CommitMode {
        CommitMode::from_flags(self.allow_empty, self.no_verify)
    }
}

/// State carried through one run.
#[derive(Debug, Default)]
pub struct Session {
    pub working_prefix: String,
    pub root: PathBuf,
    pub user_name: String,
    pub grammar: Option<CommitGrammar>,
    pub diff: String,
    pub message: Option<String>,
    pub conflict: ConflictState,
    pub branch: String,
    pub remote: String,
    pub merge_finalized: bool,
    pub merge_recovery_used: bool,
    /// The index holds changes this run has not committed yet.
    pub staged: bool,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// No staged changes; nothing was generated, committed or pushed.
    NothingToCommit,
    Completed {
        /// The AI commit message, absent when only a merge was concluded.
        message: Option<String>,
        pushed: bool,
    },
}

/// Drives one commit run over git, the chat endpoint and the terminal.
pub struct CommitWorkflow<E, C, P> {
    git: GitService<E>,
    ai: CommitMessageService<C>,
    prompter: P,
    console: Console,
    options: CommitOptions,
    session: Session,
}

impl<E, C, P> CommitWorkflow<E, C, P>
where
    E: CommandExecutor,
    C: ChatClient,
    P: Prompter,
{
    pub fn new(
        git: GitService<E>,
        client: C,
        prompter: P,
        console: Console,
        options: CommitOptions,
    ) -> Self {
        Self {
            git,
            ai: CommitMessageService::new(client, ""),
            prompter,
            console,
            options,
            session: Session::default(),
        }
    }

    pub fn git(&self) -> &GitService<E> {
        &self.git
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn run(&mut self) -> Result<WorkflowOutcome, WorkflowError> {
        let result = self.run_steps().await;
        if let Err(e) = &result
            && self.session.staged
            && !matches!(e, WorkflowError::GrammarValidation { .. })
        {
            self.rollback();
        }
        result
    }

    async fn run_steps(&mut self) -> Result<WorkflowOutcome, WorkflowError> {
        self.check_environment()?;
        self.check_conflicts()?;
        self.stage()?;
        self.resolve_merge_state()?;
        self.read_identity()?;
        self.compute_diff()?;

        let message = self.generate_and_commit().await?;
        if message.is_none() && !self.session.merge_finalized {
            return Ok(WorkflowOutcome::NothingToCommit);
        }
        self.session.message = message.clone();

        self.resolve_branch()?;
        self.resolve_remote()?;
        self.fetch();
        self.merge_remote()?;
        self.check_conflicts()?;
        let pushed = self.push()?;

        Ok(WorkflowOutcome::Completed { message, pushed })
    }

    fn check_environment(&mut self) -> Result<(), WorkflowError> {
        let version = self.git.check_installed()?;
        debug!(version = %version, "git found");
        self.git.check_repository()?;

        self.session.working_prefix = match self.git.working_prefix() {
            Ok(prefix) => prefix,
            Err(e) => {
                self.console
                    .log()
                    .warning(&e.to_string(), Some("working prefix"));
                String::new()
            }
        };
        if !self.session.working_prefix.is_empty() {
            self.console.warn(format!(
                "Working in subdirectory {}, only files under it are processed",
                self.session.working_prefix
            ));
        }
        self.session.root = self.git.toplevel()?;
        Ok(())
    }

    /// Fails on textual conflict markers; counts a round when git reports
    /// unmerged paths.
    fn check_conflicts(&mut self) -> Result<(), WorkflowError> {
        let entries = self.git.status()?;
        let classification = StatusClassification::from_entries(&entries);
        let scan = scan_conflicts(
            &classification.modified,
            &self.session.working_prefix,
            &self.session.root,
        );

        if !self.session.working_prefix.is_empty()
            && !scan.ignored.is_empty()
            && self.session.conflict == ConflictState::Clean
        {
            if scan.ignored.len() > MAX_LISTED_IGNORED {
                self.console.info(format!(
                    "Skipped the conflict-marker check for {} files",
                    scan.ignored.len()
                ));
            } else {
                self.console.info(format!(
                    "Skipped the conflict-marker check for:\n  - {}",
                    scan.ignored.join("\n  - ")
                ));
            }
            self.session.conflict.mark_ignored();
        }

        if scan.has_conflicts() {
            self.console.warn(format!(
                "Conflict markers found, merge these files manually:\n  - {}",
                scan.conflicted.join("\n  - ")
            ));
            return Err(WorkflowError::ManualResolutionRequired {
                files: scan.conflicted,
            });
        }

        if classification.unmerged.is_empty() {
            return Ok(());
        }
        let listed: Vec<String> = entries
            .iter()
            .filter(|e| e.is_unmerged())
            .map(|e| format!("[{}] {}", e.code, e.path))
            .collect();
        self.console
            .warn(format!("Git conflicts:\n  - {}", listed.join("\n  - ")));
        self.session.conflict.record_round();
        Ok(())
    }

    fn stage(&mut self) -> Result<(), WorkflowError> {
        if self.session.conflict.is_active() {
            let resolved = self
                .prompter
                .confirm("Have the conflicts been resolved?", false)
                .map_err(|e| WorkflowError::Prompt(e.to_string()))?;
            if !resolved {
                return Err(WorkflowError::ConflictNotConfirmed);
            }
        }

        if self.options.skip_add {
            self.console
                .info("Skipping git add, committing staged changes only");
            return Ok(());
        }
        self.git.add_all()?;
        self.session.staged = true;

        if self.session.conflict.is_active() {
            self.check_conflicts()?;
        }
        Ok(())
    }

    /// Conclude a merge left in progress, unless paths are still unmerged.
    fn resolve_merge_state(&mut self) -> Result<(), WorkflowError> {
        if !self.git.is_merging() {
            return Ok(());
        }
        let entries = self.git.status()?;
        if entries.iter().any(StatusEntry::is_unmerged) {
            return Err(WorkflowError::UnresolvedMerge);
        }

        self.console.info("Merge in progress, concluding it");
        if let Err(e) = self.git.finish_merge() {
            self.console.log().error(&e.to_string(), Some("finish merge"));
            self.console.error("Merge failed");
            return Err(WorkflowError::MergeFinalize(e));
        }
        self.console.success("Merge completed");
        self.session.merge_finalized = true;
        self.session.staged = false;
        Ok(())
    }

    fn read_identity(&mut self) -> Result<(), WorkflowError> {
        let name = self.git.user_name().ok_or(WorkflowError::IdentityMissing)?;
        self.session.grammar = Some(CommitGrammar::new(&name));
        self.ai.set_scope(name.as_str());
        self.session.user_name = name;
        Ok(())
    }

    fn compute_diff(&mut self) -> Result<(), WorkflowError> {
        let diff = self.git.staged_diff(self.options.max_token)?;
        if diff.condensed {
            self.console.info(format!(
                "Staged diff is over the {} character budget, sending a --stat summary",
                self.options.max_token
            ));
        }
        if !diff.text.trim().is_empty() {
            self.session.staged = true;
        }
        self.session.diff = diff.text;
        Ok(())
    }

    /// Returns the committed message, or `None` when there was nothing to
    /// commit.
    async fn generate_and_commit(&mut self) -> Result<Option<String>, WorkflowError> {
        if self.session.diff.trim().is_empty() {
            self.console.info(if self.session.working_prefix.is_empty() {
                "No changes to commit"
            } else {
                "No changes to commit in this directory"
            });
            return Ok(None);
        }
        let grammar = self
            .session
            .grammar
            .clone()
            .ok_or(WorkflowError::IdentityMissing)?;

        let message = self.generate_message(&grammar).await?;
        if let Some(usage) = self.ai.usage_summary() {
            self.console.info(usage);
        }

        self.console.step("Committing");
        tokio::time::sleep(self.options.commit_delay).await;
        match self.git.commit(self.options.mode(), &message) {
            Ok(_) => {
                self.session.staged = false;
                self.console.finish("Committing");
                self.console.success("git commit succeeded");
                Ok(Some(message))
            }
            Err(source) => {
                self.console.finish("Committing");
                self.console
                    .log()
                    .error(&source.to_string(), Some("git commit"));
                let diagnosis = self.diagnose(&source).await;
                let usage = diagnosis.as_ref().and_then(|_| self.ai.usage_summary());
                self.rollback();
                Err(WorkflowError::CommitFailed {
                    diagnosis,
                    usage,
                    source,
                })
            }
        }
    }

    async fn generate_message(&mut self, grammar: &CommitGrammar) -> Result<String, WorkflowError> {
        self.console.step("Generating commit message (Ctrl+C to abort)");
        let raw = match self.ai.generate_commit_message(&self.session.diff).await {
            Ok(raw) => raw,
            Err(source) => {
                self.console.finish("Generating commit message");
                self.console
                    .log()
                    .error(&source.to_string(), Some("generate commit message"));
                let hint = generation_hint(&source);
                return Err(WorkflowError::Generation { source, hint });
            }
        };
        self.console.finish("Generating commit message");

        let message = format_message(&raw, grammar);
        if !grammar.is_match(&message) {
            if message.is_empty() {
                self.console.error("AI returned an empty commit message");
            } else {
                self.console.error(format!("AI generated:\n{message}"));
            }
            return Err(WorkflowError::GrammarValidation { message });
        }
        self.console.success(format!("AI generated:\n{message}"));
        Ok(message)
    }

    /// Best-effort AI explanation of a failed commit.
    async fn diagnose(&mut self, error: &CommandError) -> Option<String> {
        self.console.step("Asking AI why git commit failed");
        let context = FailureContext {
            error_message: error.to_string(),
            status_text: self.git.status_text().unwrap_or_default(),
            hook_logs: error.hook_output(),
        };
        let result = self.ai.analyze_failure(&context).await;
        self.console.finish("Asking AI why git commit failed");

        match result {
            Ok(diagnosis) if !diagnosis.is_empty() => Some(diagnosis),
            Ok(_) => None,
            Err(e) => {
                self.console
                    .log()
                    .warning(&e.to_string(), Some("commit diagnosis"));
                self.console.warn("Could not get an AI diagnosis of the failure");
                None
            }
        }
    }

    /// Unstage after a failure. A failed reset is only reported.
    fn rollback(&mut self) {
        self.session.staged = false;
        if let Err(e) = self.git.reset() {
            self.console
                .warn(format!("Failed to reset the staging area: {e}"));
        }
    }

    fn resolve_branch(&mut self) -> Result<(), WorkflowError> {
        self.session.branch = self.git.current_branch().inspect_err(|_| {
            self.console
                .error("Could not read the current branch, check the git setup");
        })?;
        Ok(())
    }

    fn resolve_remote(&mut self) -> Result<(), WorkflowError> {
        self.console.info("Resolving git remote");
        self.session.remote = self
            .git
            .remote_name(&self.session.branch)
            .inspect_err(|_| {
                self.console
                    .error("Could not resolve a git remote, check the git setup");
            })?;
        self.console
            .success(format!("Using remote {}", self.session.remote));
        Ok(())
    }

    /// Failure leaves a stale remote view and is only a warning.
    fn fetch(&self) {
        self.console
            .info(format!("Fetching {}", self.session.remote));
        match self.git.fetch(&self.session.remote) {
            Ok(()) => self
                .console
                .success(format!("Fetched the latest state of {}", self.session.remote)),
            Err(e) => {
                self.console.log().warning(&e.to_string(), Some("fetch"));
                self.console.warn(format!("Fetch failed: {e}"));
            }
        }
    }

    /// A failed merge gets one recovery: conclude whatever merge git left
    /// in progress, then merge again. A second failure is fatal.
    fn merge_remote(&mut self) -> Result<(), WorkflowError> {
        let (remote, branch) = (self.session.remote.clone(), self.session.branch.clone());
        if !self.git.remote_branch_exists(&remote, &branch) {
            self.console.info(format!(
                "{remote}/{branch} does not exist yet, nothing to merge"
            ));
            return Ok(());
        }

        loop {
            self.console.info("Checking whether a merge is needed");
            let merged = self.git.ahead_count(&remote, &branch).and_then(|ahead| {
                if ahead > 0 {
                    self.git.merge(&remote, &branch).map(|_| ahead)
                } else {
                    Ok(0)
                }
            });

            match merged {
                Ok(0) => {
                    self.console.success("Local branch is up to date");
                    return Ok(());
                }
                Ok(ahead) => {
                    self.console.success(format!(
                        "Local branch was {ahead} commit(s) behind {remote}/{branch}, merged"
                    ));
                    return Ok(());
                }
                Err(e) => {
                    self.console.log().warning(&e.to_string(), Some("merge"));
                    self.console.warn(format!("Merge failed: {e}"));
                    if self.session.merge_recovery_used {
                        self.console.error("Merge failed again, resolve it manually");
                        return Err(WorkflowError::Git(e));
                    }
                    self.session.merge_recovery_used = true;
                    self.resolve_merge_state()?;
                }
            }
        }
    }

    /// Returns whether anything was pushed.
    fn push(&mut self) -> Result<bool, WorkflowError> {
        let (remote, branch) = (self.session.remote.clone(), self.session.branch.clone());
        match self.git.push_count(&remote, &branch)? {
            PushCount::Ahead(0) => {
                self.console
                    .warn("Local and remote branches are identical, nothing to push");
                return Ok(false);
            }
            PushCount::RemoteBranchMissing => self.console.info(format!(
                "Remote branch {branch} does not exist, pushing it"
            )),
            PushCount::Ahead(count) => self
                .console
                .info(format!("Pushing {count} commit(s) to {remote}/{branch}")),
        }

        if let Err(e) = self.git.push(&remote, &branch) {
            self.console.log().error(&e.to_string(), Some("push"));
            self.console.error("Push failed");
            self.rollback();
            return Err(WorkflowError::PushFailed(e));
        }
        self.console.success(format!("Pushed to {remote}/{branch}"));
        Ok(true)
    }
}

/// Extra guidance for generation failures the user can act on.
fn generation_hint(error: &GenerationError) -> Option<String> {
    match error {
        GenerationError::Chat(ChatError::ContextLengthExceeded(_)) => Some(
            "The staged changes are too large for the model. Commit fewer files, \
             or lower the diff budget with `aicommit set-max-token <n>`."
                .to_string(),
        ),
        GenerationError::Chat(ChatError::Transport(_)) => {
            Some("Check the base URL and your network connection.".to_string())
        }
        _ => None,
    }
}
