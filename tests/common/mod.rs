//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use serde_json::{Value, json};

use aicommit::prompt::Prompter;

/// Committer name configured in every test repo; also the commit scope.
pub const USER_NAME: &str = "alice";

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty repository on `main` with a local identity.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).expect("Failed to init git repo");

        let mut config = repo.config().expect("Failed to open repo config");
        config
            .set_str("user.name", USER_NAME)
            .expect("Failed to set user.name");
        config
            .set_str("user.email", "alice@example.com")
            .expect("Failed to set user.email");
        config
            .set_bool("commit.gpgsign", false)
            .expect("Failed to set commit.gpgsign");

        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the test signature for commits.
    fn signature(&self) -> Signature<'_> {
        Signature::now("Test User", "test@example.com").expect("Failed to create signature")
    }

    /// Create a commit with the given message. Returns the commit OID.
    pub fn commit(&self, message: &str) -> Oid {
        let sig = self.signature();

        // Create or update a file to have something to commit
        let content = format!(
            "{}\n{}",
            message,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        );
        self.write("test.txt", &content);

        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new("test.txt")).expect("Failed to add file");
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Write a file relative to the repository root.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(&path, content).expect("Failed to write test file");
    }

    /// Run the git CLI in the repository and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        git_in(self.path(), args)
    }

    /// Message of the commit at HEAD, without the trailing newline.
    pub fn head_message(&self) -> String {
        head_message(&self.repo, "HEAD")
    }

    /// Attach a fresh bare repository as `origin`.
    pub fn add_bare_remote(&self) -> BareRemote {
        let dir = tempfile::tempdir().expect("Failed to create remote dir");
        let repo = Repository::init_bare(dir.path()).expect("Failed to init bare repo");
        self.repo
            .remote("origin", dir.path().to_str().expect("Invalid remote path"))
            .expect("Failed to add origin remote");
        BareRemote { dir, repo }
    }

    /// Push the current HEAD to `origin/main` and fetch it back.
    pub fn publish(&self) {
        self.git(&["push", "origin", "HEAD:refs/heads/main"]);
        self.git(&["fetch", "origin"]);
    }
}

/// A bare repository standing in for the remote.
pub struct BareRemote {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl BareRemote {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.repo
            .find_reference(&format!("refs/heads/{branch}"))
            .is_ok()
    }

    /// Message of the branch tip, without the trailing newline.
    pub fn tip_message(&self, branch: &str) -> String {
        head_message(&self.repo, &format!("refs/heads/{branch}"))
    }

    pub fn tip_parent_count(&self, branch: &str) -> usize {
        self.repo
            .revparse_single(&format!("refs/heads/{branch}"))
            .and_then(|obj| obj.peel_to_commit())
            .expect("Failed to find branch tip")
            .parent_count()
    }

    /// Clone `main` into a new working copy, add a commit touching `file`
    /// and push it back.
    pub fn push_from_elsewhere(&self, file: &str, content: &str, message: &str) {
        let clone = tempfile::tempdir().expect("Failed to create clone dir");
        let target: PathBuf = clone.path().join("work");
        git_in(
            clone.path(),
            &[
                "clone",
                "-b",
                "main",
                self.path().to_str().expect("Invalid remote path"),
                "work",
            ],
        );
        git_in(&target, &["config", "user.name", "bob"]);
        git_in(&target, &["config", "user.email", "bob@example.com"]);
        std::fs::write(target.join(file), content).expect("Failed to write file");
        git_in(&target, &["add", "."]);
        git_in(&target, &["commit", "-m", message]);
        git_in(&target, &["push", "origin", "main"]);
    }
}

fn head_message(repo: &Repository, spec: &str) -> String {
    let commit = repo
        .revparse_single(spec)
        .and_then(|obj| obj.peel_to_commit())
        .expect("Failed to find commit");
    commit
        .message()
        .expect("Commit message is not UTF-8")
        .trim_end()
        .to_string()
}

/// Run git in `dir`, panicking on failure.
pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Prompter with fixed answers.
#[derive(Debug, Clone, Default)]
pub struct FixedPrompter {
    pub confirm: bool,
    pub selection: Vec<usize>,
}

impl Prompter for FixedPrompter {
    fn confirm(&self, _message: &str, _default: bool) -> dialoguer::Result<bool> {
        Ok(self.confirm)
    }

    fn select_many(&self, _message: &str, _items: &[String]) -> dialoguer::Result<Vec<usize>> {
        Ok(self.selection.clone())
    }
}

/// A structured chat completion answering `content`.
pub fn completion_json(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 12, "total_tokens": 132}
    })
}
