//! End-to-end commit runs: real repository, bare remote, mocked chat endpoint.

mod common;

use std::time::Duration;

use aicommit::commit::{CommitOptions, CommitWorkflow, WorkflowOutcome};
use aicommit::error::WorkflowError;
use aicommit::git::{GitService, SystemExecutor};
use aicommit::llm::{ChatEndpoint, HttpChatClient, ModelFilter};
use aicommit::logging::{Console, RunLog};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{FixedPrompter, TestRepo, completion_json};

type Workflow = CommitWorkflow<SystemExecutor, HttpChatClient, FixedPrompter>;

fn workflow(repo: &TestRepo, server: &MockServer, log: &RunLog) -> Workflow {
    let client = HttpChatClient::new(ChatEndpoint {
        base_urls: vec![format!("{}/v1", server.uri())],
        keys: vec!["sk-test".to_string()],
        models: vec!["m1".to_string()],
        filter: ModelFilter::default(),
        device_id: None,
    })
    .unwrap();
    CommitWorkflow::new(
        GitService::new(SystemExecutor::in_dir(repo.path(), log.clone())),
        client,
        FixedPrompter::default(),
        Console::new(log.clone()),
        CommitOptions {
            commit_delay: Duration::ZERO,
            ..CommitOptions::default()
        },
    )
}

async fn answering(content: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_json(content)))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_commit_and_push_creates_remote_branch() {
    let repo = TestRepo::new();
    repo.commit("chore: initial");
    let remote = repo.add_bare_remote();
    repo.write("hello.txt", "hello\n");

    let server = answering("<think>scope is alice</think>\nfeat(alice): add greeting\n\nAdds hello.txt").await;
    let log = RunLog::new();
    let outcome = workflow(&repo, &server, &log).run().await.unwrap();

    let expected = "feat(alice): add greeting\n\nAdds hello.txt";
    assert_eq!(
        outcome,
        WorkflowOutcome::Completed {
            message: Some(expected.to_string()),
            pushed: true
        }
    );
    assert_eq!(repo.head_message(), expected);
    assert!(remote.has_branch("main"));
    assert_eq!(remote.tip_message("main"), expected);
    assert!(!log.has_errors());
}

#[tokio::test]
async fn test_no_changes_makes_no_ai_call() {
    let repo = TestRepo::new();
    repo.commit("chore: initial");
    let remote = repo.add_bare_remote();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_json("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = workflow(&repo, &server, &RunLog::new()).run().await.unwrap();
    assert_eq!(outcome, WorkflowOutcome::NothingToCommit);
    assert_eq!(repo.head_message(), "chore: initial");
    assert!(!remote.has_branch("main"));
}

#[tokio::test]
async fn test_grammar_failure_keeps_changes_staged() {
    let repo = TestRepo::new();
    repo.commit("chore: initial");
    let _remote = repo.add_bare_remote();
    repo.write("hello.txt", "hello\n");

    let server = answering("feat(bob): add greeting").await;
    let err = workflow(&repo, &server, &RunLog::new())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::GrammarValidation { .. }));
    assert_eq!(repo.head_message(), "chore: initial");
    assert_eq!(repo.git(&["diff", "--staged", "--name-only"]), "hello.txt");
}

#[tokio::test]
async fn test_context_length_failure_unstages() {
    let repo = TestRepo::new();
    repo.commit("chore: initial");
    let _remote = repo.add_bare_remote();
    repo.write("hello.txt", "hello\n");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "too long", "code": "context_length_exceeded"}
        })))
        .mount(&server)
        .await;

    let err = workflow(&repo, &server, &RunLog::new())
        .run()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("set-max-token"));
    assert_eq!(repo.git(&["diff", "--staged", "--name-only"]), "");
    assert!(repo.path().join("hello.txt").exists());
}

#[tokio::test]
async fn test_remote_commits_are_merged_before_push() {
    let repo = TestRepo::new();
    repo.commit("chore: initial");
    let remote = repo.add_bare_remote();
    repo.publish();
    repo.git(&["branch", "--set-upstream-to=origin/main", "main"]);
    remote.push_from_elsewhere("bob.txt", "from bob\n", "feat(bob): add bob");
    repo.write("hello.txt", "hello\n");

    let server = answering("feat(alice): add greeting").await;
    let outcome = workflow(&repo, &server, &RunLog::new()).run().await.unwrap();

    assert!(matches!(outcome, WorkflowOutcome::Completed { pushed: true, .. }));
    assert!(repo.path().join("bob.txt").exists());
    assert_eq!(remote.tip_parent_count("main"), 2);
}

#[tokio::test]
async fn test_conflict_markers_stop_the_run() {
    let repo = TestRepo::new();
    repo.write("a.txt", "one\n");
    repo.git(&["add", "."]);
    repo.git(&["commit", "-m", "chore: initial"]);
    repo.write("a.txt", "<<<<<<< HEAD\nours\n=======\ntheirs\n>>>>>>> other\n");

    let server = MockServer::start().await;
    let err = workflow(&repo, &server, &RunLog::new())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::ManualResolutionRequired { ref files } if files == &["a.txt"]
    ));
    assert_eq!(repo.git(&["diff", "--staged", "--name-only"]), "");
}

#[tokio::test]
async fn test_run_log_records_commit_command() {
    let repo = TestRepo::new();
    repo.commit("chore: initial");
    let _remote = repo.add_bare_remote();
    repo.write("hello.txt", "hello\n");

    let server = answering("feat(alice): add greeting").await;
    let log = RunLog::new();
    workflow(&repo, &server, &log).run().await.unwrap();

    let logs = tempfile::tempdir().unwrap();
    let file = log.flush(logs.path()).unwrap().unwrap();
    let content = std::fs::read_to_string(file).unwrap();
    assert!(content.contains("Command: git commit -F -"));
    assert!(content.contains("[Buffer length="));
    assert!(content.contains("Command: git push -u origin main"));
}
