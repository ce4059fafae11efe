//! The default command: generate a commit message, commit and sync.

use anyhow::{Context, Result};

use crate::commit::{CommitOptions, CommitWorkflow, WorkflowOutcome};
use crate::config::Settings;
use crate::git::{GitService, SystemExecutor};
use crate::llm::HttpChatClient;
use crate::logging::Console;
use crate::prompt::DialoguerPrompter;

/// Run the workflow in the current directory with the stored settings.
/// The diff budget comes from `maxToken`, overriding `options.max_token`.
pub async fn run(
    settings: &mut Settings,
    console: &Console,
    options: CommitOptions,
) -> Result<WorkflowOutcome> {
    if let Err(e) = settings.device_id() {
        console.log().warning(&e.to_string(), Some("device id"));
    }

    let client = HttpChatClient::new(settings.chat_endpoint())
        .context("Failed to create the HTTP client")?;
    let options = CommitOptions {
        max_token: settings.max_token(),
        ..options
    };
    let git = GitService::new(SystemExecutor::new(console.log().clone()));

    let mut workflow = CommitWorkflow::new(git, client, DialoguerPrompter, console.clone(), options);
    let outcome = workflow.run().await?;
    if let WorkflowOutcome::Completed { pushed: true, .. } = outcome {
        console.success("All changes committed and pushed");
    }
    Ok(outcome)
}
