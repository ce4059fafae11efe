//! Commit-message generation and commit-failure diagnosis.

use tracing::debug;

use crate::error::GenerationError;
use crate::llm::completion::{CompletionBody, Usage, normalize};
use crate::llm::prompt::{
    DIAGNOSIS_SYSTEM_PROMPT, DIAGNOSIS_TEMPERATURE, NO_CONTEXT_PLACEHOLDER, commit_system_prompt,
};
use crate::llm::{ChatClient, ChatMessage, ChatRequest};

/// Context handed to the diagnosis call. Empty fields are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    pub error_message: String,
    pub status_text: String,
    pub hook_logs: String,
}

impl FailureContext {
    fn user_prompt(&self) -> String {
        let sections = [
            ("Error message", &self.error_message),
            ("Repository status", &self.status_text),
            ("Hook output", &self.hook_logs),
        ];
        let parts: Vec<String> = sections
            .iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(title, text)| format!("{title}:\n{}", text.trim()))
            .collect();

        if parts.is_empty() {
            NO_CONTEXT_PLACEHOLDER.to_string()
        } else {
            parts.join("\n\n")
        }
    }
}

/// Wraps a [`ChatClient`] for the two AI calls of a commit run.
pub struct CommitMessageService<C> {
    client: C,
    scope: String,
    usage: Option<Usage>,
}

impl<C: ChatClient> CommitMessageService<C> {
    /// `scope` is the committer's user name, embedded in the system prompt.
    pub fn new(client: C, scope: impl Into<String>) -> Self {
        Self {
            client,
            scope: scope.into(),
            usage: None,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    /// Ask the model for a commit message for `diff`.
    ///
    /// Returns the extracted assistant text; formatting and grammar checks
    /// are up to the caller.
    pub async fn generate_commit_message(&mut self, diff: &str) -> Result<String, GenerationError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(commit_system_prompt(&self.scope)),
            ChatMessage::user(diff),
        ]);
        let body = self.complete(request).await?;
        let message = normalize(&body)?;
        debug!(length = message.len(), "commit message generated");
        Ok(message)
    }

    /// Ask the model why `git commit` failed.
    pub async fn analyze_failure(
        &mut self,
        context: &FailureContext,
    ) -> Result<String, GenerationError> {
        self.usage = None;
        let request = ChatRequest::new(vec![
            ChatMessage::system(DIAGNOSIS_SYSTEM_PROMPT),
            ChatMessage::user(context.user_prompt()),
        ])
        .with_temperature(DIAGNOSIS_TEMPERATURE);

        let body = self.complete(request).await?;
        Ok(normalize(&body)?.trim().to_string())
    }

    async fn complete(&mut self, request: ChatRequest) -> Result<CompletionBody, GenerationError> {
        let body = self.client.chat(request).await?;
        if let Some(err) = body.error_payload() {
            return Err(err.into());
        }
        self.usage = body.usage();
        Ok(body)
    }

    /// Usage of the most recent call.
    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    pub fn usage_summary(&self) -> Option<String> {
        self.usage.map(|u| u.summary())
    }
}
