//! Normalizing chat completions into a single assistant message.
//!
//! Endpoints answer either with one JSON completion object or with a raw
//! server-sent-event body (`data: {...}` lines ending with `data: [DONE]`),
//! even when streaming was not requested. Both shapes are reduced to the
//! content of the first choice.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ChatError, CompletionError};

/// Raw response body of one chat call.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionBody {
    /// A single JSON completion object.
    Structured(Value),
    /// Anything else, usually SSE text.
    Stream(String),
}

impl CompletionBody {
    /// Classify a response body: a JSON object is structured, everything
    /// else is treated as stream text.
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) if value.is_object() => CompletionBody::Structured(value),
            _ => CompletionBody::Stream(text.to_string()),
        }
    }

    /// An error object returned in place of choices.
    pub fn error_payload(&self) -> Option<ChatError> {
        let CompletionBody::Structured(value) = self else {
            return None;
        };
        let error = value.get("error")?;
        if value.get("choices").is_some_and(|c| !c.is_null()) {
            return None;
        }
        Some(api_error(error))
    }

    /// Token counters reported with the completion, if any.
    pub fn usage(&self) -> Option<Usage> {
        match self {
            CompletionBody::Structured(value) => Usage::from_value(value.get("usage")?),
            CompletionBody::Stream(text) => sse_payloads(text)
                .filter_map(|chunk| chunk.get("usage").and_then(Usage::from_value))
                .last(),
        }
    }
}

/// Build [`ChatError::Api`] (or the context-length variant) from an
/// OpenAI-style `error` object or string.
pub fn api_error(error: &Value) -> ChatError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| error.as_str().map(str::to_string))
        .unwrap_or_else(|| error.to_string());
    let code = error.get("code").and_then(|c| match c {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    if code.as_deref() == Some("context_length_exceeded") {
        return ChatError::ContextLengthExceeded(message);
    }
    ChatError::Api { code, message }
}

/// Token counters from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn summary(&self) -> String {
        format!(
            "Token usage: {} total ({} prompt, {} completion)",
            self.total_tokens, self.prompt_tokens, self.completion_tokens
        )
    }
}

/// One folded choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldedMessage {
    pub role: String,
    pub content: String,
    pub reasoning: String,
    pub finish_reason: Option<String>,
}

/// Extract the assistant message content.
pub fn normalize(body: &CompletionBody) -> Result<String, CompletionError> {
    match body {
        CompletionBody::Structured(value) => value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(CompletionError::MissingContent),
        CompletionBody::Stream(text) => {
            let folded = fold_stream(text);
            if folded.is_empty() {
                return Err(CompletionError::EmptyStream);
            }
            // Lowest index wins; normally index 0.
            folded
                .into_values()
                .next()
                .map(|message| message.content)
                .ok_or(CompletionError::EmptyStream)
        }
    }
}

/// Fold SSE fragments per choice index. Delta content is appended in
/// arrival order; a full `message` replaces what was accumulated.
pub fn fold_stream(text: &str) -> BTreeMap<u64, FoldedMessage> {
    let mut choices: BTreeMap<u64, FoldedMessage> = BTreeMap::new();

    for chunk in sse_payloads(text) {
        let Some(items) = chunk.get("choices").and_then(Value::as_array) else {
            continue;
        };
        for choice in items {
            let index = choice.get("index").and_then(Value::as_u64).unwrap_or(0);
            let target = choices.entry(index).or_insert_with(|| FoldedMessage {
                role: "assistant".to_string(),
                ..FoldedMessage::default()
            });

            if let Some(delta) = choice.get("delta") {
                if let Some(role) = delta.get("role").and_then(Value::as_str)
                    && target.role == "assistant"
                {
                    target.role = role.to_string();
                }
                if let Some(content) = delta.get("content").and_then(Value::as_str) {
                    target.content.push_str(content);
                }
                if let Some(reasoning) = delta
                    .get("reasoning_content")
                    .or_else(|| delta.get("reasoning"))
                    .and_then(Value::as_str)
                {
                    target.reasoning.push_str(reasoning);
                }
            }

            if let Some(message) = choice.get("message")
                && let Some(content) = message.get("content").and_then(Value::as_str)
            {
                if let Some(role) = message.get("role").and_then(Value::as_str) {
                    target.role = role.to_string();
                }
                target.content = content.to_string();
            }

            if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                target.finish_reason = Some(reason.to_string());
            }
        }
    }

    choices
}

/// Parsed JSON payloads of every `data:` line. Non-JSON payloads and the
/// `[DONE]` sentinel are skipped.
fn sse_payloads(text: &str) -> impl Iterator<Item = Value> + '_ {
    text.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .filter(|payload| !payload.is_empty() && *payload != "[DONE]")
        .filter(|payload| payload.starts_with('{') || payload.starts_with('['))
        .filter_map(|payload| match serde_json::from_str::<Value>(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, "skipping malformed SSE fragment");
                None
            }
        })
}
