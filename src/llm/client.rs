//! OpenAI-compatible chat client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::pick_random;
use crate::error::ChatError;
use crate::llm::completion::{CompletionBody, api_error};

/// Request timeout for chat and model-list calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// What the caller wants sent. `model: None` picks a configured model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    /// Ollama-style reasoning switch.
    think: bool,
    /// Provider-style reasoning switch.
    thinking: Thinking,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Stable end-user id.
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Chat endpoint operations used by the commit workflow and `set-model`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// One chat completion. Returns the raw body for normalization.
    async fn chat(&self, request: ChatRequest) -> Result<CompletionBody, ChatError>;

    /// Model ids offered by the endpoint, filtered by the configured policy.
    async fn list_models(&self) -> Result<Vec<String>, ChatError>;
}

/// Case-insensitive substring filter for model ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFilter {
    excluded: Vec<String>,
}

impl Default for ModelFilter {
    fn default() -> Self {
        Self::new(["embedding", "reranker"])
    }
}

impl ModelFilter {
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded: excluded
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Comma-separated setting value; `None` keeps the defaults.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value {
            Some(list) => Self::new(list.split(',')),
            None => Self::default(),
        }
    }

    pub fn allows(&self, model: &str) -> bool {
        let model = model.to_lowercase();
        !self.excluded.iter().any(|e| model.contains(e.as_str()))
    }

    pub fn apply(&self, models: Vec<String>) -> Vec<String> {
        models.into_iter().filter(|m| self.allows(m)).collect()
    }
}

/// Endpoint settings. Each list is comma-split from the stored settings.
#[derive(Clone, Default)]
pub struct ChatEndpoint {
    pub base_urls: Vec<String>,
    pub keys: Vec<String>,
    pub models: Vec<String>,
    pub filter: ModelFilter,
    pub device_id: Option<String>,
}

/// [`ChatClient`] backed by reqwest.
pub struct HttpChatClient {
    client: Client,
    endpoint: ChatEndpoint,
}

impl HttpChatClient {
    pub fn new(endpoint: ChatEndpoint) -> Result<Self, ChatError> {
        Self::with_timeout(endpoint, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: ChatEndpoint, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    fn authorize(&self, request: RequestBuilder, key: Option<&String>) -> RequestBuilder {
        match key {
            Some(key) if !key.is_empty() => request.bearer_auth(key),
            _ => request,
        }
    }
}

fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

/// Turn a non-success response into the most specific error available.
fn status_error(status: StatusCode, body: String) -> ChatError {
    match serde_json::from_str::<Value>(&body) {
        Ok(value) if value.get("error").is_some_and(|e| !e.is_null()) => {
            match api_error(&value["error"]) {
                ChatError::Api { code: None, message } => ChatError::Api {
                    code: Some(status.as_u16().to_string()),
                    message,
                },
                other => other,
            }
        }
        _ => ChatError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn chat(&self, request: ChatRequest) -> Result<CompletionBody, ChatError> {
        let base = pick_random(&self.endpoint.base_urls).ok_or(ChatError::NotConfigured("baseURL"))?;
        let model = match &request.model {
            Some(model) => model.clone(),
            None => pick_random(&self.endpoint.models)
                .cloned()
                .ok_or(ChatError::NotConfigured("model"))?,
        };
        let key = pick_random(&self.endpoint.keys);

        let body = ChatCompletionRequest {
            model: &model,
            messages: &request.messages,
            stream: false,
            think: false,
            thinking: Thinking { kind: "disabled" },
            temperature: request.temperature,
            user: self.endpoint.device_id.as_deref(),
        };

        let url = endpoint_url(base, "chat/completions");
        debug!(url = %url, model = %model, "chat completion");
        let response = self
            .authorize(self.client.post(&url), key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, text));
        }
        Ok(CompletionBody::from_text(&text))
    }

    async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let base = self
            .endpoint
            .base_urls
            .first()
            .ok_or(ChatError::NotConfigured("baseURL"))?;
        let url = endpoint_url(base, "models");
        let response = self
            .authorize(self.client.get(&url), self.endpoint.keys.first())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, text));
        }

        let list: ModelList =
            serde_json::from_str(&text).map_err(|e| ChatError::InvalidBody(e.to_string()))?;
        Ok(self
            .endpoint
            .filter
            .apply(list.data.into_iter().map(|m| m.id).collect()))
    }
}
