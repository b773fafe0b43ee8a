//! Chat-completions client.
//!
//! Requests go to `{base_url}/chat/completions` with bearer auth. Every call
//! runs through [`send_with_retry`] with the policy fixed in the client's
//! [`ClientConfig`].

use fanout_types::{ChatMessage, NonEmptyString};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::retry::{RetryPolicy, send_with_retry};

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// First choice of a completion response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl AiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let https_only = config.base_url().scheme() == "https";
        let http = crate::http_client(config.retry_policy().timeout, https_only)
            .map_err(ClientError::Build)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.config.model()
    }

    #[must_use]
    pub fn base_url(&self) -> &url::Url {
        self.config.base_url()
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.config.retry_policy()
    }

    /// Single-turn completion with the configured model.
    pub async fn prompt(&self, prompt: &NonEmptyString) -> Result<Completion, ClientError> {
        let request = ChatRequest::new(self.model(), vec![ChatMessage::user(prompt.clone())]);
        self.complete(&request).await
    }

    pub async fn complete(&self, request: &ChatRequest) -> Result<Completion, ClientError> {
        let response: ChatResponse = self.post_json(CHAT_COMPLETIONS_PATH, request).await?;
        let usage = response.usage;
        let model = response.model;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(ClientError::EmptyResponse)?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            model,
            finish_reason: choice.finish_reason,
            usage,
        })
    }

    /// POST a JSON body to `path` (relative to the base URL) and decode the
    /// JSON response. The payload shape is up to the caller.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        let api_key = self.config.api_key().expose_secret();

        let bytes = send_with_retry(
            || self.http.post(&url).bearer_auth(api_key).json(body),
            Response::bytes,
            self.config.retry_policy(),
        )
        .await?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}
