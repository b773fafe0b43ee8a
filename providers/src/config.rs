//! Client configuration resolved from the process environment.
//!
//! Only the credential is required. Base URL and model fall back to
//! [`ClientDefaults`] (typically from the config file) and then to built-in
//! values. Environment variables always win.

use fanout_types::{ApiKey, NonEmptyString};
use url::Url;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV: &str = "FANOUT_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Non-secret settings used when the environment does not provide them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDefaults {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_key: ApiKey,
    base_url: Url,
    model: NonEmptyString,
    retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(api_key: ApiKey, base_url: &str, model: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key,
            base_url: parse_base_url(base_url)?,
            model: NonEmptyString::new(model.trim()).map_err(|_| ConfigError::InvalidValue {
                var: MODEL_ENV,
                reason: "model name must not be empty".to_string(),
            })?,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&ClientDefaults::default())
    }

    pub fn from_env_with(defaults: &ClientDefaults) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok(), defaults)
    }

    /// Resolve configuration through `lookup` instead of the live environment.
    pub fn from_lookup<L>(lookup: L, defaults: &ClientDefaults) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV)
            .and_then(|raw| ApiKey::new(&raw).ok())
            .ok_or(ConfigError::MissingCredential { var: API_KEY_ENV })?;

        let base_url = non_blank(lookup(BASE_URL_ENV))
            .or_else(|| non_blank(defaults.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let model = non_blank(lookup(MODEL_ENV))
            .or_else(|| non_blank(defaults.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self::new(api_key, &base_url, &model)
    }

    /// Replace the retry policy. Applied at construction; the client built
    /// from this config uses it for every call.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.model.as_str()
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Absolute URL for an API path relative to the base URL.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidValue {
        var: BASE_URL_ENV,
        reason: format!("{e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            var: BASE_URL_ENV,
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}
