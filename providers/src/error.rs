use reqwest::StatusCode;
use thiserror::Error;

/// Problems with the configuration the client is built from.
///
/// These are startup-class failures: they are never retried by the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} is not set; the completion client cannot be constructed without it")]
    MissingCredential { var: &'static str },
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    /// Non-2xx response, either non-retryable or after retries ran out.
    #[error("API error {status} after {attempts} attempt(s): {body}")]
    Status {
        status: StatusCode,
        body: String,
        attempts: u32,
    },
    /// Transport failure (connect, timeout) after retries ran out.
    #[error("connection error after {attempts} attempt(s): {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    /// Transport failure on the first attempt that cannot be retried.
    #[error("request error: {0}")]
    Request(#[source] reqwest::Error),
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response contained no choices")]
    EmptyResponse,
}

impl ClientError {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Number of attempts made before giving up, when a request was sent.
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Status { attempts, .. } | Self::Connection { attempts, .. } => Some(*attempts),
            Self::Request(_) => Some(1),
            _ => None,
        }
    }
}
