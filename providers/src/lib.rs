//! Completion-service client with a lazily constructed, memoized handle.
//!
//! # Architecture
//!
//! - [`ClientHandle`] - deferred construction; the first [`ClientHandle::get`]
//!   builds the client, every later call returns the same instance
//! - [`AiClient`] - chat-completions client with a fixed [`RetryPolicy`]
//! - [`retry`] - retry loop, backoff, and retry headers
//! - [`ClientConfig`] - credential and endpoint resolved from the environment
//!
//! # Configuration
//!
//! The credential is read from `OPENAI_API_KEY` at first use, not at process
//! start. A missing credential is a [`ConfigError`] returned synchronously
//! from `get()`; the handle stays uninitialized and tries again on the next
//! call.
//!
//! # Resilience
//!
//! Every call through a client uses the same retry count and per-attempt
//! timeout. Callers cannot override them per call.

pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod retry;
#[cfg(test)]
mod test_support;

pub use client::{AiClient, ChatRequest, Completion, Usage};
pub use config::{ClientConfig, ClientDefaults};
pub use error::{ClientError, ConfigError};
pub use handle::{ClientHandle, HandleState};
pub use retry::RetryPolicy;

pub use fanout_types;

use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 30;

// reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

fn base_client_builder() -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        "X-Client-OS",
        HeaderValue::from_static(std::env::consts::OS),
    );
    default_headers.insert(
        "X-Client-Arch",
        HeaderValue::from_static(std::env::consts::ARCH),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

/// HTTP client whose every request is bounded by `timeout`.
///
/// HTTPS is enforced unless the configured endpoint is plain HTTP (local
/// gateways and test servers).
pub(crate) fn http_client(
    timeout: Duration,
    https_only: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder()
        .timeout(timeout)
        .https_only(https_only)
        .build()
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::debug!(error = %err, "Error body ended early");
                let text = String::from_utf8_lossy(&body);
                return format!("{text}...(incomplete)");
            }
        };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
