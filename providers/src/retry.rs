//! HTTP retry policy with exponential backoff.
//!
//! # Retry Policy
//!
//! - Max retries: 3 (4 total attempts)
//! - Per-attempt timeout: 60 seconds
//! - Initial delay: 500ms
//! - Max delay: 8 seconds
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//!
//! # Retryable Conditions
//!
//! - HTTP 408, 409, 429, 5xx
//! - Connection errors and per-attempt timeouts, including while the
//!   response body downloads
//! - `x-should-retry: true` forces retry
//! - `x-should-retry: false` forbids retry
//!
//! # Headers
//!
//! - `X-Retry-Count`: 0 for initial, 1+ for retries
//! - `Idempotency-Key`: `fanout-retry-{uuid}`, same across all attempts
//! - `X-Request-Timeout`: per-attempt timeout in seconds

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};
use uuid::Uuid;

use crate::error::ClientError;
use crate::read_capped_error_body;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed resilience parameters baked into a client at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the initial request).
    pub max_retries: u32,
    /// Wall-clock bound on each individual attempt.
    pub timeout: Duration,
    /// Initial backoff delay before first retry.
    pub initial_delay: Duration,
    /// Maximum backoff delay.
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Parse `Retry-After` or `Retry-After-Ms` headers.
///
/// Returns `Some(duration)` if a valid value is found and `0 < duration < 60s`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let in_range = |d: Duration| d > Duration::ZERO && d < Duration::from_secs(60);

    if let Some(val) = headers.get("retry-after-ms")
        && let Ok(s) = val.to_str()
        && let Ok(ms) = s.parse::<f64>()
        && ms.is_finite()
        && ms > 0.0
        && let Ok(duration) = Duration::try_from_secs_f64(ms / 1000.0)
        && in_range(duration)
    {
        return Some(duration);
    }

    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        let duration = Duration::from_secs(secs);
        if in_range(duration) {
            return Some(duration);
        }
    }

    None
}

/// Determine if a response status is retryable.
///
/// Respects `x-should-retry` header override if present.
#[must_use]
pub fn should_retry(status: StatusCode, headers: &HeaderMap) -> bool {
    if let Some(val) = headers.get("x-should-retry")
        && let Ok(s) = val.to_str()
    {
        if s.eq_ignore_ascii_case("true") {
            return true;
        }
        if s.eq_ignore_ascii_case("false") {
            return false;
        }
    }

    matches!(status.as_u16(), 408 | 409 | 429 | 500..=599)
}

/// Delay before retry number `backoff_step + 1`.
///
/// A valid `Retry-After` header takes precedence over exponential backoff.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    policy: &RetryPolicy,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(delay) = headers.and_then(parse_retry_after) {
        return delay;
    }

    let base = policy.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(policy.max_delay.as_secs_f64());

    let jitter_factor = if policy.jitter_factor.is_nan() {
        0.0
    } else {
        policy.jitter_factor.clamp(0.0, 1.0)
    };
    let jitter = 1.0 - rand::random::<f64>() * jitter_factor;
    Duration::try_from_secs_f64(capped * jitter).unwrap_or(policy.max_delay)
}

pub fn add_retry_headers(
    builder: RequestBuilder,
    retry_count: u32,
    idempotency_key: &str,
    timeout: Duration,
) -> RequestBuilder {
    builder
        .header("X-Retry-Count", retry_count.to_string())
        .header("Idempotency-Key", idempotency_key)
        .header("X-Request-Timeout", timeout.as_secs().to_string())
}

#[must_use]
pub fn generate_idempotency_key() -> String {
    format!("fanout-retry-{}", Uuid::new_v4())
}

/// Send a request and read its body, retrying transient failures according
/// to `policy`.
///
/// `build_request` is called once per attempt. `read_body` consumes a 2xx
/// response inside the same attempt, so a timeout or dropped connection
/// while the body downloads is retried like any other transport failure.
/// The per-attempt timeout is enforced by the HTTP client the builder came
/// from.
///
/// Returns the read body, or:
/// - [`ClientError::Status`] for a non-retryable status or once retries run out
/// - [`ClientError::Connection`] for a transport failure once retries run out
/// - [`ClientError::Request`] for a non-retryable transport failure on the first attempt
/// - [`ClientError::Body`] when `read_body` fails for a non-transport reason
pub async fn send_with_retry<F, R, Fut, T>(
    build_request: F,
    read_body: R,
    policy: &RetryPolicy,
) -> Result<T, ClientError>
where
    F: Fn() -> RequestBuilder,
    R: Fn(Response) -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let idempotency_key = generate_idempotency_key();
    let mut attempt: u32 = 0;

    loop {
        let request = add_retry_headers(build_request(), attempt, &idempotency_key, policy.timeout);
        let can_retry = attempt < policy.max_retries;

        let failure = match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match read_body(response).await {
                        Ok(body) => return Ok(body),
                        Err(e) if is_retryable_body_error(&e) => e,
                        Err(e) => return Err(ClientError::Body(e)),
                    }
                } else if can_retry && should_retry(status, response.headers()) {
                    let delay = calculate_retry_delay(attempt, policy, Some(response.headers()));
                    tracing::debug!(
                        status = %status,
                        retry_count = attempt + 1,
                        delay_ms = delay.as_millis(),
                        "Retrying request after error status"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                } else {
                    let body = read_capped_error_body(response).await;
                    return Err(ClientError::Status {
                        status,
                        body,
                        attempts: attempt + 1,
                    });
                }
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    if attempt == 0 {
                        return Err(ClientError::Request(e));
                    }
                    return Err(ClientError::Connection {
                        attempts: attempt + 1,
                        source: e,
                    });
                }
                e
            }
        };

        if !can_retry {
            return Err(ClientError::Connection {
                attempts: attempt + 1,
                source: failure,
            });
        }

        let delay = calculate_retry_delay(attempt, policy, None);
        tracing::debug!(
            error = %failure,
            timed_out = failure.is_timeout(),
            retry_count = attempt + 1,
            delay_ms = delay.as_millis(),
            "Retrying request after connection error"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

/// Failures while streaming a response body. A body that arrives whole but
/// fails to parse is not retried.
fn is_retryable_body_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_body() || (error.is_decode() && !is_parse_failure(error))
}

fn is_parse_failure(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(err) = source {
        if err.is::<serde_json::Error>() {
            return true;
        }
        source = err.source();
    }
    false
}
