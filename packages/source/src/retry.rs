//! HTTP retry policy for the police API.
//!
//! The provider is flaky in a few well-known ways, and each is handled
//! differently:
//!
//! | Response            | Handling                                         |
//! |---------------------|--------------------------------------------------|
//! | 404                 | no data for the period, empty success            |
//! | 502                 | overloaded, retry after `retry * 10s`            |
//! | 503                 | down, give up immediately                        |
//! | other non-2xx       | retry after `retry * 5s`                         |
//! | timeout             | retry after a fixed 5s                           |
//! | other send failure  | retry after `retry * 5s`                         |
//!
//! All retryable failures share one ceiling ([`MAX_RETRIES`] by default),
//! so a period that never recovers costs exactly `max_retries + 1`
//! requests.

use std::time::Duration;

use reqwest::StatusCode;

/// Default number of retries after the first attempt.
pub const MAX_RETRIES: u32 = 5;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Backoff and ceiling settings for [`send_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Multiplied by the retry number after a 502.
    pub server_error_backoff: Duration,
    /// Multiplied by the retry number after any other retryable failure.
    pub request_error_backoff: Duration,
    /// Fixed wait after a timeout.
    pub timeout_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            server_error_backoff: Duration::from_secs(10),
            request_error_backoff: Duration::from_secs(5),
            timeout_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy with the given ceiling and no waiting between attempts.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            server_error_backoff: Duration::ZERO,
            request_error_backoff: Duration::ZERO,
            timeout_backoff: Duration::ZERO,
        }
    }

    /// Returns how long to wait before retry number `retry` (1-based)
    /// after `reason`.
    #[must_use]
    pub fn backoff(&self, reason: &RetryReason, retry: u32) -> Duration {
        match reason {
            RetryReason::BadGateway => self.server_error_backoff.saturating_mul(retry),
            RetryReason::Timeout(_) => self.timeout_backoff,
            RetryReason::Status(_) | RetryReason::Request(_) => {
                self.request_error_backoff.saturating_mul(retry)
            }
        }
    }
}

/// A failure that is worth another attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryReason {
    /// HTTP 502 from the provider's gateway.
    #[error("HTTP 502 Bad Gateway")]
    BadGateway,

    /// The request did not complete within the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Any other non-success status.
    #[error("HTTP {0}")]
    Status(StatusCode),

    /// Connection failure, unreadable body, or a body that is not JSON.
    #[error("request failed: {0}")]
    Request(String),
}

/// Why a period could not be fetched at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    /// Every allowed attempt hit a retryable failure.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total requests made, including the first.
        attempts: u32,
        /// The failure seen on the final attempt.
        last: RetryReason,
    },

    /// HTTP 503; the provider is down and retrying will not help.
    #[error("service unavailable (HTTP 503)")]
    ServiceUnavailable,

    /// The request was rejected before it reached the network.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what went wrong.
        message: String,
    },
}

/// What a successful exchange produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// HTTP 404.
    NotFound,
    /// A 2xx response with a JSON body.
    Json(serde_json::Value),
}

/// Sends the request built by `build_request` until it succeeds, fails
/// permanently, or runs out of retries under `policy`.
///
/// The closure is called once per attempt because a
/// [`reqwest::RequestBuilder`] is consumed by `send()`. `label` only
/// prefixes log lines.
///
/// # Errors
///
/// Returns [`FetchFailure`] on a 503, on a request that cannot be built,
/// or once the retry ceiling is reached.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    build_request: F,
    policy: &RetryPolicy,
    label: &str,
) -> Result<Response, FetchFailure>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut retry: u32 = 0;

    loop {
        let reason = match attempt(&build_request, label).await? {
            Ok(response) => return Ok(response),
            Err(reason) => reason,
        };

        if retry >= policy.max_retries {
            log::error!("[{label}] giving up after {} attempts: {reason}", retry + 1);
            return Err(FetchFailure::RetriesExhausted {
                attempts: retry + 1,
                last: reason,
            });
        }

        retry += 1;
        let delay = policy.backoff(&reason, retry);
        log::warn!(
            "[{label}] {reason}; retry {retry}/{} in {delay:?}...",
            policy.max_retries
        );
        tokio::time::sleep(delay).await;
    }
}

/// Performs one request. The outer `Result` carries permanent failures,
/// the inner one retryable ones.
#[allow(clippy::future_not_send)]
async fn attempt<F>(
    build_request: &F,
    label: &str,
) -> Result<Result<Response, RetryReason>, FetchFailure>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = match build_request().send().await {
        Ok(response) => response,
        Err(e) if e.is_builder() => {
            return Err(FetchFailure::InvalidRequest {
                message: e.to_string(),
            });
        }
        Err(e) => return Ok(Err(classify_error(&e))),
    };

    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        log::info!("[{label}] HTTP 404, no data available");
        return Ok(Ok(Response::NotFound));
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        log::error!("[{label}] HTTP 503, service unavailable");
        return Err(FetchFailure::ServiceUnavailable);
    }
    if status == StatusCode::BAD_GATEWAY {
        return Ok(Err(RetryReason::BadGateway));
    }
    if !status.is_success() {
        return Ok(Err(RetryReason::Status(status)));
    }

    // Read the raw body as text first so a bad body can be logged.
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return Ok(Err(classify_error(&e))),
    };

    match serde_json::from_str(&text) {
        Ok(value) => Ok(Ok(Response::Json(value))),
        Err(e) => {
            let preview = if text.len() > BODY_PREVIEW_LEN {
                format!("{}...", text.chars().take(BODY_PREVIEW_LEN).collect::<String>())
            } else {
                text.clone()
            };
            log::warn!(
                "[{label}] JSON parse failed ({} bytes): {e}\n  body preview: {preview}",
                text.len()
            );
            Ok(Err(RetryReason::Request(format!("invalid JSON body: {e}"))))
        }
    }
}

fn classify_error(e: &reqwest::Error) -> RetryReason {
    if e.is_timeout() {
        RetryReason::Timeout(e.to_string())
    } else {
        RetryReason::Request(e.to_string())
    }
}
