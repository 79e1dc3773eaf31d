//! Retry logic with capped exponential backoff
//!
//! A single policy drives every retried call in the crate: attachment downloads always go
//! through it, and search page fetches do when `export.page_retry` allows more than one
//! attempt. The wait before attempt `k + 1` is:
//!
//! - the server's numeric `Retry-After`, when the error carries one, or
//! - `min(max_delay, initial_delay * backoff_multiplier^k)` plus a jitter term uniformly
//!   distributed in `[0, initial_delay)`.
//!
//! With the defaults (1 s, ×2, 60 s cap) that is `min(60, 2^k) + jitter` seconds.
//!
//! # Example
//!
//! ```no_run
//! use jira_slack_tools::retry::{IsRetryable, with_retry};
//! use jira_slack_tools::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, "example", || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{AttachmentError, Error};
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (rate limits, server errors, timeouts) should return `true`.
/// Permanent failures (authorization, missing resources, local write errors) should return
/// `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Server-mandated wait before the next attempt, overriding the computed backoff
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            Error::Http { status, .. } => is_transient_status(*status),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            // A bad schema or a Slack error code will not change on the next call
            Error::Decode { .. } | Error::Serialization(_) | Error::Slack { .. } => false,
            Error::Config { .. } => false,
            Error::PaginationOverflow { .. } => false,
            Error::Other(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Http {
                status: 429,
                retry_after,
                ..
            } => *retry_after,
            _ => None,
        }
    }
}

impl IsRetryable for AttachmentError {
    fn is_retryable(&self) -> bool {
        match self {
            // Retrying cannot fix an authorization or existence failure
            AttachmentError::Status { status, .. } => !matches!(status, 401 | 403 | 404),
            AttachmentError::Request { .. } => true,
            AttachmentError::Write { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            AttachmentError::Status {
                status: 429,
                retry_after,
                ..
            } => *retry_after,
            _ => None,
        }
    }
}

/// Parse a `Retry-After` header holding a whole number of seconds
///
/// HTTP-date values and anything non-numeric are ignored so the caller falls back to the
/// computed backoff.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Delay to wait after failed attempt number `attempt` (1-based)
///
/// `min(max_delay, initial_delay * backoff_multiplier^attempt)`, plus jitter in
/// `[0, initial_delay)` when enabled.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = config.initial_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent);
    let capped = if raw.is_finite() {
        Duration::from_secs_f64(raw.max(0.0)).min(config.max_delay)
    } else {
        config.max_delay
    };

    if config.jitter {
        add_jitter(capped, config.initial_delay)
    } else {
        capped
    }
}

/// Execute an async operation under the retry policy
///
/// `config.max_attempts` is the total number of calls, first one included (a value of 0
/// behaves like 1). Returns the first success, or the last error once the error is
/// permanent or the attempts are used up.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    what: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(what, attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = e
                    .retry_after()
                    .unwrap_or_else(|| backoff_delay(config, attempt));

                tracing::warn!(
                    what,
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        what,
                        error = %e,
                        attempts = attempt,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(what, error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add uniform jitter in `[0, unit)` on top of `delay`
fn add_jitter(delay: Duration, unit: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let factor: f64 = rng.gen_range(0.0..1.0);
    delay + unit.mul_f64(factor)
}
