//! Retry logic with exponential backoff
//!
//! Detail documents are fetched one request at a time, each wrapped in
//! [`download_with_retry`]. Transient failures (timeouts, refused connections,
//! throttling and server errors) are retried with exponentially growing,
//! optionally jittered delays; everything else fails immediately.
//!
//! # Example
//!
//! ```no_run
//! use icecat_dl::config::RetryConfig;
//! use icecat_dl::error::Error;
//! use icecat_dl::retry::download_with_retry;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let body = download_with_retry(&config, || async {
//!     Ok::<_, Error>("<ICECAT-interface/>".to_string())
//! })
//! .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies errors as transient (worth retrying) or permanent
pub trait IsRetryable {
    /// Returns true if the operation may succeed when attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // 408 Request Timeout, 429 Too Many Requests, any 5xx
            Error::Http { status, .. } => matches!(status, 408 | 429 | 500..=599),
            Error::Io(e) | Error::File { source: e, .. } => is_transient_io(e),
            Error::Config { .. }
            | Error::InvalidSelector(_)
            | Error::InvalidIndex(_)
            | Error::InvalidReference { .. }
            | Error::Xml(_)
            | Error::InvalidUrl { .. }
            | Error::Serialization(_)
            | Error::Task(_) => false,
        }
    }
}

fn is_transient_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::UnexpectedEof
    )
}

/// Run `operation` until it succeeds, fails permanently, or runs out of retries
///
/// # Arguments
///
/// * `config` - Retry policy; `max_attempts` counts retries after the first try
/// * `operation` - Produces a fresh future for every attempt
///
/// # Returns
///
/// The first successful result, or the last error.
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut retries = 0;
    let mut delay = config.initial_delay;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!(attempts = retries + 1, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() {
            tracing::debug!(error = %err, "Request failed with permanent error");
            return Err(err);
        }
        if retries >= config.max_attempts {
            tracing::warn!(
                error = %err,
                attempts = retries + 1,
                "Request failed after all retry attempts"
            );
            return Err(err);
        }

        retries += 1;
        let wait = if config.jitter { add_jitter(delay) } else { delay };
        tracing::debug!(
            error = %err,
            attempt = retries,
            max_attempts = config.max_attempts,
            delay_ms = wait.as_millis() as u64,
            "Request failed, retrying"
        );
        tokio::time::sleep(wait).await;
        delay = next_delay(delay, config);
    }
}

/// Grow a delay by the backoff multiplier, capped at `max_delay`
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    let grown = delay.as_secs_f64() * config.backoff_multiplier;
    if !grown.is_finite() || grown >= config.max_delay.as_secs_f64() {
        config.max_delay
    } else {
        Duration::from_secs_f64(grown.max(0.0))
    }
}

/// Stretch a delay by a random factor between 1x and 2x
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}
