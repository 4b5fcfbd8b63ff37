//! Retry with bounded exponential backoff and jitter.
//!
//! Only errors whose [`OracleError::is_retryable`] is true are retried.
//! Terminal errors are returned from the first attempt that produces them.
//! Every sleep races the caller's cancellation token.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::OracleError;

/// Maximum retry attempts after the initial call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// First backoff delay. Doubles each attempt.
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
/// Backoff ceiling.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, milliseconds.
    pub max_delay_ms: u64,
    /// Randomize each delay within its upper half.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Upper bound of the delay before retry number `attempt` (0-based):
    /// `min(base * 2^attempt, max)`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// Actual delay before retry number `attempt`. With jitter the delay
    /// lies in `[ceiling / 2, ceiling]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if !self.jitter {
            return ceiling;
        }
        let ms = ceiling.as_millis() as u64;
        let floor = ms / 2;
        Duration::from_millis(rand::thread_rng().gen_range(floor..=ms))
    }
}

/// Run `f` under `policy`. `operation` labels log lines and the retry
/// counter.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &'static str,
    mut f: F,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(OracleError::Cancelled);
        }
        let err = tokio::select! {
            _ = cancel.cancelled() => return Err(OracleError::Cancelled),
            result = f() => match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            },
        };
        if !err.is_retryable() {
            return Err(err);
        }
        if attempt >= policy.max_retries {
            tracing::error!(operation, attempts = attempt + 1, "retries exhausted: {err}");
            return Err(OracleError::RetriesExhausted {
                attempts: attempt + 1,
                last: Box::new(err),
            });
        }
        let delay = policy.delay(attempt);
        attempt += 1;
        metrics::counter!("vouch_oracle_retries_total", "operation" => operation).increment(1);
        tracing::warn!(
            operation,
            attempt,
            max_retries = policy.max_retries,
            "{operation} failed, retrying in {delay:?}: {err}"
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(OracleError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
