//! Exponential backoff for transient transport failures.

use std::future::Future;
use std::time::Duration;

use ovenctl_domain::error::{ConnectionError, OvenError};
use ovenctl_domain::id::DeviceId;

use crate::ports::TransportError;

/// How often and how patiently a transient failure is retried.
///
/// `attempt` counts failures so far, starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Total attempts before giving up, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// `min(base_delay × 2^attempt, max_delay)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether `attempt` attempts have used up the budget.
    #[must_use]
    pub fn should_give_up(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// The retry budget ran out, or the failure was not transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed after {attempts} attempt(s): {last}")]
pub struct RetryExhausted {
    pub operation: &'static str,
    pub attempts: u32,
    pub last: TransportError,
}

impl RetryExhausted {
    /// Convert to the error surfaced to callers.
    #[must_use]
    pub fn into_oven_error(self, device_id: Option<DeviceId>) -> OvenError {
        ConnectionError {
            device_id,
            attempts: self.attempts,
            reason: format!("{}: {}", self.operation, self.last),
        }
        .into()
    }
}

/// Run `operation` until it succeeds, fails permanently, or the policy gives up.
///
/// The closure receives the zero-based attempt number. Each transient failure
/// is logged and followed by [`RetryPolicy::delay_for`] of sleep.
///
/// # Errors
///
/// Returns [`RetryExhausted`] carrying the last failure.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut run: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0;
    loop {
        let error = match run(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        let failed = attempt + 1;
        if !error.is_transient() || policy.should_give_up(failed) {
            tracing::warn!(operation, attempts = failed, %error, "giving up");
            return Err(RetryExhausted {
                operation,
                attempts: failed,
                last: error,
            });
        }
        let delay = policy.delay_for(attempt);
        tracing::warn!(
            operation,
            attempt = failed,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            %error,
            "transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt = failed;
    }
}
