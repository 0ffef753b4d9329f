use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::errors::AppError;

pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Capped exponential backoff shared by the producer and the consumer's subscribe path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
        }
    }

    /// Wait before retry number `attempt`, counted from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Runs `operation` until it succeeds, fails with a non-transient error,
    /// runs out of retries or `cancel` fires.
    ///
    /// The operation receives the 1-based attempt number. Cancellation is
    /// raced against both the operation and the backoff sleep, and always
    /// surfaces as [`AppError::Cancelled`]. When retries are exhausted the
    /// last transient error is returned.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        label: &str,
        mut operation: F,
    ) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                result = operation(attempt) => result,
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt <= self.retries => err,
                Err(err) => return Err(err),
            };

            let delay = self.delay(attempt);
            warn!(
                error = %err,
                attempt,
                max_attempts = self.retries,
                delay_secs = delay.as_secs_f64(),
                "{label} failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
