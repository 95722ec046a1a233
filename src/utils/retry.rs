//! Retry utilities for transient failures
//!
//! Only scripted-browser navigation is retried: plain HTTP failures surface
//! immediately. The helpers here are generic over the error type so callers
//! keep their domain errors.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with a custom attempt budget
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Create a retry configuration with custom delays
    pub fn with_delays(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Delay to wait before the given zero-based attempt
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = if attempt == 0 {
            0
        } else {
            let exponential =
                self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
            (exponential as u64).min(self.max_delay_ms)
        };

        Duration::from_millis(delay_ms)
    }
}

/// Outcome of a retried operation that never succeeded
#[derive(Debug)]
pub enum RetryError<E> {
    /// The predicate refused to retry this error
    Fatal(E),
    /// Every attempt failed with a retryable error; holds the last one
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The underlying error, whatever the outcome
    pub fn into_inner(self) -> E {
        match self {
            Self::Fatal(e) | Self::Exhausted { last: e, .. } => e,
        }
    }
}

/// Execute an operation, retrying the errors accepted by `should_retry`
///
/// At most `config.max_attempts` attempts are made (a budget of zero still
/// runs the operation once).
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.calculate_delay(attempt);
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis(),
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !should_retry(&e) => {
                warn!(error = %e, "Non-retryable error encountered");
                return Err(RetryError::Fatal(e));
            }
            Err(e) => {
                warn!(
                    attempt = attempt + 1,
                    max_attempts = attempts,
                    error = %e,
                    "Operation failed, will retry"
                );
                attempt += 1;
                if attempt >= attempts {
                    return Err(RetryError::Exhausted { attempts, last: e });
                }
            }
        }
    }
}
