//! Upstream Retry Logic
//!
//! Exponential backoff with jitter for transient upstream failures.
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is transient:
//!    a. If the retry budget has room: log WARN, back off, retry
//!    b. Otherwise: log ERROR, return `RetryError::Exhausted`
//! 4. If the error is permanent: return `RetryError::Permanent` immediately
//!
//! **Backoff Strategy:**
//! - Initial delay: `initial_backoff_ms` (default 500ms)
//! - Max delay: `max_backoff_ms` (default 8000ms)
//! - Multiplier: 2.0 (exponential)
//! - Jitter: ±25% of the current delay

use hourglass_common::config::UpstreamConfig;
use rand::Rng;
use std::time::Duration;

/// Errors that know whether a retry could help
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Retry budget and delay schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Fractional jitter applied to every delay (0.25 = ±25%)
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            jitter: 0.25,
        }
    }

    /// Policy with no waiting between attempts
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Start a fresh backoff sequence
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            retries_used: 0,
            next_base: self.initial_delay,
        }
    }
}

/// One in-progress backoff sequence
///
/// `next_delay` returns `None` once the budget is spent; that is the
/// terminal state and stays terminal.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    retries_used: u32,
    next_base: Duration,
}

impl Backoff {
    /// Delay before the next retry, or `None` when the budget is exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries_used >= self.policy.max_retries {
            return None;
        }
        self.retries_used += 1;

        let base = self.next_base.min(self.policy.max_delay);
        self.next_base = (self.next_base * 2).min(self.policy.max_delay);

        Some(apply_jitter(base, self.policy.jitter))
    }

    /// Attempts made so far, counting the first one
    pub fn attempts(&self) -> u32 {
        self.retries_used + 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.retries_used >= self.policy.max_retries
    }
}

fn apply_jitter(base: Duration, jitter: f64) -> Duration {
    if base.is_zero() || jitter <= 0.0 {
        return base;
    }
    let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
    base.mul_f64(factor)
}

/// Terminal retry failure
#[derive(Debug)]
pub enum RetryError<E> {
    /// Non-transient error; no retry was attempted after it
    Permanent(E),
    /// Transient errors persisted past the retry budget
    Exhausted { attempts: u32, last_error: E },
}

/// Run `operation` until it succeeds, fails permanently, or exhausts the policy
pub async fn retry_transient<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut backoff = policy.backoff();

    loop {
        match operation().await {
            Ok(result) => {
                if backoff.attempts() > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts = backoff.attempts(),
                        "Upstream operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_transient() => {
                return Err(RetryError::Permanent(err));
            }
            Err(err) => match backoff.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        operation = operation_name,
                        attempt = backoff.attempts() - 1,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient upstream failure, will retry after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        operation = operation_name,
                        attempts = backoff.attempts(),
                        error = %err,
                        "Upstream operation failed: retry budget exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: backoff.attempts(),
                        last_error: err,
                    });
                }
            },
        }
    }
}
