//! Bounded retry for task attempts
//!
//! Every attempt starts from scratch. Transient failures are retried until
//! `max_attempts` is reached; terminal failures stop immediately. The last
//! failure is always handed back to the caller.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use super::types::TaskId;
use crate::error::{EvalError, FailureKind};

/// Retry configuration for task attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per task, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default, with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    /// Randomise delays by up to half their length
    #[serde(default)]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: Duration::ZERO,
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64()).max(0.0);
        let delay = if self.jitter {
            let mut rng = rand::rng();
            let spread = capped / 2.0;
            (capped + rng.random_range(-spread..=spread)).max(0.0)
        } else {
            capped
        };
        Duration::from_secs_f64(delay)
    }
}

/// Errors that know whether another attempt may help
pub trait Retryable {
    fn failure_kind(&self) -> FailureKind;
}

impl Retryable for EvalError {
    fn failure_kind(&self) -> FailureKind {
        EvalError::failure_kind(self)
    }
}

/// Run `attempt` until it succeeds, fails terminally or runs out of attempts
///
/// Returns the final result together with the number of attempts made.
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    task: &TaskId,
    mut attempt: F,
) -> (Result<T, E>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut current = 1;
    loop {
        match attempt(current).await {
            Ok(value) => return (Ok(value), current),
            Err(e) if e.failure_kind() == FailureKind::Transient && current < max_attempts => {
                let delay = policy.delay_for(current);
                warn!(
                    "Task {} attempt {}/{} failed, retrying in {:?}: {}",
                    task, current, max_attempts, delay, e
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                current += 1;
            }
            Err(e) => return (Err(e), current),
        }
    }
}
