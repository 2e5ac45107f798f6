//! Bounded retry with multiplicative back-off.
//!
//! Wraps one provider call. The main customer is tagging a resource right
//! after creating it, which can miss while the new resource is not yet
//! visible to the tagging API. Only the wrapped call is re-issued.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use stratus_core::config::RetryConfig;
use stratus_core::{StratusError, StratusResult};

use crate::cancel::Cancellation;
use crate::poller::millis;

/// Attempt budget and delay schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total calls, including the first.
    pub max_attempts: u32,
    /// Wait before the second call.
    pub initial_delay: Duration,
    /// Factor applied to the wait after every failed call.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_delay: cfg.initial_delay(),
            multiplier: cfg.multiplier,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
        }
    }

    /// Delay that follows `delay` in the schedule.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let factor = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(delay)
    }
}

/// Decides whether a failure is worth another attempt.
pub type Classifier = fn(&StratusError) -> bool;

/// A labelled retry loop. Build with [`Retry::new`], then [`Retry::run`].
#[derive(Debug, Clone)]
pub struct Retry {
    label: String,
    policy: RetryPolicy,
    classify: Option<Classifier>,
    cancel: Option<Cancellation>,
}

impl Retry {
    pub fn new(label: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            label: label.into(),
            policy,
            classify: None,
            cancel: None,
        }
    }

    /// Only retry failures the classifier accepts. Without one, every
    /// failure is retried.
    pub fn when(mut self, classify: Classifier) -> Self {
        self.classify = Some(classify);
        self
    }

    pub fn cancel_on(mut self, cancel: Option<Cancellation>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Invoke `op` until it succeeds, fails non-retryably, or the budget
    /// is spent. A spent budget surfaces the last failure as `Exhausted`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> StratusResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StratusResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.initial_delay;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(label = %self.label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !self.classify.is_none_or(|retryable| retryable(&err)) {
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(label = %self.label, attempts = attempt, error = %err, "retry budget exhausted");
                return Err(StratusError::Exhausted {
                    label: self.label.clone(),
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            warn!(
                label = %self.label,
                attempt,
                max_attempts,
                delay_ms = millis(delay),
                error = %err,
                "call failed, retrying"
            );
            self.pause(delay).await?;
            delay = self.policy.next_delay(delay);
        }
    }

    async fn pause(&self, delay: Duration) -> StratusResult<()> {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(delay).await;
            return Ok(());
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(StratusError::Cancelled { label: self.label.clone() }),
        }
    }
}
