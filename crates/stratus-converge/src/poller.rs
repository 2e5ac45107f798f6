//! Convergence poller: re-check remote state until a classifier says stop.
//!
//! Distinct from [`crate::retry`]: that re-issues a *call* that failed,
//! this re-observes *state* that has not converged yet. A `check` that
//! errors ends the poll immediately.
//!
//! Each re-check is scheduled on the runtime timer, so sibling polls in the
//! same fan-out keep progressing while this one waits.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use stratus_core::{StratusError, StratusResult};

use crate::cancel::Cancellation;

/// Verdict of a classifier over one observation.
#[derive(Debug)]
pub enum Poll<T> {
    /// Not there yet; check again after the interval.
    Pending,
    /// Converged.
    Done(T),
    /// Will never converge; stop without another check.
    Failed(StratusError),
}

/// A labelled poll loop.
///
/// Without `max_checks` the loop runs until the classifier reaches a
/// terminal state. Callers that cannot wait forever should set a cap, wrap
/// the call in a timeout, or pass a cancellation token.
#[derive(Debug, Clone)]
pub struct Poller {
    label: String,
    interval: Duration,
    max_checks: Option<u32>,
    cancel: Option<Cancellation>,
}

impl Poller {
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            interval,
            max_checks: None,
            cancel: None,
        }
    }

    pub fn max_checks(mut self, max_checks: Option<u32>) -> Self {
        self.max_checks = max_checks;
        self
    }

    pub fn cancel_on(mut self, cancel: Option<Cancellation>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run `check`, classify the result, and repeat on `Pending`.
    pub async fn until<S, T, C, Fut, K>(&self, mut check: C, mut classify: K) -> StratusResult<T>
    where
        C: FnMut() -> Fut,
        Fut: Future<Output = StratusResult<S>>,
        K: FnMut(S) -> Poll<T>,
    {
        let mut checks: u32 = 0;

        loop {
            if self.cancel.as_ref().is_some_and(Cancellation::is_cancelled) {
                return Err(StratusError::Cancelled {
                    label: self.label.clone(),
                });
            }

            let observed = check().await?;
            checks += 1;

            match classify(observed) {
                Poll::Done(value) => {
                    debug!(label = %self.label, checks, "converged");
                    return Ok(value);
                }
                Poll::Failed(err) => {
                    warn!(label = %self.label, checks, error = %err, "convergence failed");
                    return Err(err);
                }
                Poll::Pending => {}
            }

            if self.max_checks.is_some_and(|max| checks >= max) {
                return Err(StratusError::Convergence(format!(
                    "{} did not converge after {checks} checks",
                    self.label
                )));
            }

            debug!(
                label = %self.label,
                checks,
                interval_ms = millis(self.interval),
                "not converged, re-checking"
            );
            self.wait().await?;
        }
    }

    async fn wait(&self) -> StratusResult<()> {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(self.interval).await;
            return Ok(());
        };
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => Ok(()),
            _ = cancel.cancelled() => Err(StratusError::Cancelled { label: self.label.clone() }),
        }
    }
}

/// Whole milliseconds for log fields, saturating instead of truncating.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
