//! Cooperative cancellation for retry and poll loops.
//!
//! Built on a `watch` channel, the same signal the daemon uses for
//! shutdown. Cancelling stops further checks and back-off sleeps; it cannot
//! recall requests the provider already accepted.

use tokio::sync::watch;

/// Sender half. Dropping it without cancelling leaves waiters running.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half, checked between checks and during sleeps.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle/token pair.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl Cancellation {
    /// A token that never fires.
    pub fn never() -> Self {
        let (_, token) = cancellation();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
