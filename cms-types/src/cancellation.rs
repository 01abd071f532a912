//! Cooperative cancellation.
//!
//! A token is handed to every suspending operation. Callees check it at
//! their resumption points; the host never aborts a callee from outside.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Signals that an operation observed its cancellation token.
///
/// This is a control signal, not a failure, and is never logged as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation was cancelled")]
pub struct OperationCancelled;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cloneable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and wakes every task awaiting [`Self::cancelled`].
    /// Cancelling twice is a no-op.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(OperationCancelled)` once the token has been cancelled.
    pub fn check(&self) -> Result<(), OperationCancelled> {
        if self.is_cancelled() {
            Err(OperationCancelled)
        } else {
            Ok(())
        }
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Runs `fut` until it completes or the token is cancelled.
    pub async fn run_until_cancelled<F: std::future::Future>(
        &self,
        fut: F,
    ) -> Result<F::Output, OperationCancelled> {
        tokio::select! {
            biased;
            () = self.cancelled() => Err(OperationCancelled),
            out = fut => Ok(out),
        }
    }
}
