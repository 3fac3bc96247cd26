//! Cooperative timing and cancellation primitives.
//!
//! The simulated run advances in fixed-delay steps. [`Ticker`] owns the
//! delay so tests can run a whole simulation without waiting, and
//! [`CancelToken`] lets a reset interrupt a run between (or during) steps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

/// Scheduler primitive used between simulation steps.
pub trait Ticker: Send + Sync {
    /// Suspend the caller for `delay`.
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()>;
}

/// [`Ticker`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTicker;

impl Ticker for TokioTicker {
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(delay).boxed()
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag with async notification.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not
            // lost between the check and the await.
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }

            notified.await;
        }
    }
}

/// Sleep on `ticker` unless `cancel` fires first.
///
/// Returns `false` when the sleep was interrupted by cancellation.
pub async fn sleep_or_cancel(
    ticker: &dyn Ticker,
    delay: Duration,
    cancel: &CancelToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }

    tokio::select! {
        _ = ticker.sleep(delay) => !cancel.is_cancelled(),
        _ = cancel.cancelled() => false,
    }
}

/// [`Ticker`] that returns immediately and records every requested delay.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct InstantTicker {
    delays: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl InstantTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl Ticker for InstantTicker {
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()> {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(delay);
        }
        // Yield so other tasks observe intermediate state.
        tokio::task::yield_now().boxed()
    }
}
