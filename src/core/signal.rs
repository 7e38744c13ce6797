//! Execution signal shared by every fiber of one run.
//!
//! Two monotone latches, *cancelled* and *fast-forward*, plus a best-effort
//! subscriber list. Setting a latch a second time is a no-op and does not
//! re-notify. A panicking subscriber is caught and logged; it never disturbs
//! emission or the latch itself.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Event delivered to signal subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEvent {
    Cancelled { reason: Option<String> },
    FastForward,
}

/// Token returned by [`RunSignal::subscribe`], honoured by
/// [`RunSignal::unsubscribe`].
pub type SubscriptionId = u64;

type Subscriber = Arc<dyn Fn(&SignalEvent) + Send + Sync>;

#[derive(Clone)]
pub struct RunSignal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    cancel: CancellationToken,
    fast_forward: CancellationToken,
    cancel_latched: AtomicBool,
    fast_forward_latched: AtomicBool,
    reason: Mutex<Option<String>>,
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
    next_subscription: AtomicU64,
}

impl RunSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                cancel: CancellationToken::new(),
                fast_forward: CancellationToken::new(),
                cancel_latched: AtomicBool::new(false),
                fast_forward_latched: AtomicBool::new(false),
                reason: Mutex::new(None),
                subscribers: Mutex::new(HashMap::new()),
                next_subscription: AtomicU64::new(0),
            }),
        }
    }

    /// Latch the cancelled flag. Idempotent; only the first call carries its
    /// reason and notifies subscribers.
    pub fn cancel(&self, reason: Option<&str>) {
        if self.inner.cancel_latched.swap(true, Ordering::SeqCst) {
            return;
        }
        let reason = reason.map(str::to_owned);
        *self.inner.reason.lock() = reason.clone();
        self.inner.cancel.cancel();
        self.emit(&SignalEvent::Cancelled { reason });
    }

    /// Latch the fast-forward flag. Idempotent.
    pub fn fast_forward(&self) {
        if self.inner.fast_forward_latched.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.fast_forward.cancel();
        self.emit(&SignalEvent::FastForward);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn is_fast_forward(&self) -> bool {
        self.inner.fast_forward.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Future resolving once the signal is cancelled. Used to race node-local
    /// suspensions (e.g. the delay node's sleep).
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }

    /// Future resolving once fast-forward is latched.
    pub fn fast_forwarded(&self) -> WaitForCancellationFuture<'_> {
        self.inner.fast_forward.cancelled()
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&SignalEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.lock().insert(id, Arc::new(callback));
        id
    }

    /// Remove a subscriber. Returns whether the token was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.lock().remove(&id).is_some()
    }

    fn emit(&self, event: &SignalEvent) {
        let subscribers: Vec<(SubscriptionId, Subscriber)> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();
        for (id, callback) in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!(subscription = id, "signal subscriber panicked");
            }
        }
    }
}

impl Default for RunSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_cancel_latches_once() {
        let signal = RunSignal::new();
        let notified = Arc::new(AtomicU32::new(0));
        let seen = notified.clone();
        signal.subscribe(move |event| {
            assert!(matches!(event, SignalEvent::Cancelled { .. }));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!signal.is_cancelled());
        signal.cancel(Some("stop"));
        signal.cancel(Some("again"));

        assert!(signal.is_cancelled());
        assert_eq!(signal.reason().as_deref(), Some("stop"));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fast_forward_is_independent() {
        let signal = RunSignal::new();
        signal.fast_forward();
        assert!(signal.is_fast_forward());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_unsubscribe_honoured() {
        let signal = RunSignal::new();
        let notified = Arc::new(AtomicU32::new(0));
        let seen = notified.clone();
        let id = signal.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        signal.cancel(None);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_abort_emission() {
        let signal = RunSignal::new();
        let notified = Arc::new(AtomicU32::new(0));
        signal.subscribe(|_| panic!("bad subscriber"));
        let seen = notified.clone();
        signal.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        signal.cancel(None);
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let signal = RunSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        signal.cancel(None);
        task.await.unwrap();
    }
}
