//! Cooperative cancellation for blocking handoff operations.
//!
//! Every blocking structure in this crate is bound to a [`CancelToken`] when it is
//! constructed. The structure registers itself with the token, so cancelling the
//! token wakes all of its waiters directly instead of having them poll a flag.
//!
//! # Semantics
//!
//! - A call only observes cancellation when it would actually block. If data (or
//!   space) is available the call completes normally.
//! - A cancelled call returns [`HandoffError::Cancelled`] and never leaves a partial
//!   insert or removal behind.
//! - The token is sticky. Every subsequent blocking wait fails until
//!   [`CancelToken::reset`] is called.
//!
//! # Example
//!
//! ```
//! use daq_handoff::cancel::CancelToken;
//! use daq_handoff::ring::GrowableRingBuffer;
//! use std::thread;
//!
//! let token = CancelToken::new();
//! let buffer = GrowableRingBuffer::<u32>::new_with_cancel(4, 0, &token).unwrap();
//!
//! let waiter = {
//!     let buffer = buffer.clone();
//!     thread::spawn(move || buffer.pop())
//! };
//!
//! token.cancel();
//! assert!(waiter.join().unwrap().unwrap_err().is_cancelled());
//! ```

use crate::error::{HandoffError, HandoffResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::debug;

/// A structure whose blocked callers can be woken by a [`CancelToken`].
///
/// Implementations must take the lock that guards their wait predicate before
/// notifying, otherwise a waiter that checked the token just before `cancel()`
/// could miss the wakeup.
pub(crate) trait Wake: Send + Sync {
    fn wake_all(&self);
}

struct TokenInner {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn Wake>>>,
}

/// Cloneable cancellation flag shared between the threads of one pipeline.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cancel the token and wake every blocked caller of every bound structure.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        // Upgrade under the registry lock, wake outside of it.
        let targets: Vec<Arc<dyn Wake>> = {
            let mut waiters = self.inner.waiters.lock();
            waiters.retain(|w| w.strong_count() > 0);
            waiters.iter().filter_map(Weak::upgrade).collect()
        };

        debug!(structures = targets.len(), "cancel token fired");
        for target in targets {
            target.wake_all();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called since the last reset.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Re-arm the token so bound structures can block again.
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Return [`HandoffError::Cancelled`] if the token has fired.
    pub fn check(&self) -> HandoffResult<()> {
        if self.is_cancelled() {
            Err(HandoffError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn register(&self, waiter: Weak<dyn Wake>) {
        let mut waiters = self.inner.waiters.lock();
        waiters.retain(|w| w.strong_count() > 0);
        waiters.push(waiter);
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Result of a wait that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    Ready,
    TimedOut,
}

/// Core monitor loop behind every blocking, timed and cancellable entry point.
///
/// Waits on `cv` while `blocked` holds. The deadline is absolute, so spurious
/// wakeups only wait for the remaining time.
pub(crate) fn wait_while<S, F>(
    cv: &Condvar,
    guard: &mut MutexGuard<'_, S>,
    token: &CancelToken,
    deadline: Option<Instant>,
    mut blocked: F,
) -> HandoffResult<WaitOutcome>
where
    F: FnMut(&S) -> bool,
{
    while blocked(&**guard) {
        if token.is_cancelled() {
            return Err(HandoffError::Cancelled);
        }
        match deadline {
            Some(deadline) => {
                if cv.wait_until(guard, deadline).timed_out() {
                    if blocked(&**guard) {
                        return Ok(WaitOutcome::TimedOut);
                    }
                    return Ok(WaitOutcome::Ready);
                }
            }
            None => cv.wait(guard),
        }
    }
    Ok(WaitOutcome::Ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    struct Counter {
        lock: Mutex<()>,
        woken: AtomicUsize,
    }

    impl Wake for Counter {
        fn wake_all(&self) {
            let _guard = self.lock.lock();
            self.woken.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn cancel_is_sticky_until_reset() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.check().unwrap_err().is_cancelled());

        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_registered_structures_once() {
        let token = CancelToken::new();
        let counter = Arc::new(Counter {
            lock: Mutex::new(()),
            woken: AtomicUsize::new(0),
        });
        let weak: Weak<dyn Wake> = Arc::downgrade(&counter) as Weak<dyn Wake>;
        token.register(weak);

        token.cancel();
        token.cancel();
        assert_eq!(counter.woken.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_structures_are_pruned() {
        let token = CancelToken::new();
        {
            let counter = Arc::new(Counter {
                lock: Mutex::new(()),
                woken: AtomicUsize::new(0),
            });
            let weak: Weak<dyn Wake> = Arc::downgrade(&counter) as Weak<dyn Wake>;
            token.register(weak);
        }
        token.cancel();
        assert!(token.inner.waiters.lock().is_empty());
    }

    #[test]
    fn wait_while_times_out() {
        let token = CancelToken::new();
        let lock = Mutex::new(0u32);
        let cv = Condvar::new();
        let mut guard = lock.lock();

        let deadline = Instant::now() + Duration::from_millis(20);
        let outcome = wait_while(&cv, &mut guard, &token, Some(deadline), |v| *v == 0).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn wait_while_returns_ready_when_notified() {
        let token = CancelToken::new();
        let shared = Arc::new((Mutex::new(0u32), Condvar::new()));

        let setter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                *shared.0.lock() = 7;
                shared.1.notify_all();
            })
        };

        let mut guard = shared.0.lock();
        let outcome = wait_while(&shared.1, &mut guard, &token, None, |v| *v == 0).unwrap();
        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(*guard, 7);
        drop(guard);
        setter.join().unwrap();
    }

    #[test]
    fn ready_state_wins_over_cancellation() {
        let token = CancelToken::new();
        token.cancel();
        let lock = Mutex::new(1u32);
        let cv = Condvar::new();
        let mut guard = lock.lock();
        let outcome = wait_while(&cv, &mut guard, &token, None, |v| *v == 0).unwrap();
        assert_eq!(outcome, WaitOutcome::Ready);
    }
}
