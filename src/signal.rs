//! A single-shot wakeup primitive.
//!
//! A [`Signal`] starts out pending and is settled exactly once, either by
//! [`Signal::resolve`] or by [`Signal::reject`]. Any number of tasks may wait
//! on it; they are all woken together when it settles.
//!
//! # Examples
//!
//! ```
//! use futures_mux::signal::Signal;
//! use futures_lite::future::block_on;
//!
//! block_on(async {
//!     let signal: Signal = Signal::new();
//!     let waiter = signal.wait();
//!
//!     assert!(signal.resolve());
//!     assert!(!signal.resolve()); // already settled, no effect
//!     assert_eq!(waiter.await, Ok(()));
//! })
//! ```

use core::convert::Infallible;
use core::fmt;
use core::future::{Future, IntoFuture};
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use std::sync::{Arc, Mutex, MutexGuard};

use slab::Slab;
use smallvec::SmallVec;

use crate::utils;

enum State<E> {
    Pending,
    Resolved,
    Rejected(E),
}

struct Inner<E> {
    state: State<E>,
    waiters: Slab<Waker>,
}

/// A one-shot notification which can be awaited by many tasks at once.
///
/// Cloning a `Signal` yields another handle to the same notification. Every
/// handle can both settle the signal and wait on it.
pub struct Signal<E = Infallible> {
    inner: Arc<Mutex<Inner<E>>>,
}

impl<E> Signal<E> {
    /// Create a new, pending signal.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                waiters: Slab::new(),
            })),
        }
    }

    /// Resolve the signal, waking every waiter.
    ///
    /// Returns `true` if this call settled the signal. Settling an already
    /// settled signal has no effect and returns `false`.
    pub fn resolve(&self) -> bool {
        self.settle(State::Resolved)
    }

    /// Reject the signal with an error, waking every waiter.
    ///
    /// Follows the same rules as [`Signal::resolve`]: only the first
    /// settlement is observed.
    pub fn reject(&self, error: E) -> bool {
        self.settle(State::Rejected(error))
    }

    /// Returns `true` once the signal has been resolved or rejected.
    pub fn is_settled(&self) -> bool {
        !matches!(self.lock().state, State::Pending)
    }

    /// Returns `true` if the signal was resolved, as opposed to rejected or
    /// still pending.
    pub fn is_resolved(&self) -> bool {
        matches!(self.lock().state, State::Resolved)
    }

    /// Create a future which completes once the signal settles.
    pub fn wait(&self) -> Wait<E> {
        Wait {
            signal: self.clone(),
            slot: None,
        }
    }

    fn settle(&self, outcome: State<E>) -> bool {
        let wakers: SmallVec<[Waker; 4]> = {
            let mut inner = self.lock();
            if !matches!(inner.state, State::Pending) {
                return false;
            }
            inner.state = outcome;
            inner.waiters.drain().collect()
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner<E>> {
        utils::lock(&self.inner)
    }
}

impl<E> Clone for Signal<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        let state = match inner.state {
            State::Pending => "pending",
            State::Resolved => "resolved",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("Signal")
            .field("state", &state)
            .field("waiters", &inner.waiters.len())
            .finish()
    }
}

impl<E: Clone> IntoFuture for Signal<E> {
    type Output = Result<(), E>;
    type IntoFuture = Wait<E>;

    fn into_future(self) -> Self::IntoFuture {
        Wait {
            signal: self,
            slot: None,
        }
    }
}

/// Future returned by [`Signal::wait`].
///
/// Resolves to `Ok(())` if the signal was resolved, or to a clone of the error
/// if it was rejected.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Wait<E = Infallible> {
    signal: Signal<E>,
    slot: Option<usize>,
}

impl<E> Wait<E> {
    /// The signal this future is waiting on.
    pub fn signal(&self) -> &Signal<E> {
        &self.signal
    }

    /// Returns `true` if polling this future would complete immediately.
    pub fn is_settled(&self) -> bool {
        self.signal.is_settled()
    }
}

impl<E: Clone> Future for Wait<E> {
    type Output = Result<(), E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut guard = this.signal.lock();
        let inner = &mut *guard;
        match &inner.state {
            State::Resolved => {
                this.slot = None;
                Poll::Ready(Ok(()))
            }
            State::Rejected(error) => {
                let error = error.clone();
                this.slot = None;
                Poll::Ready(Err(error))
            }
            State::Pending => {
                match this.slot.and_then(|key| inner.waiters.get_mut(key)) {
                    Some(waker) => {
                        if !waker.will_wake(cx.waker()) {
                            *waker = cx.waker().clone();
                        }
                    }
                    None => this.slot = Some(inner.waiters.insert(cx.waker().clone())),
                }
                Poll::Pending
            }
        }
    }
}

impl<E> Drop for Wait<E> {
    fn drop(&mut self) {
        if let Some(key) = self.slot.take() {
            let mut inner = self.signal.lock();
            // Settling drains every waiter, so only pending signals hold our slot.
            if matches!(inner.state, State::Pending) {
                inner.waiters.try_remove(key);
            }
        }
    }
}

impl<E> fmt::Debug for Wait<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("signal", &self.signal)
            .field("registered", &self.slot.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::DummyWaker;
    use core::task::Context;
    use futures_lite::future::{block_on, poll_once};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[test]
    fn smoke() {
        block_on(async {
            let signal: Signal = Signal::new();
            assert!(!signal.is_settled());
            assert!(signal.resolve());
            assert!(signal.is_settled());
            assert_eq!(signal.wait().await, Ok(()));
        });
    }

    #[test]
    fn resolve_is_idempotent() {
        let signal: Signal<&str> = Signal::new();
        assert!(signal.resolve());
        assert!(!signal.resolve());
        assert!(!signal.reject("too late"));
        assert!(signal.is_resolved());
        assert_eq!(block_on(signal.wait()), Ok(()));
    }

    #[test]
    fn reject_reaches_every_waiter() {
        block_on(async {
            let signal: Signal<&str> = Signal::new();
            let a = signal.wait();
            let b = signal.clone().into_future();
            assert!(signal.reject("boom"));
            assert!(!signal.resolve());
            assert!(!signal.is_resolved());
            assert_eq!(a.await, Err("boom"));
            assert_eq!(b.await, Err("boom"));
        });
    }

    #[test]
    fn all_waiters_are_woken() {
        let signal: Signal = Signal::new();
        let wakers: Vec<_> = (0..3).map(|_| Arc::new(DummyWaker::default())).collect();
        let mut waits: Vec<_> = (0..3).map(|_| signal.wait()).collect();

        for (wait, waker) in waits.iter_mut().zip(&wakers) {
            let waker = Waker::from(waker.clone());
            let mut cx = Context::from_waker(&waker);
            assert!(Pin::new(wait).poll(&mut cx).is_pending());
        }
        assert_eq!(signal.lock().waiters.len(), 3);

        signal.resolve();
        for waker in &wakers {
            assert_eq!(waker.woken.load(Ordering::SeqCst), 1);
        }
        for wait in waits {
            assert_eq!(block_on(wait), Ok(()));
        }
    }

    #[test]
    fn repolling_does_not_register_twice() {
        let signal: Signal = Signal::new();
        let mut wait = signal.wait();
        for _ in 0..4 {
            assert!(block_on(poll_once(&mut wait)).is_none());
        }
        assert_eq!(signal.lock().waiters.len(), 1);
    }

    #[test]
    fn dropped_waiter_deregisters() {
        let signal: Signal = Signal::new();
        let mut wait = signal.wait();
        assert!(block_on(poll_once(&mut wait)).is_none());
        assert_eq!(signal.lock().waiters.len(), 1);
        drop(wait);
        assert_eq!(signal.lock().waiters.len(), 0);
    }
}
