use core::fmt;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::utils::{lock, ReadinessVec};

/// Where a multiplexer is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Open,
    Terminated,
    Cancelled,
}

impl Lifecycle {
    pub(crate) fn check(self) -> Result<(), Error> {
        match self {
            Lifecycle::Open => Ok(()),
            Lifecycle::Terminated => Err(Error::Terminated),
            Lifecycle::Cancelled => Err(Error::Cancelled),
        }
    }

    /// Only an open multiplexer can be cancelled.
    pub(crate) fn cancel(&mut self) -> bool {
        if *self == Lifecycle::Open {
            *self = Lifecycle::Cancelled;
            true
        } else {
            false
        }
    }
}

/// Sources queued by handles until the merged stream picks them up.
pub(crate) struct Intake<S> {
    pub(crate) queue: Vec<S>,
    pub(crate) lifecycle: Lifecycle,
}

/// State shared between a `Mux` and its handles.
pub(crate) struct Shared<S> {
    pub(crate) intake: Mutex<Intake<S>>,
    readiness: Arc<Mutex<ReadinessVec>>,
}

impl<S> Shared<S> {
    pub(crate) fn new(readiness: Arc<Mutex<ReadinessVec>>) -> Self {
        Self {
            intake: Mutex::new(Intake {
                queue: Vec::new(),
                lifecycle: Lifecycle::Open,
            }),
            readiness,
        }
    }

    /// Wake the merged stream out of its current round.
    fn notify(&self) {
        let round = lock(&self.readiness).round().clone();
        round.resolve();
    }
}

/// A handle to add sources to a [`Mux`][crate::Mux] from anywhere.
///
/// Handles are cheap to clone. When `S` is `Send`, so is the handle, which
/// lets other tasks or threads feed new sources into a stream someone else
/// is consuming.
///
/// # Example
///
/// ```rust
/// use futures_mux::Mux;
/// use futures_lite::{stream, StreamExt};
///
/// # futures_lite::future::block_on(async {
/// let mut mux = Mux::new();
/// mux.add(stream::iter(vec![1, 2]));
///
/// let handle = mux.handle();
/// handle.add(stream::iter(vec![3])).unwrap();
/// assert_eq!(mux.len(), 2);
///
/// let mut out: Vec<_> = mux.collect().await;
/// out.sort();
/// assert_eq!(out, vec![1, 2, 3]);
/// # });
/// ```
pub struct Handle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Handle<S> {
    pub(crate) fn new(shared: Arc<Shared<S>>) -> Self {
        Self { shared }
    }

    /// Queue a new source. The merged stream picks it up on its next poll.
    ///
    /// Fails once the merged stream has ended or was cancelled; a dropped
    /// `Mux` counts as cancelled.
    pub fn add(&self, source: impl Into<S>) -> Result<(), Error> {
        {
            let mut intake = lock(&self.shared.intake);
            intake.lifecycle.check()?;
            intake.queue.push(source.into());
        }
        tracing::trace!("source queued through handle");
        self.shared.notify();
        Ok(())
    }

    /// Cancel the multiplexer. Its sources are dropped on its next poll, and
    /// the merged stream ends.
    ///
    /// Returns `false` if the multiplexer had already ended.
    pub fn cancel(&self) -> bool {
        let cancelled = lock(&self.shared.intake).lifecycle.cancel();
        if cancelled {
            tracing::debug!("multiplexer cancelled through handle");
            self.shared.notify();
        }
        cancelled
    }

    /// Returns `true` if the multiplexer no longer accepts sources.
    pub fn is_closed(&self) -> bool {
        lock(&self.shared.intake).lifecycle != Lifecycle::Open
    }
}

impl<S> Clone for Handle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S> fmt::Debug for Handle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let intake = lock(&self.shared.intake);
        f.debug_struct("Handle")
            .field("queued", &intake.queue.len())
            .field("lifecycle", &intake.lifecycle)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::{Error, Mux};
    use futures_lite::future::{block_on, poll_once};
    use futures_lite::{prelude::*, stream};

    #[test]
    fn add_through_handle() {
        block_on(async {
            let mut mux = Mux::new();
            let handle = mux.handle();
            mux.add(stream::iter(vec![1, 2]));
            handle.add(stream::iter(vec![3, 4])).unwrap();

            let mut out: Vec<_> = (&mut mux).collect().await;
            out.sort();
            assert_eq!(out, vec![1, 2, 3, 4]);
            assert!(handle.is_closed());
            assert_eq!(handle.add(stream::iter(vec![5])), Err(Error::Terminated));
        });
    }

    #[test]
    fn handle_wakes_a_waiting_mux() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<u8>();
        let (_tx2, rx2) = futures::channel::mpsc::unbounded::<u8>();
        let mut mux = Mux::new();
        mux.add(rx);
        let handle = mux.handle();

        assert!(block_on(poll_once(mux.next())).is_none());
        handle.add(rx2).unwrap();
        tx.unbounded_send(1).unwrap();
        assert_eq!(block_on(mux.next()), Some(1));
        assert_eq!(mux.len(), 2);
    }

    #[test]
    fn cancel_through_handle() {
        block_on(async {
            let mut mux = Mux::new();
            mux.add(stream::repeat(7));
            let handle = mux.handle();

            assert_eq!(mux.next().await, Some(7));
            assert!(handle.cancel());
            assert!(!handle.cancel());
            assert_eq!(mux.next().await, None);
            assert!(mux.is_empty());
            assert_eq!(handle.add(stream::repeat(8)), Err(Error::Cancelled));
        });
    }

    #[test]
    fn dropping_the_mux_closes_handles() {
        let mux: Mux<stream::Once<u8>> = Mux::new();
        let handle = mux.handle();
        assert!(!handle.is_closed());
        drop(mux);
        assert!(handle.is_closed());
        assert_eq!(handle.add(stream::once(1)), Err(Error::Cancelled));
    }
}
