use core::fmt;
use core::future::{Future, IntoFuture};
use core::ops::{Deref, DerefMut};
use core::pin::Pin;
use core::task::{Context, Poll};
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

use fixedbitset::FixedBitSet;
use futures_core::stream::{FusedStream, Stream};
use slab::Slab;
use smallvec::SmallVec;

use super::handle::{Handle, Lifecycle, Shared};
use crate::error::Error;
use crate::signal::Wait;
use crate::utils::{lock, WakerVec};

/// A growable set of streams merged into a single stream.
///
/// Sources can be added at any time, including while the `Mux` is being
/// iterated over. Values are yielded in the order in which the sources
/// produced them. The merged stream ends once every source has been
/// exhausted, and cannot be restarted after that.
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
/// mux.add(stream::iter(vec![10, 20, 30]));
///
/// let mut out = 0;
/// while let Some(num) = mux.next().await {
///     out += num;
/// }
/// assert_eq!(out, 63);
/// assert!(mux.is_empty());
/// # });
/// ```
///
/// **Add sources while iterating**
///
/// ```rust
/// use futures_mux::Mux;
/// use futures_lite::{stream, StreamExt};
///
/// # futures_lite::future::block_on(async {
/// let mut mux = Mux::new();
/// mux.add(stream::iter(vec![3]));
///
/// let mut out = vec![];
/// while let Some(num) = mux.next().await {
///     if num > 0 {
///         mux.add(stream::iter(vec![num - 1]));
///     }
///     out.push(num);
/// }
/// assert_eq!(out, vec![3, 2, 1, 0]);
/// # });
/// ```
#[must_use = "`Mux` does nothing if not iterated over"]
pub struct Mux<S: Stream> {
    sources: Slab<Pin<Box<S>>>,
    pending: VecDeque<(Key, S::Item)>,
    parked: FixedBitSet,
    rearm: Option<usize>,
    wakers: WakerVec,
    round: Wait,
    shared: Arc<Shared<S>>,
    finished: bool,
}

// Sources are pinned on the heap and never projected to.
impl<S: Stream> Unpin for Mux<S> {}

impl<S: Stream> fmt::Debug for Mux<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mux")
            .field("slab", &"[..]")
            .field("len", &self.sources.len())
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<S: Stream> Default for Mux<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Stream> Mux<S> {
    /// Create a new instance of `Mux`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::Mux;
    ///
    /// let mux = Mux::new();
    /// # let mux: Mux<futures_lite::stream::Empty<usize>> = mux;
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new instance of `Mux` with room for `capacity` sources.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::Mux;
    ///
    /// let mux = Mux::with_capacity(2);
    /// # let mux: Mux<futures_lite::stream::Empty<usize>> = mux;
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        let wakers = WakerVec::new(capacity);
        let round = wakers.readiness().round().wait();
        let shared = Arc::new(Shared::new(wakers.shared_readiness()));
        Self {
            sources: Slab::with_capacity(capacity),
            pending: VecDeque::with_capacity(capacity),
            parked: FixedBitSet::with_capacity(capacity),
            rearm: None,
            wakers,
            round,
            shared,
            finished: false,
        }
    }

    /// Return the number of sources which are still active.
    ///
    /// This includes sources added through a [`Handle`] which the merged
    /// stream has not picked up yet.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::Mux;
    /// use futures_lite::stream;
    ///
    /// let mut mux = Mux::new();
    /// assert_eq!(mux.len(), 0);
    /// mux.add(stream::once(12));
    /// assert_eq!(mux.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.sources.len() + lock(&self.shared.intake).queue.len()
    }

    /// Returns true if there are no active sources.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::Mux;
    /// use futures_lite::stream;
    ///
    /// let mut mux = Mux::new();
    /// assert!(mux.is_empty());
    /// mux.add(stream::once(12));
    /// assert!(!mux.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a new source, and request its first value right away.
    ///
    /// # Panics
    ///
    /// Panics if the merged stream has already ended, or if the `Mux` was
    /// cancelled. Use [`Mux::try_add`] to handle that case instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::Mux;
    /// use futures_lite::stream;
    ///
    /// let mut mux = Mux::new();
    /// mux.add(stream::once(12));
    /// ```
    pub fn add(&mut self, source: S) -> Key {
        match self.try_add(source) {
            Ok(key) => key,
            Err(err) => panic!("`Mux::add` called on a finished multiplexer: {err}"),
        }
    }

    /// Add a new source, failing if the merged stream has already ended or
    /// was cancelled.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::{Error, Mux};
    /// use futures_lite::{stream, StreamExt};
    ///
    /// # futures_lite::future::block_on(async {
    /// let mut mux = Mux::new();
    /// mux.try_add(stream::once(1)).unwrap();
    /// while mux.next().await.is_some() {}
    ///
    /// assert_eq!(mux.try_add(stream::once(2)), Err(Error::Terminated));
    /// # });
    /// ```
    pub fn try_add(&mut self, source: S) -> Result<Key, Error> {
        lock(&self.shared.intake).lifecycle.check()?;
        Ok(self.register(source))
    }

    /// Create a handle which can add sources to, or cancel, this `Mux` from
    /// other tasks.
    pub fn handle(&self) -> Handle<S> {
        Handle::new(self.shared.clone())
    }

    /// Drop every source and every value not yet yielded. The merged stream
    /// ends, and no further sources can be added.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::Mux;
    /// use futures_lite::{stream, StreamExt};
    ///
    /// # futures_lite::future::block_on(async {
    /// let mut mux = Mux::new();
    /// mux.add(stream::repeat(1));
    /// assert_eq!(mux.next().await, Some(1));
    ///
    /// mux.cancel();
    /// assert_eq!(mux.next().await, None);
    /// assert!(mux.is_empty());
    /// # });
    /// ```
    pub fn cancel(&mut self) {
        lock(&self.shared.intake).lifecycle.cancel();
        self.shutdown();
    }

    /// Create a stream which also yields the key of the source each value
    /// came from.
    ///
    /// # Example
    ///
    /// ```rust
    /// use futures_mux::Mux;
    /// use futures_lite::{stream, StreamExt};
    ///
    /// # futures_lite::future::block_on(async {
    /// let mut mux = Mux::new();
    /// let a = mux.add(stream::once(2));
    /// let b = mux.add(stream::once(4));
    ///
    /// let mut mux = mux.keyed();
    /// let mut keys = vec![];
    /// while let Some((key, _num)) = mux.next().await {
    ///     keys.push(key);
    /// }
    /// assert_eq!(keys, vec![a, b]);
    /// # });
    /// ```
    pub fn keyed(self) -> Keyed<S> {
        Keyed { mux: self }
    }

    fn register(&mut self, source: S) -> Key {
        let index = self.sources.insert(Box::pin(source));
        self.wakers.resize(index + 1);
        self.parked.grow(index + 1);

        let round = {
            let mut readiness = self.wakers.readiness();
            readiness.set_ready(index);
            readiness.round().clone()
        };
        round.resolve();

        tracing::trace!(key = index, active = self.sources.len(), "source added");
        Key(index)
    }

    /// Request the next value of a single source.
    fn drive(&mut self, index: usize) {
        self.wakers.readiness().clear_ready(index);

        let (Some(source), Some(waker)) = (self.sources.get_mut(index), self.wakers.get(index))
        else {
            return;
        };
        let mut cx = Context::from_waker(waker);
        let poll = source.as_mut().poll_next(&mut cx);
        match poll {
            Poll::Ready(Some(item)) => {
                self.parked.insert(index);
                self.pending.push_back((Key(index), item));
            }
            Poll::Ready(None) => {
                self.sources.remove(index);
                self.wakers.readiness().clear_ready(index);
                tracing::trace!(key = index, active = self.sources.len(), "source exhausted");
            }
            Poll::Pending => {}
        }
    }

    /// Drive every source which was woken since the last drain.
    fn drain(&mut self) {
        let ready: SmallVec<[usize; 8]> = self.wakers.readiness().ready_indices().collect();
        for index in ready {
            if !self.parked.contains(index) {
                self.drive(index);
            }
        }
    }

    /// Move sources added through handles into the set.
    fn absorb(&mut self) -> Lifecycle {
        let (queued, lifecycle) = {
            let mut intake = lock(&self.shared.intake);
            (mem::take(&mut intake.queue), intake.lifecycle)
        };
        if lifecycle == Lifecycle::Open {
            for source in queued {
                self.register(source);
            }
        }
        lifecycle
    }

    /// Mark the stream as ended, unless a handle slipped in another source.
    fn try_terminate(&mut self) -> bool {
        {
            let mut intake = lock(&self.shared.intake);
            if !intake.queue.is_empty() {
                return false;
            }
            intake.lifecycle = Lifecycle::Terminated;
        }
        self.finished = true;
        tracing::trace!("all sources exhausted");
        true
    }

    fn shutdown(&mut self) {
        let queued = mem::take(&mut lock(&self.shared.intake).queue);
        let dropped = self.sources.len() + queued.len();
        drop(queued);

        self.sources.clear();
        self.pending.clear();
        self.parked.clear();
        self.rearm = None;
        if !self.finished {
            self.finished = true;
            tracing::debug!(dropped, "multiplexer cancelled");
        }
    }

    fn poll_next_inner(&mut self, cx: &mut Context<'_>) -> Poll<Option<(Key, S::Item)>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let mut drained = false;
        loop {
            // Request the next value of the source we yielded from last.
            if let Some(index) = self.rearm.take() {
                self.parked.set(index, false);
                self.drive(index);
            }

            // Everything the round produced went out, start the next one.
            // This happens before looking at the intake so that a handle
            // which adds a source afterwards resolves the new round.
            if self.pending.is_empty() && self.round.is_settled() {
                self.round = self.wakers.readiness().next_round().into_future();
                tracing::trace!(active = self.sources.len(), "round started");
            }

            match self.absorb() {
                Lifecycle::Open => {}
                Lifecycle::Cancelled | Lifecycle::Terminated => {
                    self.shutdown();
                    return Poll::Ready(None);
                }
            }

            // Sources woken while the round is handed out join it, behind the
            // values already queued. Re-arming alone can keep the queue from
            // ever running empty.
            if !drained && !self.pending.is_empty() && self.wakers.readiness().any_ready() {
                self.drain();
                drained = true;
            }

            if let Some((key, item)) = self.pending.pop_front() {
                self.rearm = Some(key.0);
                return Poll::Ready(Some((key, item)));
            }

            if self.sources.is_empty() {
                if self.try_terminate() {
                    return Poll::Ready(None);
                }
                continue;
            }

            match Pin::new(&mut self.round).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(_) if drained => {
                    // Sources keep waking themselves, give other tasks a turn.
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
                Poll::Ready(_) => {}
            }

            self.drain();
            drained = true;
        }
    }
}

impl<S: Stream> Drop for Mux<S> {
    fn drop(&mut self) {
        let queued = {
            let mut intake = lock(&self.shared.intake);
            intake.lifecycle.cancel();
            mem::take(&mut intake.queue)
        };
        drop(queued);
    }
}

impl<S: Stream> Stream for Mux<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().poll_next_inner(cx) {
            Poll::Ready(Some((_key, item))) => Poll::Ready(Some(item)),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            (self.pending.len(), None)
        }
    }
}

impl<S: Stream> FusedStream for Mux<S> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<S: Stream> FromIterator<S> for Mux<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let len = iter.size_hint().1.unwrap_or_default();
        let mut this = Self::with_capacity(len);
        this.extend(iter);
        this
    }
}

impl<S: Stream> Extend<S> for Mux<S> {
    /// # Panics
    ///
    /// Panics under the same conditions as [`Mux::add`].
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        for source in iter {
            self.add(source);
        }
    }
}

/// A key identifying a source in a [`Mux`].
///
/// Keys of exhausted sources may be handed out again to new sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub(crate) usize);

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Iterate over the values of a [`Mux`] together with the key of their source.
///
/// This `struct` is created by [`Mux::keyed`].
#[derive(Debug)]
#[pin_project::pin_project]
pub struct Keyed<S: Stream> {
    #[pin]
    mux: Mux<S>,
}

impl<S: Stream> Keyed<S> {
    /// Turn this back into a plain [`Mux`].
    pub fn into_inner(self) -> Mux<S> {
        self.mux
    }
}

impl<S: Stream> Deref for Keyed<S> {
    type Target = Mux<S>;

    fn deref(&self) -> &Self::Target {
        &self.mux
    }
}

impl<S: Stream> DerefMut for Keyed<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.mux
    }
}

impl<S: Stream> Stream for Keyed<S> {
    type Item = (Key, S::Item);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        this.mux.get_mut().poll_next_inner(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.mux.size_hint()
    }
}

impl<S: Stream> FusedStream for Keyed<S> {
    fn is_terminated(&self) -> bool {
        self.mux.is_terminated()
    }
}
