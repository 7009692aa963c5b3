use core::pin::Pin;
use core::task::{Context, Poll};

use futures_core::stream::{FusedStream, Stream, TryStream};
use futures_lite::ready;
use pin_project::pin_project;

use super::{Handle, Key, Keyed, Mux};
use crate::error::{Error, SourceError};

/// A source which ends right after yielding its first error.
///
/// [`TryMux`] wraps every source in this adapter, so a failing source is
/// retired once its error has been reported.
#[derive(Debug)]
#[pin_project]
pub struct UntilError<S> {
    #[pin]
    stream: S,
    failed: bool,
}

impl<S> UntilError<S> {
    /// Wrap a fallible stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            failed: false,
        }
    }
}

impl<S> From<S> for UntilError<S> {
    fn from(stream: S) -> Self {
        Self::new(stream)
    }
}

impl<S: TryStream> Stream for UntilError<S> {
    type Item = Result<S::Ok, S::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.failed {
            return Poll::Ready(None);
        }
        let item = ready!(this.stream.try_poll_next(cx));
        if let Some(Err(_)) = &item {
            *this.failed = true;
        }
        Poll::Ready(item)
    }
}

/// A growable set of fallible streams merged into a single stream.
///
/// When a source yields an error, the error is passed on as a
/// [`SourceError`] carrying the key of that source, and the source is
/// retired. The other sources keep going.
///
/// # Example
///
/// ```rust
/// use futures_mux::TryMux;
/// use futures_lite::{stream, StreamExt};
///
/// # futures_lite::future::block_on(async {
/// let mut mux = TryMux::new();
/// let bad = mux.add(stream::iter(vec![Ok(1), Err("broken pipe"), Ok(2)]));
/// mux.add(stream::iter(vec![Ok(10), Ok(20)]));
///
/// let mut values = vec![];
/// let mut errors = vec![];
/// while let Some(res) = mux.next().await {
///     match res {
///         Ok(num) => values.push(num),
///         Err(err) => errors.push(err),
///     }
/// }
/// values.sort();
/// assert_eq!(values, vec![1, 10, 20]);
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors[0].key(), bad);
/// # });
/// ```
#[must_use = "`TryMux` does nothing if not iterated over"]
#[derive(Debug)]
#[pin_project]
pub struct TryMux<S: TryStream> {
    #[pin]
    inner: Keyed<UntilError<S>>,
}

impl<S: TryStream> Default for TryMux<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TryStream> TryMux<S> {
    /// Create a new instance of `TryMux`.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a new instance of `TryMux` with room for `capacity` sources.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mux::with_capacity(capacity).keyed(),
        }
    }

    /// Return the number of sources which are still active.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if there are no active sources.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Add a new source.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Mux::add`].
    pub fn add(&mut self, source: S) -> Key {
        self.inner.add(UntilError::new(source))
    }

    /// Add a new source, failing if the merged stream has already ended or
    /// was cancelled.
    pub fn try_add(&mut self, source: S) -> Result<Key, Error> {
        self.inner.try_add(UntilError::new(source))
    }

    /// Create a handle which can add sources to, or cancel, this `TryMux`.
    ///
    /// The handle accepts plain sources of type `S`.
    pub fn handle(&self) -> Handle<UntilError<S>> {
        self.inner.handle()
    }

    /// Drop every source and end the merged stream.
    pub fn cancel(&mut self) {
        self.inner.cancel()
    }
}

impl<S: TryStream> Stream for TryMux<S> {
    type Item = Result<S::Ok, SourceError<S::Error>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match ready!(this.inner.poll_next(cx)) {
            Some((_key, Ok(item))) => Poll::Ready(Some(Ok(item))),
            Some((key, Err(error))) => {
                tracing::debug!(key = %key, "source failed, retiring it");
                Poll::Ready(Some(Err(SourceError::new(key, error))))
            }
            None => Poll::Ready(None),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<S: TryStream> FusedStream for TryMux<S> {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl<S: TryStream> FromIterator<S> for TryMux<S> {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let len = iter.size_hint().1.unwrap_or_default();
        let mut this = Self::with_capacity(len);
        for source in iter {
            this.add(source);
        }
        this
    }
}

#[cfg(test)]
mod test {
    use super::{TryMux, UntilError};
    use futures_lite::future::block_on;
    use futures_lite::{prelude::*, stream};
    use std::io;

    #[test]
    fn until_error_stops_after_the_error() {
        block_on(async {
            let source = stream::iter(vec![Ok(1), Err("nope"), Ok(2)]);
            let out: Vec<Result<i32, &str>> = UntilError::new(source).collect().await;
            assert_eq!(out, vec![Ok(1), Err("nope")]);
        });
    }

    #[test]
    fn failure_is_isolated() {
        block_on(async {
            let mut mux = TryMux::new();
            let failing = mux.add(stream::iter(vec![
                Ok(1),
                Err(io::Error::other("reset")),
                Ok(99),
            ]));
            let healthy = mux.add(stream::iter((10..15).map(Ok).collect::<Vec<_>>()));

            let mut values = vec![];
            let mut failures = vec![];
            while let Some(res) = mux.next().await {
                match res {
                    Ok(n) => values.push(n),
                    Err(err) => failures.push(err),
                }
            }

            values.sort();
            assert_eq!(values, vec![1, 10, 11, 12, 13, 14]);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].key(), failing);
            assert_ne!(failures[0].key(), healthy);
            assert_eq!(failures[0].get_ref().to_string(), "reset");
            assert!(mux.is_empty());
        });
    }

    #[test]
    fn handle_accepts_plain_sources() {
        block_on(async {
            let mut mux: TryMux<_> = vec![stream::iter(vec![Ok::<_, ()>(1)])]
                .into_iter()
                .collect();
            let handle = mux.handle();
            handle.add(stream::iter(vec![Err(())])).unwrap();

            let mut out = vec![];
            while let Some(res) = mux.next().await {
                out.push(res.map_err(|err| err.into_inner()));
            }
            out.sort();
            assert_eq!(out, vec![Ok(1), Err(())]);
        });
    }
}
