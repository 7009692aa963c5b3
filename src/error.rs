//! Errors returned by the multiplexer.

use core::fmt;

use crate::stream::Key;

/// Misuse of a multiplexer which can no longer accept sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Every source was exhausted and the merged stream has ended.
    #[error("the multiplexer has terminated and accepts no new sources")]
    Terminated,

    /// The multiplexer was cancelled and its sources were dropped.
    #[error("the multiplexer was cancelled")]
    Cancelled,
}

/// An error produced by one of the sources of a [`TryMux`][crate::TryMux].
///
/// The failing source is retired after its error is yielded; the remaining
/// sources are unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError<E> {
    key: Key,
    error: E,
}

impl<E> SourceError<E> {
    pub(crate) fn new(key: Key, error: E) -> Self {
        Self { key, error }
    }

    /// The key of the source which failed.
    pub fn key(&self) -> Key {
        self.key
    }

    /// The error reported by the source.
    pub fn get_ref(&self) -> &E {
        &self.error
    }

    /// Consume this error, returning the error reported by the source.
    pub fn into_inner(self) -> E {
        self.error
    }
}

impl<E: fmt::Display> fmt::Display for SourceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source {} failed: {}", self.key, self.error)
    }
}

impl<E> std::error::Error for SourceError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn display() {
        assert_eq!(
            Error::Terminated.to_string(),
            "the multiplexer has terminated and accepts no new sources"
        );
        let err = SourceError::new(Key(3), io::Error::other("disk on fire"));
        assert_eq!(err.to_string(), "source #3 failed: disk on fire");
        assert!(err.source().is_some());
        assert_eq!(err.key(), Key(3));
    }
}
