//! Merge a dynamically growing set of streams into a single stream.
//!
//! A [`Mux`] owns any number of sources, each an independent
//! [`Stream`][futures_core::Stream], and yields their values as they become
//! available. Sources can be added before iteration starts, from inside the
//! loop consuming the merged stream, or from other tasks through a
//! [`Handle`]. The merged stream ends once every source has ended.
//!
//! # Operations
//!
//! - [`Mux`]: Merge a growable set of streams.
//! - [`Keyed`]: Like `Mux`, but also yields the [`Key`] of each value's source.
//! - [`TryMux`]: Merge fallible streams, retiring a source when it fails.
//! - [`Handle`]: Add sources to, or cancel, a `Mux` from elsewhere.
//! - [`signal::Signal`]: The one-shot wakeup the merged stream waits on.
//!
//! # Examples
//!
//! ```rust
//! use futures_mux::Mux;
//! use futures_lite::future::block_on;
//! use futures_lite::{stream, StreamExt};
//!
//! block_on(async {
//!     let mut mux = Mux::new();
//!     mux.add(stream::iter(vec![1, 2]));
//!     mux.add(stream::iter(vec![10, 20, 30]));
//!
//!     let mut out: Vec<_> = mux.collect().await;
//!     out.sort();
//!     assert_eq!(out, vec![1, 2, 10, 20, 30]);
//! })
//! ```
//!
//! # Cancellation
//!
//! Dropping a `Mux` drops every source it holds. To stop a `Mux` which is
//! being consumed elsewhere, call [`Handle::cancel`]: the merged stream drops
//! its sources and ends on its next poll.

#![forbid(unsafe_code)]
#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod error;
mod utils;

pub mod signal;
pub mod stream;

pub use error::{Error, SourceError};
pub use stream::{Handle, Key, Keyed, Mux, TryMux};
