//! Merging a dynamic set of streams.
//!
//! # Examples
//!
//! Merge streams as their values become available, adding more while the
//! merged stream is already being consumed:
//!
//! ```
//! use futures_mux::stream::Mux;
//! use futures_lite::future::block_on;
//! use futures_lite::{stream, StreamExt};
//!
//! fn main() {
//!     block_on(async {
//!         let mut mux = Mux::new();
//!         mux.add(stream::iter(vec![1, 2, 3]));
//!
//!         let mut total = 0;
//!         while let Some(n) = mux.next().await {
//!             if n == 1 {
//!                 mux.add(stream::once(10));
//!             }
//!             total += n;
//!         }
//!         assert_eq!(total, 16);
//!     })
//! }
//! ```
//!
//! # Rounds
//!
//! The merged stream works in rounds. Each round waits on a
//! [`Signal`][crate::signal::Signal] which any source resolves when it wakes.
//! The woken sources are then polled once, their values are queued, and the
//! queue is handed out value by value. Right after a value is handed out its
//! source is asked for the next one, so the queue may keep growing until the
//! round ends. Sources which wake while the queue is being handed out are
//! polled on the next call and join the round behind the values already
//! queued, so a busy source cannot starve a slower one. A source is never
//! asked for a new value while its previous value is still queued.
//!
//! Woken sources are polled in key order, not in the order their wakers
//! fired, so values produced by the same drain are queued in key order.
//!
//! | Name     | Item                              | When does it end?               |
//! | ---      | ---                               | ---                             |
//! | `Mux`    | `T`                               | When every source has ended.    |
//! | `Keyed`  | `(Key, T)`                        | When every source has ended.    |
//! | `TryMux` | `Result<T, SourceError<E>>`       | When every source has ended or failed.

mod handle;
mod mux;
mod try_mux;

pub use handle::Handle;
pub use mux::{Key, Keyed, Mux};
pub use try_mux::{TryMux, UntilError};
