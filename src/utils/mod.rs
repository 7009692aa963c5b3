//! Utilities to implement the different streams of this crate.

mod wakers;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) use wakers::{ReadinessVec, WakerVec};

#[cfg(test)]
pub(crate) use wakers::DummyWaker;

/// Lock a mutex, recovering the data if another thread panicked with it held.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
