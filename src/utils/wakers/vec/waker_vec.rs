use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Waker;

use super::{InlineWakerVec, ReadinessVec};
use crate::utils::lock;

/// A collection of per-source wakers sharing one readiness list.
pub(crate) struct WakerVec {
    wakers: Vec<Waker>,
    readiness: Arc<Mutex<ReadinessVec>>,
}

impl Default for WakerVec {
    fn default() -> Self {
        Self::new(0)
    }
}

impl WakerVec {
    /// Create a new instance of `WakerVec`.
    pub(crate) fn new(len: usize) -> Self {
        let readiness = Arc::new(Mutex::new(ReadinessVec::new(len)));
        let wakers = (0..len)
            .map(|i| Arc::new(InlineWakerVec::new(i, readiness.clone())).into())
            .collect();
        Self { wakers, readiness }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Waker> {
        self.wakers.get(index)
    }

    /// Access the `Readiness`.
    pub(crate) fn readiness(&self) -> MutexGuard<'_, ReadinessVec> {
        lock(&self.readiness)
    }

    /// A shared reference to the readiness, for registration handles.
    pub(crate) fn shared_readiness(&self) -> Arc<Mutex<ReadinessVec>> {
        self.readiness.clone()
    }

    /// Grow the `WakerVec` so that `len` sources have a waker.
    pub(crate) fn resize(&mut self, len: usize) {
        if len <= self.wakers.len() {
            return;
        }
        // New wakers continue numbering from the current length.
        let mut index = self.wakers.len();
        self.wakers.resize_with(len, || {
            let ret = Arc::new(InlineWakerVec::new(index, self.readiness.clone())).into();
            index += 1;
            ret
        });

        self.readiness().resize(len);
    }
}
