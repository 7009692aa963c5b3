use std::sync::{Arc, Mutex};
use std::task::Wake;

use super::ReadinessVec;
use crate::utils::lock;

/// The waker handed to a single source. Waking it marks the source ready and
/// resolves the signal of the current round.
#[derive(Debug, Clone)]
pub(crate) struct InlineWakerVec {
    pub(crate) id: usize,
    pub(crate) readiness: Arc<Mutex<ReadinessVec>>,
}

impl InlineWakerVec {
    /// Create a new instance of `InlineWakerVec`.
    pub(crate) fn new(id: usize, readiness: Arc<Mutex<ReadinessVec>>) -> Self {
        Self { id, readiness }
    }
}

impl Wake for InlineWakerVec {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref()
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let round = {
            let mut readiness = lock(&self.readiness);
            if readiness.set_ready(self.id) {
                return;
            }
            readiness.round().clone()
        };
        round.resolve();
    }
}
