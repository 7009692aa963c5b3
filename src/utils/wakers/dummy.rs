use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Wake;

/// A waker which only counts how often it was woken.
#[derive(Debug, Default)]
pub(crate) struct DummyWaker {
    pub(crate) woken: AtomicUsize,
}

impl Wake for DummyWaker {
    fn wake(self: Arc<Self>) {
        self.woken.fetch_add(1, Ordering::SeqCst);
    }
}
