use fixedbitset::FixedBitSet;

use crate::signal::Signal;

/// Tracks which sources are "ready" and should be driven, along with the
/// signal for the round currently in progress.
#[derive(Debug)]
pub(crate) struct ReadinessVec {
    ready_count: usize,
    readiness_list: FixedBitSet,
    round: Signal,
}

impl ReadinessVec {
    /// Create a new instance of readiness with nothing marked ready.
    pub(crate) fn new(len: usize) -> Self {
        Self {
            ready_count: 0,
            readiness_list: FixedBitSet::with_capacity(len),
            round: Signal::new(),
        }
    }

    /// Set the ready state to `true` for the given index, growing the list
    /// if needed.
    ///
    /// Returns the old ready state for this id
    pub(crate) fn set_ready(&mut self, index: usize) -> bool {
        if index >= self.readiness_list.len() {
            self.readiness_list.grow(index + 1);
        }
        let was_ready = self.readiness_list.put(index);
        if !was_ready {
            self.ready_count += 1;
        }
        was_ready
    }

    /// Set the ready state to `false` for the given index
    ///
    /// Returns whether the task id was previously ready
    pub(crate) fn clear_ready(&mut self, index: usize) -> bool {
        if self.readiness_list.contains(index) {
            self.ready_count -= 1;
            self.readiness_list.set(index, false);
            true
        } else {
            false
        }
    }

    /// Returns `true` if any of the sources are ready.
    pub(crate) fn any_ready(&self) -> bool {
        self.ready_count > 0
    }

    /// Indexes currently marked ready, in ascending order.
    pub(crate) fn ready_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.readiness_list.ones()
    }

    /// The signal of the round in progress.
    pub(crate) fn round(&self) -> &Signal {
        &self.round
    }

    /// Replace the round signal with a fresh one.
    ///
    /// Readiness recorded while the previous round was being drained carries
    /// over: the new signal starts out resolved if anything is ready.
    pub(crate) fn next_round(&mut self) -> Signal {
        self.round = Signal::new();
        if self.any_ready() {
            self.round.resolve();
        }
        self.round.clone()
    }

    /// Resize `readiness` to hold at least `len` entries.
    ///
    /// New entries are not marked ready.
    pub(crate) fn resize(&mut self, len: usize) {
        if len > self.readiness_list.len() {
            self.readiness_list.grow(len);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_and_clear() {
        let mut readiness = ReadinessVec::new(4);
        assert!(!readiness.any_ready());
        assert!(!readiness.set_ready(2));
        assert!(readiness.set_ready(2));
        assert!(readiness.any_ready());
        assert!(readiness.clear_ready(2));
        assert!(!readiness.clear_ready(2));
        assert!(!readiness.any_ready());
    }

    #[test]
    fn grows_on_demand() {
        let mut readiness = ReadinessVec::new(0);
        readiness.set_ready(9);
        readiness.set_ready(3);
        assert_eq!(readiness.ready_indices().collect::<Vec<_>>(), vec![3, 9]);
        assert!(!readiness.clear_ready(100));
    }

    #[test]
    fn next_round_carries_readiness() {
        let mut readiness = ReadinessVec::new(2);
        let round = readiness.next_round();
        assert!(!round.is_settled());

        readiness.set_ready(1);
        let round = readiness.next_round();
        assert!(round.is_resolved());
    }
}
