//! The work list driving the fixpoint loop of the solver.

use super::element::PointerId;
use super::points_to_set::PointsToSet;
use std::collections::VecDeque;

/// A queue of pending propagation obligations.
///
/// Each entry demands that the given points-to set be propagated into the given pointer.
/// Entries are processed in FIFO order,
/// but the final fixpoint does not depend on the processing order;
/// the order only influences how many intermediate entries get created.
#[derive(Debug, Default)]
pub struct WorkList {
    entries: VecDeque<(PointerId, PointsToSet)>,
}

impl WorkList {
    /// Create an empty work list.
    pub fn new() -> WorkList {
        WorkList::default()
    }

    /// Add a propagation obligation.
    pub fn add_entry(&mut self, pointer: PointerId, points_to_set: PointsToSet) {
        self.entries.push_back((pointer, points_to_set));
    }

    /// Remove and return the oldest pending obligation.
    pub fn poll_entry(&mut self) -> Option<(PointerId, PointsToSet)> {
        self.entries.pop_front()
    }

    /// Returns whether no obligations are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::element::CsObjId;

    #[test]
    fn entries_are_polled_in_insertion_order() {
        let mut work_list = WorkList::new();
        assert!(work_list.is_empty());
        work_list.add_entry(PointerId(0), PointsToSet::singleton(CsObjId(0)));
        work_list.add_entry(PointerId(1), PointsToSet::singleton(CsObjId(1)));
        let (pointer, set) = work_list.poll_entry().unwrap();
        assert_eq!(pointer, PointerId(0));
        assert!(set.contains(CsObjId(0)));
        assert!(!work_list.is_empty());
        work_list.poll_entry().unwrap();
        assert!(work_list.poll_entry().is_none());
    }
}
