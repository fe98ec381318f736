//! Monotonically growing sets of context-qualified abstract objects.

use super::element::CsObjId;
use std::collections::BTreeSet;

/// The set of context-qualified abstract objects a pointer may reference.
///
/// Points-to sets only ever grow during a solver run; there is no removal operation.
/// Iteration order is the order of the object handles,
/// which is deterministic for a fixed program and configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PointsToSet {
    objects: BTreeSet<CsObjId>,
}

impl PointsToSet {
    /// Create an empty points-to set.
    pub fn new() -> PointsToSet {
        PointsToSet::default()
    }

    /// Create a points-to set containing a single object.
    pub fn singleton(object: CsObjId) -> PointsToSet {
        let mut set = PointsToSet::new();
        set.insert(object);
        set
    }

    /// Add an object to the set. Returns whether the object was new.
    pub fn insert(&mut self, object: CsObjId) -> bool {
        self.objects.insert(object)
    }

    /// Returns whether the set contains the given object.
    pub fn contains(&self, object: CsObjId) -> bool {
        self.objects.contains(&object)
    }

    /// Iterate over the objects of the set.
    pub fn iter(&self) -> impl Iterator<Item = &CsObjId> {
        self.objects.iter()
    }

    /// The number of objects in the set.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl FromIterator<CsObjId> for PointsToSet {
    fn from_iter<I: IntoIterator<Item = CsObjId>>(iter: I) -> PointsToSet {
        PointsToSet {
            objects: iter.into_iter().collect(),
        }
    }
}
