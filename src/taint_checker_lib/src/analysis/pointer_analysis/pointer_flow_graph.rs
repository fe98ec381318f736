//! The pointer flow graph of the analysis.
//!
//! Nodes are pointers, edges denote "the points-to set of the source flows into the target".
//! The graph models assignment-like dataflow, not control flow.
//! Every edge is a standing propagation obligation:
//! once inserted, the target's points-to set must always contain
//! whatever the source's points-to set becomes.
//! Consequently the graph only ever grows; there is no removal operation.

use super::element::PointerId;
use std::collections::BTreeSet;

/// The edge set of the pointer flow graph, stored as per-pointer successor sets.
#[derive(Debug, Default)]
pub struct PointerFlowGraph {
    successors: Vec<BTreeSet<PointerId>>,
    edge_count: usize,
}

impl PointerFlowGraph {
    /// Create an empty pointer flow graph.
    pub fn new() -> PointerFlowGraph {
        PointerFlowGraph::default()
    }

    /// Add the edge `source -> target` unless it is already present.
    /// Returns whether the edge was newly added.
    pub fn add_edge(&mut self, source: PointerId, target: PointerId) -> bool {
        if self.successors.len() <= source.0 {
            self.successors.resize_with(source.0 + 1, BTreeSet::new);
        }
        let new = self.successors[source.0].insert(target);
        if new {
            self.edge_count += 1;
        }
        new
    }

    /// Iterate over the successors of a pointer.
    pub fn successors(&self, pointer: PointerId) -> impl Iterator<Item = PointerId> + '_ {
        self.successors
            .get(pointer.0)
            .into_iter()
            .flat_map(|successors| successors.iter().copied())
    }

    /// The total number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}
