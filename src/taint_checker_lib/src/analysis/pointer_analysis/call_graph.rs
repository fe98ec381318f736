//! The context-sensitive call graph built on the fly during the fixpoint.
//!
//! Nodes are context-qualified methods,
//! edges lead from context-qualified call sites to their resolved callees
//! and are tagged with the dispatch kind of the call.
//! Edge insertion is idempotent and gate-keeping:
//! only the first insertion of an edge triggers reachability expansion
//! and parameter/return wiring in the solver.

use super::element::{CsCallSiteId, CsMethodId};
use crate::intermediate_representation::CallKind;
use fnv::{FnvHashMap, FnvHashSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// The label of a call graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallEdge {
    /// The dispatch kind of the call site.
    pub kind: CallKind,
    /// The context-qualified call site the edge originates from.
    pub call_site: CsCallSiteId,
}

/// The context-sensitive call graph together with the set of reachable methods.
pub struct CsCallGraph {
    graph: DiGraph<CsMethodId, CallEdge>,
    nodes: FnvHashMap<CsMethodId, NodeIndex>,
    edge_keys: FnvHashSet<(CsCallSiteId, CsMethodId)>,
    reachable: FnvHashSet<CsMethodId>,
    reachable_order: Vec<CsMethodId>,
    entry: Option<CsMethodId>,
}

impl CsCallGraph {
    /// Create an empty call graph.
    pub fn new() -> CsCallGraph {
        CsCallGraph {
            graph: DiGraph::new(),
            nodes: FnvHashMap::default(),
            edge_keys: FnvHashSet::default(),
            reachable: FnvHashSet::default(),
            reachable_order: Vec::new(),
            entry: None,
        }
    }

    fn node(&mut self, method: CsMethodId) -> NodeIndex {
        let graph = &mut self.graph;
        *self
            .nodes
            .entry(method)
            .or_insert_with(|| graph.add_node(method))
    }

    /// Register the entry method of the analyzed program.
    pub fn set_entry(&mut self, method: CsMethodId) {
        self.entry = Some(method);
        self.node(method);
    }

    /// The entry method, if already registered.
    pub fn entry(&self) -> Option<CsMethodId> {
        self.entry
    }

    /// Add a call edge unless an edge for the same (call site, callee) pair already exists.
    /// Returns whether the edge was newly added.
    pub fn add_edge(
        &mut self,
        caller: CsMethodId,
        call_site: CsCallSiteId,
        callee: CsMethodId,
        kind: CallKind,
    ) -> bool {
        if !self.edge_keys.insert((call_site, callee)) {
            return false;
        }
        let source = self.node(caller);
        let target = self.node(callee);
        self.graph.add_edge(source, target, CallEdge { kind, call_site });
        true
    }

    /// Mark a context-qualified method as reachable.
    /// Returns whether the method was not already reachable.
    pub fn add_reachable(&mut self, method: CsMethodId) -> bool {
        if self.reachable.insert(method) {
            self.reachable_order.push(method);
            self.node(method);
            true
        } else {
            false
        }
    }

    /// Returns whether a context-qualified method is reachable.
    pub fn is_reachable(&self, method: CsMethodId) -> bool {
        self.reachable.contains(&method)
    }

    /// The reachable context-qualified methods in discovery order.
    pub fn reachable_methods(&self) -> &[CsMethodId] {
        &self.reachable_order
    }

    /// The number of distinct call edges.
    pub fn num_call_edges(&self) -> usize {
        self.edge_keys.len()
    }

    /// Iterate over all call edges as `(caller, edge, callee)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (CsMethodId, &CallEdge, CsMethodId)> {
        self.graph
            .edge_references()
            .map(|edge| (self.graph[edge.source()], edge.weight(), self.graph[edge.target()]))
    }

    /// The call sites calling into the given context-qualified method, with their call kinds.
    pub fn callers_of(&self, callee: CsMethodId) -> Vec<(CsCallSiteId, CallKind)> {
        match self.nodes.get(&callee) {
            Some(&node) => self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|edge| (edge.weight().call_site, edge.weight().kind))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The callees the given context-qualified method calls into,
    /// as `(call site, kind, callee)` triples.
    pub fn callees_of(&self, caller: CsMethodId) -> Vec<(CsCallSiteId, CallKind, CsMethodId)> {
        match self.nodes.get(&caller) {
            Some(&node) => self
                .graph
                .edges_directed(node, Direction::Outgoing)
                .map(|edge| (edge.weight().call_site, edge.weight().kind, self.graph[edge.target()]))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The underlying graph, e.g. for connectivity queries.
    pub fn graph(&self) -> &DiGraph<CsMethodId, CallEdge> {
        &self.graph
    }

    /// The node index of a context-qualified method in the underlying graph.
    pub fn node_of(&self, method: CsMethodId) -> Option<NodeIndex> {
        self.nodes.get(&method).copied()
    }
}

impl Default for CsCallGraph {
    fn default() -> CsCallGraph {
        CsCallGraph::new()
    }
}
