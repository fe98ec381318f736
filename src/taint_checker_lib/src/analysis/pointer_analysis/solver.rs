//! The fixpoint solver of the pointer analysis.
//!
//! The solver owns all mutable analysis state of one session:
//! the element manager, the pointer flow graph, the call graph and the work list.
//! Statement processing, propagation and call resolution are plain methods
//! mutually recursing over this shared state;
//! the whole computation is synchronous and single-threaded
//! and runs to completion inside one [`Solver::solve`] call.
//!
//! The algorithm is the classic inclusion-based (Andersen-style) fixpoint:
//! allocation statements seed the work list,
//! draining an entry propagates objects into a pointer's points-to set,
//! and every newly arriving object at a variable wires up the field/array accesses
//! and call sites of that variable,
//! which in turn may discover new reachable methods and new work list entries.
//! All involved structures grow monotonically over finite domains,
//! so the loop terminates for every selector producing finitely many contexts.

use super::call_graph::CsCallGraph;
use super::context::{Context, ContextSelector};
use super::element::{
    ContextId, CsCallSiteId, CsMethodId, CsObjId, CsVarId, ElementManager, Obj, Pointer, PointerId,
};
use super::pointer_flow_graph::PointerFlowGraph;
use super::points_to_set::PointsToSet;
use super::work_list::WorkList;
use super::PointerAnalysis;
use crate::analysis::class_hierarchy::{ClassHierarchy, MethodId, StmtRef};
use crate::analysis::taint::TaintAnalysis;
use crate::intermediate_representation::{CallKind, Stmt, Term};
use crate::prelude::*;
use crate::utils::log::LogMessage;
use std::collections::BTreeSet;

const LOG_SOURCE: &str = "Pointer Analysis";

/// The state of one analysis session.
/// Create it with [`Solver::new`] and consume it with [`Solver::solve`].
pub struct Solver<'a, 's> {
    hierarchy: &'a ClassHierarchy<'a>,
    selector: &'s dyn ContextSelector,
    taint: Option<&'a TaintAnalysis>,
    manager: ElementManager,
    pfg: PointerFlowGraph,
    call_graph: CsCallGraph,
    work_list: WorkList,
    logs: Vec<LogMessage>,
}

impl<'a, 's> Solver<'a, 's> {
    /// Create a solver for the given program view and context selection policy.
    /// If a taint analysis is given, its rules are evaluated during the fixpoint
    /// and its flows collected afterwards.
    pub fn new(
        hierarchy: &'a ClassHierarchy<'a>,
        selector: &'s dyn ContextSelector,
        taint: Option<&'a TaintAnalysis>,
    ) -> Solver<'a, 's> {
        Solver {
            hierarchy,
            selector,
            taint,
            manager: ElementManager::new(),
            pfg: PointerFlowGraph::new(),
            call_graph: CsCallGraph::new(),
            work_list: WorkList::new(),
            logs: Vec::new(),
        }
    }

    /// Run the analysis to completion and return its results.
    pub fn solve(mut self) -> Result<PointerAnalysis<'a>, Error> {
        self.initialize()?;
        self.analyze();
        let taint_flows = match self.taint {
            Some(taint) => taint.collect_flows(self.hierarchy, &self.manager, &self.call_graph),
            None => BTreeSet::new(),
        };
        self.logs.push(
            LogMessage::new_info(format!(
                "fixpoint reached: {} reachable methods, {} call edges, {} pointers, {} objects, {} contexts",
                self.call_graph.reachable_methods().len(),
                self.call_graph.num_call_edges(),
                self.manager.num_pointers(),
                self.manager.num_objects(),
                self.manager.num_contexts(),
            ))
            .source(LOG_SOURCE),
        );
        Ok(PointerAnalysis::new(
            self.manager,
            self.call_graph,
            self.hierarchy,
            taint_flows,
            self.logs,
        ))
    }

    /// Mark the entry method reachable under the empty context.
    /// This is the single boundary condition of the fixpoint;
    /// every other fact is derived by propagation.
    fn initialize(&mut self) -> Result<(), Error> {
        let entry = self.hierarchy.entry_method()?;
        let empty = self.manager.context_id(Context::empty());
        let cs_entry = self.manager.cs_method(empty, entry);
        self.call_graph.set_entry(cs_entry);
        self.add_reachable(cs_entry);
        Ok(())
    }

    /// Mark a context-qualified method as reachable and,
    /// if it was not reachable before, process all statements of its body.
    fn add_reachable(&mut self, cs_method: CsMethodId) {
        if !self.call_graph.add_reachable(cs_method) {
            return;
        }
        let hierarchy = self.hierarchy;
        let (context, method) = self.manager.cs_method_parts(cs_method);
        if let Some(body) = hierarchy.method_body(method) {
            for (index, stmt) in body.stmts.iter().enumerate() {
                self.process_stmt(context, method, index, stmt);
            }
        }
    }

    /// Process a single statement of a newly reachable method.
    ///
    /// Only statements whose effect does not depend on points-to information
    /// are handled here: allocations, copies, static field accesses and static calls.
    /// Instance field/array accesses and receiver-based calls are deferred
    /// until objects arrive at their base variable during propagation.
    fn process_stmt(&mut self, context: ContextId, method: MethodId, index: usize, stmt: &Term<Stmt>) {
        let hierarchy = self.hierarchy;
        match &stmt.term {
            Stmt::New { result, class } => {
                let obj = self.manager.obj_id(Obj::Alloc {
                    site: stmt.tid.clone(),
                    class: class.clone(),
                });
                let heap_context = self
                    .selector
                    .select_heap_context(self.manager.context(context), &stmt.tid);
                let heap_context = self.manager.context_id(heap_context);
                let cs_obj = self.manager.cs_obj(heap_context, obj);
                let pointer = self.local_pointer(context, method, *result);
                self.work_list.add_entry(pointer, PointsToSet::singleton(cs_obj));
            }
            Stmt::Copy { result, value } => {
                let source = self.local_pointer(context, method, *value);
                let target = self.local_pointer(context, method, *result);
                self.add_pfg_edge(source, target);
            }
            Stmt::StoreStatic { field, value } => {
                let field = self.manager.field_id(field.clone());
                let source = self.local_pointer(context, method, *value);
                let target = self.manager.static_field_pointer(field);
                self.add_pfg_edge(source, target);
            }
            Stmt::LoadStatic { result, field } => {
                let field = self.manager.field_id(field.clone());
                let source = self.manager.static_field_pointer(field);
                let target = self.local_pointer(context, method, *result);
                self.add_pfg_edge(source, target);
            }
            Stmt::Call(call) => {
                if call.kind == CallKind::Static {
                    let site = StmtRef { method, index };
                    let cs_call_site = self.manager.cs_call_site(context, site);
                    match hierarchy.resolve(&call.callee) {
                        Some(callee) => {
                            let callee_context = self.selector.select_call_context(
                                self.manager.context(context),
                                &stmt.tid,
                                callee,
                            );
                            let callee_context = self.manager.context_id(callee_context);
                            let cs_callee = self.manager.cs_method(callee_context, callee);
                            self.process_call_edge(cs_call_site, cs_callee, CallKind::Static);
                            self.transfer_taint(cs_call_site, callee, None);
                        }
                        None => self.logs.push(
                            LogMessage::new_debug(format!(
                                "call {} has no resolvable target {}",
                                stmt.tid, call.callee
                            ))
                            .source(LOG_SOURCE),
                        ),
                    }
                } else if call.receiver.is_none() {
                    self.logs.push(
                        LogMessage::new_debug(format!(
                            "skipping receiverless {} call {}",
                            call.kind, stmt.tid
                        ))
                        .source(LOG_SOURCE),
                    );
                }
                // Receiver-based calls are resolved once receiver objects are known.
            }
            Stmt::LoadField { .. }
            | Stmt::StoreField { .. }
            | Stmt::LoadArray { .. }
            | Stmt::StoreArray { .. } => (),
        }
    }

    /// Get the pointer of a method-local variable under the given context.
    fn local_pointer(
        &mut self,
        context: ContextId,
        method: MethodId,
        local: usize,
    ) -> PointerId {
        let var = self.hierarchy.var_id(method, local);
        let cs_var = self.manager.cs_var(context, var);
        self.manager.var_pointer(cs_var)
    }

    /// Add an edge to the pointer flow graph.
    /// A newly inserted edge must retroactively propagate
    /// whatever already flowed into its source,
    /// so the target is seeded with the source's current points-to set.
    fn add_pfg_edge(&mut self, source: PointerId, target: PointerId) {
        if self.pfg.add_edge(source, target) {
            let points_to = self.manager.points_to(source);
            if !points_to.is_empty() {
                let points_to = points_to.clone();
                self.work_list.add_entry(target, points_to);
            }
        }
    }

    /// The main fixpoint loop: drain the work list until it is empty.
    fn analyze(&mut self) {
        while let Some((pointer, points_to_set)) = self.work_list.poll_entry() {
            let delta = self.propagate(pointer, &points_to_set);
            if delta.is_empty() {
                continue;
            }
            let Pointer::Var(cs_var) = *self.manager.pointer(pointer) else {
                continue;
            };
            let hierarchy = self.hierarchy;
            let (context, var) = self.manager.cs_var_parts(cs_var);
            let (method, _) = hierarchy.var_parts(var);
            let access = hierarchy.var_access(var);
            for &cs_obj in delta.iter() {
                for &index in &access.field_stores {
                    let stmt = hierarchy.stmt(StmtRef { method, index });
                    if let Stmt::StoreField { field, value, .. } = &stmt.term {
                        let field = self.manager.field_id(field.clone());
                        let source = self.local_pointer(context, method, *value);
                        let target = self.manager.instance_field_pointer(cs_obj, field);
                        self.add_pfg_edge(source, target);
                    }
                }
                for &index in &access.field_loads {
                    let stmt = hierarchy.stmt(StmtRef { method, index });
                    if let Stmt::LoadField { result, field, .. } = &stmt.term {
                        let field = self.manager.field_id(field.clone());
                        let source = self.manager.instance_field_pointer(cs_obj, field);
                        let target = self.local_pointer(context, method, *result);
                        self.add_pfg_edge(source, target);
                    }
                }
                for &index in &access.array_stores {
                    let stmt = hierarchy.stmt(StmtRef { method, index });
                    if let Stmt::StoreArray { value, .. } = &stmt.term {
                        let source = self.local_pointer(context, method, *value);
                        let target = self.manager.array_pointer(cs_obj);
                        self.add_pfg_edge(source, target);
                    }
                }
                for &index in &access.array_loads {
                    let stmt = hierarchy.stmt(StmtRef { method, index });
                    if let Stmt::LoadArray { result, .. } = &stmt.term {
                        let source = self.manager.array_pointer(cs_obj);
                        let target = self.local_pointer(context, method, *result);
                        self.add_pfg_edge(source, target);
                    }
                }
                for &index in &access.invokes {
                    self.process_call(context, cs_var, cs_obj, StmtRef { method, index });
                }
                if self.taint.is_some() {
                    let (_, obj) = self.manager.cs_obj_parts(cs_obj);
                    if self.manager.obj(obj).is_taint() {
                        // A taint object arriving at an argument variable after the
                        // call edges were already established must still trigger
                        // the transfer rules of those calls.
                        for &index in &access.arg_invokes {
                            self.retransfer_taint(context, StmtRef { method, index });
                        }
                    }
                }
            }
        }
    }

    /// Merge an incoming points-to set into a pointer's set
    /// and return the objects that were genuinely new to the pointer.
    /// If anything was new, all successors of the pointer are re-seeded
    /// with the whole incoming set;
    /// downstream set union is idempotent, so this over-approximation is harmless.
    fn propagate(&mut self, pointer: PointerId, incoming: &PointsToSet) -> PointsToSet {
        let mut delta = PointsToSet::new();
        let points_to = self.manager.points_to_mut(pointer);
        for &obj in incoming.iter() {
            if points_to.insert(obj) {
                delta.insert(obj);
            }
        }
        if !delta.is_empty() {
            let successors: Vec<PointerId> = self.pfg.successors(pointer).collect();
            for successor in successors {
                self.work_list.add_entry(successor, incoming.clone());
            }
        }
        delta
    }

    /// Resolve the call sites with the given receiver variable
    /// against a newly discovered receiver object.
    fn process_call(
        &mut self,
        context: ContextId,
        receiver: CsVarId,
        receiver_obj: CsObjId,
        site: StmtRef,
    ) {
        let hierarchy = self.hierarchy;
        let stmt = hierarchy.stmt(site);
        let Stmt::Call(call) = &stmt.term else {
            return;
        };
        let (receiver_context, obj) = self.manager.cs_obj_parts(receiver_obj);
        let obj_data = self.manager.obj(obj).clone();
        let callee = match call.kind {
            CallKind::Special => hierarchy.resolve(&call.callee),
            _ => hierarchy.dispatch(obj_data.class_name(), &call.callee),
        };
        let Some(callee) = callee else {
            self.logs.push(
                LogMessage::new_debug(format!(
                    "call {} has no dispatch target on receiver type {}",
                    stmt.tid,
                    obj_data.class_name()
                ))
                .source(LOG_SOURCE),
            );
            return;
        };
        let cs_call_site = self.manager.cs_call_site(context, site);
        let callee_context = self.selector.select_receiver_context(
            self.manager.context(context),
            &stmt.tid,
            self.manager.context(receiver_context),
            &obj_data,
            callee,
        );
        let callee_context = self.manager.context_id(callee_context);
        // Bind the implicit receiver parameter of the callee.
        if let Some(body) = hierarchy.method_body(callee) {
            if let Some(this) = body.this_var {
                let pointer = self.local_pointer(callee_context, callee, this);
                self.work_list
                    .add_entry(pointer, PointsToSet::singleton(receiver_obj));
            }
        }
        let cs_callee = self.manager.cs_method(callee_context, callee);
        self.process_call_edge(cs_call_site, cs_callee, call.kind);
        self.transfer_taint(cs_call_site, callee, Some(receiver));
    }

    /// Shared call-edge handling for static and receiver-based calls.
    ///
    /// The taint source check runs on every call-edge establishment.
    /// The call graph edge itself is inserted at most once;
    /// only its first insertion expands reachability
    /// and wires the actual arguments to the formal parameters
    /// and the return variables to the call site result.
    fn process_call_edge(
        &mut self,
        cs_call_site: CsCallSiteId,
        cs_callee: CsMethodId,
        kind: CallKind,
    ) {
        let hierarchy = self.hierarchy;
        let (caller_context, site) = self.manager.cs_call_site_parts(cs_call_site);
        let (callee_context, callee) = self.manager.cs_method_parts(cs_callee);
        let stmt = hierarchy.stmt(site);
        let Stmt::Call(call) = &stmt.term else {
            panic!("call edge does not originate from a call statement");
        };
        if let Some(taint) = self.taint {
            if let Some(result) = call.result {
                if let Some(taint_obj) = taint.check_source(&mut self.manager, &stmt.tid, callee) {
                    let empty = self.manager.context_id(Context::empty());
                    let cs_taint = self.manager.cs_obj(empty, taint_obj);
                    let pointer = self.local_pointer(caller_context, site.method, result);
                    self.work_list
                        .add_entry(pointer, PointsToSet::singleton(cs_taint));
                }
            }
        }
        let caller = self.manager.cs_method(caller_context, site.method);
        if !self.call_graph.add_edge(caller, cs_call_site, cs_callee, kind) {
            return;
        }
        self.add_reachable(cs_callee);
        if let Some(body) = hierarchy.method_body(callee) {
            for (&argument, &parameter) in call.args.iter().zip(body.param_vars.iter()) {
                let source = self.local_pointer(caller_context, site.method, argument);
                let target = self.local_pointer(callee_context, callee, parameter);
                self.add_pfg_edge(source, target);
            }
            if let Some(result) = call.result {
                let target = self.local_pointer(caller_context, site.method, result);
                for &ret in &body.return_vars {
                    let source = self.local_pointer(callee_context, callee, ret);
                    self.add_pfg_edge(source, target);
                }
            }
        }
    }

    /// Evaluate the taint transfer rules of a call and
    /// inject the resulting taint objects into the work list.
    fn transfer_taint(
        &mut self,
        cs_call_site: CsCallSiteId,
        callee: MethodId,
        base: Option<CsVarId>,
    ) {
        let Some(taint) = self.taint else {
            return;
        };
        let additions =
            taint.evaluate_transfers(&mut self.manager, self.hierarchy, cs_call_site, callee, base);
        for (cs_var, obj) in additions {
            let empty = self.manager.context_id(Context::empty());
            let cs_obj = self.manager.cs_obj(empty, obj);
            let pointer = self.manager.var_pointer(cs_var);
            self.work_list
                .add_entry(pointer, PointsToSet::singleton(cs_obj));
        }
    }

    /// Re-run the taint transfer rules of a call site
    /// after one of its argument variables gained a taint object.
    fn retransfer_taint(&mut self, context: ContextId, site: StmtRef) {
        let hierarchy = self.hierarchy;
        let stmt = hierarchy.stmt(site);
        let Stmt::Call(call) = &stmt.term else {
            return;
        };
        let cs_call_site = self.manager.cs_call_site(context, site);
        match (call.kind, call.receiver) {
            (CallKind::Static, _) => {
                if let Some(callee) = hierarchy.resolve(&call.callee) {
                    self.transfer_taint(cs_call_site, callee, None);
                }
            }
            (_, Some(receiver)) => {
                let receiver_var = hierarchy.var_id(site.method, receiver);
                let cs_receiver = self.manager.cs_var(context, receiver_var);
                let pointer = self.manager.var_pointer(cs_receiver);
                let receiver_objs: Vec<CsObjId> =
                    self.manager.points_to(pointer).iter().copied().collect();
                for cs_obj in receiver_objs {
                    let (_, obj) = self.manager.cs_obj_parts(cs_obj);
                    let class = self.manager.obj(obj).class_name().to_string();
                    let callee = match call.kind {
                        CallKind::Special => hierarchy.resolve(&call.callee),
                        _ => hierarchy.dispatch(&class, &call.callee),
                    };
                    if let Some(callee) = callee {
                        self.transfer_taint(cs_call_site, callee, Some(cs_receiver));
                    }
                }
            }
            _ => (),
        }
    }
}
