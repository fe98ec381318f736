//! Taint analysis riding on top of the pointer analysis.
//!
//! Taint is modeled as synthetic abstract objects carrying the call site of the
//! source call that introduced them.
//! These objects are injected into the points-to sets of call results and
//! propagated by the ordinary pointer analysis machinery;
//! no separate propagation engine exists for taint.
//! The solver consults this module on every call-edge establishment
//! (for source and transfer rules)
//! and re-consults the transfer rules whenever an argument of an already
//! resolved call gains a taint object.
//! After the fixpoint, one pass over the final call graph collects every
//! tainted value arriving at a configured sink argument.

use crate::analysis::class_hierarchy::{ClassHierarchy, MethodId};
use crate::analysis::pointer_analysis::call_graph::CsCallGraph;
use crate::analysis::pointer_analysis::element::{
    CsCallSiteId, CsVarId, ElementManager, Obj, ObjId,
};
use crate::intermediate_representation::{MethodRef, Stmt, Tid};
use crate::prelude::*;
use crate::utils::log::LogMessage;
use fnv::{FnvHashMap, FnvHashSet};
use std::collections::BTreeSet;
use std::fmt;

pub mod config;

use config::{TaintConfig, TransferEndpoint};

const LOG_SOURCE: &str = "Taint Analysis";

/// A reported taint flow:
/// a value produced by the source call reaches the given argument of the sink call.
///
/// The derived ordering (source call first, then sink call, then argument index)
/// determines the order of the final report.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct TaintFlow {
    /// The call site of the source call.
    pub source_call: Tid,
    /// The call site of the sink call.
    pub sink_call: Tid,
    /// The zero-based index of the sink argument the tainted value arrived at.
    pub index: usize,
}

impl fmt::Display for TaintFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "taint flow from {} into argument {} of {}",
            self.source_call, self.index, self.sink_call
        )
    }
}

/// The resolved rule tables of one taint analysis run.
///
/// Rules are resolved against the class hierarchy once during construction;
/// afterwards all lookups are by method ID.
pub struct TaintAnalysis {
    sources: FnvHashMap<MethodId, String>,
    sinks: FnvHashSet<(MethodId, usize)>,
    transfers: FnvHashMap<(MethodId, TransferEndpoint, TransferEndpoint), String>,
}

impl TaintAnalysis {
    /// Resolve a rule configuration against the analyzed program.
    ///
    /// Rules naming methods the program does not contain can never take effect
    /// and are skipped with a warning;
    /// the same holds for source rules whose declared type does not match
    /// the return type of the source method.
    /// Structurally invalid rule files are rejected by
    /// [`TaintConfig::validate`] before this point.
    pub fn new(
        config: &TaintConfig,
        hierarchy: &ClassHierarchy,
    ) -> Result<(TaintAnalysis, Vec<LogMessage>), Error> {
        config.validate()?;
        let mut logs = Vec::new();
        let mut analysis = TaintAnalysis {
            sources: FnvHashMap::default(),
            sinks: FnvHashSet::default(),
            transfers: FnvHashMap::default(),
        };
        for source in &config.sources {
            let Some(method) = resolve_rule_method(hierarchy, &source.method, &mut logs) else {
                continue;
            };
            if hierarchy.method(method).term.return_type != source.data_type {
                logs.push(
                    LogMessage::new_error(format!(
                        "source rule for {} is ignored: declared type {} does not match the return type",
                        source.method, source.data_type
                    ))
                    .source(LOG_SOURCE),
                );
                continue;
            }
            analysis.sources.insert(method, source.data_type.clone());
        }
        for sink in &config.sinks {
            let Some(method) = resolve_rule_method(hierarchy, &sink.method, &mut logs) else {
                continue;
            };
            if sink.index >= hierarchy.method(method).term.param_types.len() {
                logs.push(
                    LogMessage::new_error(format!(
                        "sink rule for {} is ignored: argument index {} out of range",
                        sink.method, sink.index
                    ))
                    .source(LOG_SOURCE),
                );
                continue;
            }
            analysis.sinks.insert((method, sink.index));
        }
        for transfer in &config.transfers {
            let Some(method) = resolve_rule_method(hierarchy, &transfer.method, &mut logs) else {
                continue;
            };
            analysis.transfers.insert(
                (method, transfer.from.into(), transfer.to.into()),
                transfer.data_type.clone(),
            );
        }
        Ok((analysis, logs))
    }

    /// Check whether the callee of a freshly established call edge is a configured source.
    /// If so, return the taint object for this call site.
    pub fn check_source(
        &self,
        manager: &mut ElementManager,
        call_site: &Tid,
        callee: MethodId,
    ) -> Option<ObjId> {
        let data_type = self.sources.get(&callee)?;
        Some(manager.obj_id(Obj::Taint {
            source_call: call_site.clone(),
            data_type: data_type.clone(),
        }))
    }

    /// Evaluate the transfer rules of a call.
    ///
    /// Returns the taint objects to inject,
    /// together with the context-qualified variable each one flows into.
    /// The propagated taint preserves the provenance of the original taint object
    /// but takes the declared type of the matched rule.
    /// For calls without a receiver only argument-to-result rules can match.
    pub fn evaluate_transfers(
        &self,
        manager: &mut ElementManager,
        hierarchy: &ClassHierarchy,
        cs_call_site: CsCallSiteId,
        callee: MethodId,
        base: Option<CsVarId>,
    ) -> Vec<(CsVarId, ObjId)> {
        if self.transfers.is_empty() {
            return Vec::new();
        }
        let (caller_context, site) = manager.cs_call_site_parts(cs_call_site);
        let stmt = hierarchy.stmt(site);
        let Stmt::Call(call) = &stmt.term else {
            return Vec::new();
        };
        let result_var = call
            .result
            .map(|result| manager.cs_var(caller_context, hierarchy.var_id(site.method, result)));
        // Collected as (target variable, provenance, declared type) first;
        // the taint objects are interned afterwards, once the points-to reads are done.
        let mut pending: Vec<(CsVarId, Tid, String)> = Vec::new();
        if let Some(base_var) = base {
            if let Some(data_type) =
                self.transfers
                    .get(&(callee, TransferEndpoint::Base, TransferEndpoint::Result))
            {
                if let Some(result_var) = result_var {
                    for source_call in taint_provenances(manager, base_var) {
                        pending.push((result_var, source_call, data_type.clone()));
                    }
                }
            }
            for (index, &arg) in call.args.iter().enumerate() {
                if let Some(data_type) =
                    self.transfers
                        .get(&(callee, TransferEndpoint::Arg(index), TransferEndpoint::Base))
                {
                    let arg_var =
                        manager.cs_var(caller_context, hierarchy.var_id(site.method, arg));
                    for source_call in taint_provenances(manager, arg_var) {
                        pending.push((base_var, source_call, data_type.clone()));
                    }
                }
            }
        }
        if let Some(result_var) = result_var {
            for (index, &arg) in call.args.iter().enumerate() {
                if let Some(data_type) = self.transfers.get(&(
                    callee,
                    TransferEndpoint::Arg(index),
                    TransferEndpoint::Result,
                )) {
                    let arg_var =
                        manager.cs_var(caller_context, hierarchy.var_id(site.method, arg));
                    for source_call in taint_provenances(manager, arg_var) {
                        pending.push((result_var, source_call, data_type.clone()));
                    }
                }
            }
        }
        pending
            .into_iter()
            .map(|(target, source_call, data_type)| {
                let obj = manager.obj_id(Obj::Taint {
                    source_call,
                    data_type,
                });
                (target, obj)
            })
            .collect()
    }

    /// Collect all taint flows from the final analysis state:
    /// for every call edge into a method with a sink rule,
    /// every taint object in the points-to set of the observed argument
    /// yields one flow record.
    pub fn collect_flows(
        &self,
        hierarchy: &ClassHierarchy,
        manager: &ElementManager,
        call_graph: &CsCallGraph,
    ) -> BTreeSet<TaintFlow> {
        let mut flows = BTreeSet::new();
        if self.sinks.is_empty() {
            return flows;
        }
        for (_, edge, cs_callee) in call_graph.edges() {
            let (_, callee) = manager.cs_method_parts(cs_callee);
            let (_, site) = manager.cs_call_site_parts(edge.call_site);
            let stmt = hierarchy.stmt(site);
            let Stmt::Call(call) = &stmt.term else {
                continue;
            };
            for (index, &arg) in call.args.iter().enumerate() {
                if !self.sinks.contains(&(callee, index)) {
                    continue;
                }
                let arg_var = hierarchy.var_id(site.method, arg);
                for &cs_obj in manager.points_to_of_var(arg_var).iter() {
                    let (_, obj) = manager.cs_obj_parts(cs_obj);
                    if let Obj::Taint { source_call, .. } = manager.obj(obj) {
                        flows.insert(TaintFlow {
                            source_call: source_call.clone(),
                            sink_call: stmt.tid.clone(),
                            index,
                        });
                    }
                }
            }
        }
        flows
    }
}

/// Resolve the method named by a taint rule against the program.
/// Rules for methods the program does not contain are reported and skipped.
fn resolve_rule_method(
    hierarchy: &ClassHierarchy,
    method: &MethodRef,
    logs: &mut Vec<LogMessage>,
) -> Option<MethodId> {
    let resolved = hierarchy.resolve(method);
    if resolved.is_none() {
        logs.push(
            LogMessage::new_error(format!("taint rule for unknown method {method} is ignored"))
                .source(LOG_SOURCE),
        );
    }
    resolved
}

/// The provenances (source call sites) of all taint objects
/// in the points-to set of the given variable.
fn taint_provenances(manager: &mut ElementManager, var: CsVarId) -> Vec<Tid> {
    let pointer = manager.var_pointer(var);
    manager
        .points_to(pointer)
        .iter()
        .filter_map(|&cs_obj| {
            let (_, obj) = manager.cs_obj_parts(cs_obj);
            match manager.obj(obj) {
                Obj::Taint { source_call, .. } => Some(source_call.clone()),
                Obj::Alloc { .. } => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pointer_analysis::{run, Config};
    use crate::intermediate_representation::*;

    /// Builds a program shaped like
    /// `t = Net.read(); sb = new SB(); sb.append(t); r = sb.toString(); Db.exec(r);`
    /// plus a second, untainted value passed to the sink:
    /// `clean = new String(); Db.exec(clean);`
    fn taint_program() -> Program {
        let string = Class::mock("String");
        let mut net = Class::mock("Net");
        net.methods.push(Method::mock("read", &[], "String", true, None));
        let mut db = Class::mock("Db");
        db.methods.push(Method::mock("exec", &["String"], "void", true, None));
        let mut sb = Class::mock("SB");
        sb.methods.push(Method::mock("append", &["String"], "SB", false, None));
        sb.methods.push(Method::mock("toString", &[], "String", false, None));
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("t", "String"), ("sb", "SB"), ("r", "String"), ("clean", "String")],
                vec![
                    Term::mock(
                        "l_read",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Net", "read", &[], "String"),
                            receiver: None,
                            args: Vec::new(),
                            result: Some(0),
                        }),
                    ),
                    Term::mock("s_sb", Stmt::New { result: 1, class: "SB".to_string() }),
                    Term::mock(
                        "l_append",
                        Stmt::Call(Call {
                            kind: CallKind::Virtual,
                            callee: MethodRef::mock("SB", "append", &["String"], "SB"),
                            receiver: Some(1),
                            args: vec![0],
                            result: None,
                        }),
                    ),
                    Term::mock(
                        "l_tostring",
                        Stmt::Call(Call {
                            kind: CallKind::Virtual,
                            callee: MethodRef::mock("SB", "toString", &[], "String"),
                            receiver: Some(1),
                            args: Vec::new(),
                            result: Some(2),
                        }),
                    ),
                    Term::mock(
                        "l_sink",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Db", "exec", &["String"], "void"),
                            receiver: None,
                            args: vec![2],
                            result: None,
                        }),
                    ),
                    Term::mock("s_clean", Stmt::New { result: 3, class: "String".to_string() }),
                    Term::mock(
                        "l_sink2",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Db", "exec", &["String"], "void"),
                            receiver: None,
                            args: vec![3],
                            result: None,
                        }),
                    ),
                ],
            )),
        ));
        Program::mock(
            vec![string, net, db, sb, main],
            MethodRef::mock("Main", "main", &[], "void"),
        )
    }

    fn rules() -> TaintConfig {
        serde_json::from_str(
            r#"
            {
                "sources": [
                    { "method": { "class": "Net", "name": "read", "param_types": [], "return_type": "String" },
                      "type": "String" }
                ],
                "sinks": [
                    { "method": { "class": "Db", "name": "exec", "param_types": ["String"], "return_type": "void" },
                      "index": 0 }
                ],
                "transfers": [
                    { "method": { "class": "SB", "name": "append", "param_types": ["String"], "return_type": "SB" },
                      "from": 0, "to": "base", "type": "SB" },
                    { "method": { "class": "SB", "name": "toString", "param_types": [], "return_type": "String" },
                      "from": "base", "to": "result", "type": "String" }
                ]
            }"#,
        )
        .unwrap()
    }

    /// A value flowing directly from a source call into a sink argument
    /// yields exactly one flow record.
    #[test]
    fn direct_source_to_sink() {
        let string = Class::mock("String");
        let mut net = Class::mock("Net");
        net.methods.push(Method::mock("read", &[], "String", true, None));
        let mut db = Class::mock("Db");
        db.methods.push(Method::mock("exec", &["String"], "void", true, None));
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("t", "String")],
                vec![
                    Term::mock(
                        "l_read",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Net", "read", &[], "String"),
                            receiver: None,
                            args: Vec::new(),
                            result: Some(0),
                        }),
                    ),
                    Term::mock(
                        "l_sink",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Db", "exec", &["String"], "void"),
                            receiver: None,
                            args: vec![0],
                            result: None,
                        }),
                    ),
                ],
            )),
        ));
        let program = Program::mock(
            vec![string, net, db, main],
            MethodRef::mock("Main", "main", &[], "void"),
        );
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let rules: TaintConfig = serde_json::from_str(
            r#"
            {
                "sources": [
                    { "method": { "class": "Net", "name": "read", "param_types": [], "return_type": "String" },
                      "type": "String" }
                ],
                "sinks": [
                    { "method": { "class": "Db", "name": "exec", "param_types": ["String"], "return_type": "void" },
                      "index": 0 }
                ]
            }"#,
        )
        .unwrap();
        let (taint, logs) = TaintAnalysis::new(&rules, &hierarchy).unwrap();
        assert!(logs.is_empty());
        let results = run(&hierarchy, &Config::default(), Some(&taint)).unwrap();
        let flows: Vec<&TaintFlow> = results.taint_flows().iter().collect();
        assert_eq!(
            flows,
            vec![&TaintFlow {
                source_call: Tid::new("l_read"),
                sink_call: Tid::new("l_sink"),
                index: 0
            }]
        );
    }

    /// Taint travels through an arg-to-base transfer followed by a
    /// base-to-result transfer, although no rule connects the
    /// `append` argument to the `toString` result directly.
    #[test]
    fn transfer_through_receiver() {
        let program = taint_program();
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let (taint, logs) = TaintAnalysis::new(&rules(), &hierarchy).unwrap();
        assert!(logs.is_empty());
        let results = run(&hierarchy, &Config::default(), Some(&taint)).unwrap();
        let flows: Vec<&TaintFlow> = results.taint_flows().iter().collect();
        // Only the flow through the string builder is reported;
        // the clean value at `l_sink2` produces no record.
        assert_eq!(
            flows,
            vec![&TaintFlow {
                source_call: Tid::new("l_read"),
                sink_call: Tid::new("l_sink"),
                index: 0
            }]
        );
    }

    /// An arg-to-result transfer taints the call result directly.
    #[test]
    fn transfer_from_argument_to_result() {
        let string = Class::mock("String");
        let mut net = Class::mock("Net");
        net.methods.push(Method::mock("read", &[], "String", true, None));
        let mut db = Class::mock("Db");
        db.methods.push(Method::mock("exec", &["String"], "void", true, None));
        let mut util = Class::mock("Util");
        util.methods
            .push(Method::mock("concat", &["String"], "String", true, None));
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("t", "String"), ("r", "String")],
                vec![
                    Term::mock(
                        "l_read",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Net", "read", &[], "String"),
                            receiver: None,
                            args: Vec::new(),
                            result: Some(0),
                        }),
                    ),
                    Term::mock(
                        "l_concat",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Util", "concat", &["String"], "String"),
                            receiver: None,
                            args: vec![0],
                            result: Some(1),
                        }),
                    ),
                    Term::mock(
                        "l_sink",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Db", "exec", &["String"], "void"),
                            receiver: None,
                            args: vec![1],
                            result: None,
                        }),
                    ),
                ],
            )),
        ));
        let program = Program::mock(
            vec![string, net, db, util, main],
            MethodRef::mock("Main", "main", &[], "void"),
        );
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let rules: TaintConfig = serde_json::from_str(
            r#"
            {
                "sources": [
                    { "method": { "class": "Net", "name": "read", "param_types": [], "return_type": "String" },
                      "type": "String" }
                ],
                "sinks": [
                    { "method": { "class": "Db", "name": "exec", "param_types": ["String"], "return_type": "void" },
                      "index": 0 }
                ],
                "transfers": [
                    { "method": { "class": "Util", "name": "concat", "param_types": ["String"], "return_type": "String" },
                      "from": 0, "to": "result", "type": "String" }
                ]
            }"#,
        )
        .unwrap();
        let (taint, _) = TaintAnalysis::new(&rules, &hierarchy).unwrap();
        let results = run(&hierarchy, &Config::default(), Some(&taint)).unwrap();
        assert_eq!(results.taint_flows().len(), 1);
        let flow = results.taint_flows().iter().next().unwrap();
        assert_eq!(flow.source_call, Tid::new("l_read"));
        assert_eq!(flow.sink_call, Tid::new("l_sink"));
    }

    /// Rules naming unknown methods or mismatching types are skipped with warnings,
    /// not fatal errors.
    #[test]
    fn unresolvable_rules_are_skipped() {
        let program = taint_program();
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let rules: TaintConfig = serde_json::from_str(
            r#"
            {
                "sources": [
                    { "method": { "class": "Ghost", "name": "read", "param_types": [], "return_type": "String" },
                      "type": "String" },
                    { "method": { "class": "Net", "name": "read", "param_types": [], "return_type": "String" },
                      "type": "Mismatch" }
                ],
                "sinks": [
                    { "method": { "class": "Db", "name": "exec", "param_types": ["String"], "return_type": "void" },
                      "index": 5 }
                ]
            }"#,
        )
        .unwrap();
        let (taint, logs) = TaintAnalysis::new(&rules, &hierarchy).unwrap();
        assert_eq!(logs.len(), 3);
        let results = run(&hierarchy, &Config::default(), Some(&taint)).unwrap();
        assert!(results.taint_flows().is_empty());
    }
}
