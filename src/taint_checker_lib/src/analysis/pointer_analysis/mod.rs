//! A context-sensitive, inclusion-based whole-program pointer analysis
//! with on-the-fly call graph construction.
//!
//! The analysis answers, for every variable and heap field of the analyzed program,
//! which abstract objects it may point to at runtime,
//! and resolves virtual calls against that information rather than against static types.
//! Reachable code is discovered incrementally:
//! a method becomes part of the analyzed world only once a call edge into it is found,
//! and call edges are found only once objects reach the receiver variable of a call site.
//!
//! Precision is controlled by a single policy object, the
//! [`ContextSelector`](context::ContextSelector):
//! the same solver yields context-insensitive analysis, k-CFA or k-object-sensitivity
//! depending on the configured selector.
//!
//! See the `Config` struct for the configurable analysis parameters.

use crate::analysis::class_hierarchy::{ClassHierarchy, VarId};
use crate::analysis::taint::{TaintAnalysis, TaintFlow};
use crate::prelude::*;
use crate::utils::log::LogMessage;
use std::collections::BTreeSet;

pub mod call_graph;
pub mod context;
pub mod element;
pub mod pointer_flow_graph;
pub mod points_to_set;
pub mod work_list;

mod solver;
pub use solver::Solver;

use call_graph::CsCallGraph;
use context::ContextSelector;
use element::{ContextId, CsVarId, ElementManager, PointerId};
use points_to_set::PointsToSet;

/// Configurable parameters of the analysis.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Config {
    /// The context sensitivity policy:
    /// `insensitive`, `<k>-call` (k-CFA) or `<k>-obj` (k-object-sensitivity).
    pub context: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            context: "2-call".to_string(),
        }
    }
}

impl Config {
    /// Create the context selector for the configured policy.
    /// Unknown policy names are a fatal configuration error.
    pub fn create_selector(&self) -> Result<Box<dyn ContextSelector>, Error> {
        context::parse_selector(&self.context)
    }
}

/// The results of one analysis run.
///
/// Provides the final call graph,
/// points-to queries per context-qualified or uncontextualized variable,
/// and the taint-flow report if a taint analysis was attached to the run.
pub struct PointerAnalysis<'a> {
    hierarchy: &'a ClassHierarchy<'a>,
    manager: ElementManager,
    call_graph: CsCallGraph,
    taint_flows: BTreeSet<TaintFlow>,
    logs: Vec<LogMessage>,
}

/// Run the pointer analysis on the given program view.
///
/// If a taint analysis is given,
/// its source and transfer rules are evaluated during the fixpoint
/// and the returned results carry the collected taint flows.
pub fn run<'a>(
    hierarchy: &'a ClassHierarchy<'a>,
    config: &Config,
    taint: Option<&'a TaintAnalysis>,
) -> Result<PointerAnalysis<'a>, Error> {
    let selector = config.create_selector()?;
    Solver::new(hierarchy, selector.as_ref(), taint).solve()
}

impl<'a> PointerAnalysis<'a> {
    pub(crate) fn new(
        manager: ElementManager,
        call_graph: CsCallGraph,
        hierarchy: &'a ClassHierarchy<'a>,
        taint_flows: BTreeSet<TaintFlow>,
        logs: Vec<LogMessage>,
    ) -> PointerAnalysis<'a> {
        PointerAnalysis {
            hierarchy,
            manager,
            call_graph,
            taint_flows,
            logs,
        }
    }

    /// The program view the analysis ran on.
    pub fn hierarchy(&self) -> &'a ClassHierarchy<'a> {
        self.hierarchy
    }

    /// The element manager holding all interned elements and points-to sets.
    pub fn manager(&self) -> &ElementManager {
        &self.manager
    }

    /// The final context-sensitive call graph.
    pub fn call_graph(&self) -> &CsCallGraph {
        &self.call_graph
    }

    /// The collected taint flows, ordered by source call, sink call and argument index.
    pub fn taint_flows(&self) -> &BTreeSet<TaintFlow> {
        &self.taint_flows
    }

    /// The log messages generated during the analysis.
    pub fn logs(&self) -> &[LogMessage] {
        &self.logs
    }

    /// The points-to set of a variable under a specific context,
    /// if the analysis created that context-qualified variable.
    pub fn points_to(&self, context: ContextId, var: VarId) -> Option<&PointsToSet> {
        let cs_var = self.manager.find_cs_var(context, var)?;
        self.points_to_of_cs_var(cs_var)
    }

    /// The points-to set of a context-qualified variable.
    pub fn points_to_of_cs_var(&self, cs_var: CsVarId) -> Option<&PointsToSet> {
        let pointer: PointerId = self.manager.find_var_pointer(cs_var)?;
        Some(self.manager.points_to(pointer))
    }

    /// The points-to set of an uncontextualized variable:
    /// the union over all contexts the variable was analyzed under.
    pub fn points_to_of_var(&self, var: VarId) -> PointsToSet {
        self.manager.points_to_of_var(var)
    }
}

#[cfg(test)]
mod tests {
    use super::element::Obj;
    use super::*;
    use crate::analysis::class_hierarchy::MethodId;
    use crate::intermediate_representation::*;
    use petgraph::algo::has_path_connecting;

    fn analyze<'a>(
        hierarchy: &'a ClassHierarchy<'a>,
        context: &str,
    ) -> PointerAnalysis<'a> {
        let config = Config {
            context: context.to_string(),
        };
        run(hierarchy, &config, None).unwrap()
    }

    /// The class names of the allocation sites in the points-to set of a variable.
    fn pointee_classes(results: &PointerAnalysis, var: VarId) -> Vec<String> {
        results
            .points_to_of_var(var)
            .iter()
            .map(|&cs_obj| {
                let (_, obj) = results.manager().cs_obj_parts(cs_obj);
                results.manager().obj(obj).class_name().to_string()
            })
            .collect()
    }

    fn entry_var(hierarchy: &ClassHierarchy, name: &str) -> VarId {
        let entry = hierarchy.entry_method().unwrap();
        hierarchy.find_var(entry, name).unwrap()
    }

    /// `a = new A(); b = a; b.f = new B();` under a context-insensitive selector:
    /// `a` and `b` point to the `A`-object and field `f` of that object points to the `B`-object.
    #[test]
    fn static_allocation_chain() {
        let mut class_a = Class::mock("A");
        class_a.methods.push(Method::mock("m", &[], "void", false, None));
        let class_b = Class::mock("B");
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("a", "A"), ("b", "A"), ("tmp", "B"), ("r", "B")],
                vec![
                    Term::mock("s1", Stmt::New { result: 0, class: "A".to_string() }),
                    Term::mock("s2", Stmt::Copy { result: 1, value: 0 }),
                    Term::mock("s3", Stmt::New { result: 2, class: "B".to_string() }),
                    Term::mock(
                        "s4",
                        Stmt::StoreField {
                            base: 1,
                            field: FieldRef::mock("A", "f"),
                            value: 2,
                        },
                    ),
                    Term::mock(
                        "s5",
                        Stmt::LoadField {
                            result: 3,
                            base: 0,
                            field: FieldRef::mock("A", "f"),
                        },
                    ),
                ],
            )),
        ));
        let program = Program::mock(
            vec![class_a, class_b, main],
            MethodRef::mock("Main", "main", &[], "void"),
        );
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let results = analyze(&hierarchy, "insensitive");
        assert_eq!(pointee_classes(&results, entry_var(&hierarchy, "a")), vec!["A"]);
        assert_eq!(pointee_classes(&results, entry_var(&hierarchy, "b")), vec!["A"]);
        // The store through the alias `b` is visible through the load from `a`.
        assert_eq!(pointee_classes(&results, entry_var(&hierarchy, "r")), vec!["B"]);
        // Both accesses went through the same instance-field slot of the `A`-object.
        let field_pointers = results
            .manager()
            .iter_pointers()
            .filter(|(_, pointer)| matches!(pointer, element::Pointer::InstanceField(..)))
            .count();
        assert_eq!(field_pointers, 1);
    }

    /// A variable statically typed `Base` holding only `Derived` objects
    /// must resolve calls to the override of `Derived`, never to `Base`'s method.
    #[test]
    fn virtual_dispatch_follows_points_to_types() {
        let mut base = Class::mock("Base");
        base.methods.push(Method::mock(
            "m",
            &[],
            "void",
            false,
            Some(MethodBody {
                variables: vec![Variable::mock("this", "Base")],
                this_var: Some(0),
                param_vars: Vec::new(),
                return_vars: Vec::new(),
                stmts: Vec::new(),
            }),
        ));
        let mut derived = Class::mock("Derived");
        derived.superclass = Some("Base".to_string());
        derived.methods.push(Method::mock(
            "m",
            &[],
            "void",
            false,
            Some(MethodBody {
                variables: vec![Variable::mock("this", "Derived")],
                this_var: Some(0),
                param_vars: Vec::new(),
                return_vars: Vec::new(),
                stmts: Vec::new(),
            }),
        ));
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("x", "Base")],
                vec![
                    Term::mock("s1", Stmt::New { result: 0, class: "Derived".to_string() }),
                    Term::mock(
                        "l1",
                        Stmt::Call(Call {
                            kind: CallKind::Virtual,
                            callee: MethodRef::mock("Base", "m", &[], "void"),
                            receiver: Some(0),
                            args: Vec::new(),
                            result: None,
                        }),
                    ),
                ],
            )),
        ));
        let program = Program::mock(
            vec![base, derived, main],
            MethodRef::mock("Main", "main", &[], "void"),
        );
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let results = analyze(&hierarchy, "insensitive");
        let derived_m = hierarchy
            .find_declared_method(hierarchy.class_id("Derived").unwrap(), "m", &[])
            .unwrap();
        let base_m = hierarchy
            .find_declared_method(hierarchy.class_id("Base").unwrap(), "m", &[])
            .unwrap();
        let callee_methods: Vec<MethodId> = results
            .call_graph()
            .edges()
            .map(|(_, _, callee)| results.manager().cs_method_parts(callee).1)
            .collect();
        assert!(callee_methods.contains(&derived_m));
        assert!(!callee_methods.contains(&base_m));
        // The receiver object is bound to the `this` variable of the override.
        let this_var = hierarchy.find_var(derived_m, "this").unwrap();
        assert_eq!(pointee_classes(&results, this_var), vec!["Derived"]);
    }

    /// Builds `Main` with
    /// `a = new A(); b = new B(); x = id(a); y = id(b);`
    /// where `id` is a static identity method.
    fn two_site_identity_program() -> Program {
        let class_a = Class::mock("A");
        let class_b = Class::mock("B");
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("a", "A"), ("b", "B"), ("x", "Object"), ("y", "Object")],
                vec![
                    Term::mock("s1", Stmt::New { result: 0, class: "A".to_string() }),
                    Term::mock("s2", Stmt::New { result: 1, class: "B".to_string() }),
                    Term::mock(
                        "l1",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Main", "id", &["Object"], "Object"),
                            receiver: None,
                            args: vec![0],
                            result: Some(2),
                        }),
                    ),
                    Term::mock(
                        "l2",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Main", "id", &["Object"], "Object"),
                            receiver: None,
                            args: vec![1],
                            result: Some(3),
                        }),
                    ),
                ],
            )),
        ));
        main.methods.push(Method::mock(
            "id",
            &["Object"],
            "Object",
            true,
            Some(MethodBody {
                variables: vec![Variable::mock("p", "Object")],
                this_var: None,
                param_vars: vec![0],
                return_vars: vec![0],
                stmts: Vec::new(),
            }),
        ));
        Program::mock(vec![class_a, class_b, main], MethodRef::mock("Main", "main", &[], "void"))
    }

    /// With one level of call-string sensitivity the two call sites of `id`
    /// are distinguished; without it their results merge.
    #[test]
    fn call_string_sensitivity_separates_call_sites() {
        let program = two_site_identity_program();
        let hierarchy = ClassHierarchy::build(&program).unwrap();

        let precise = analyze(&hierarchy, "1-call");
        assert_eq!(pointee_classes(&precise, entry_var(&hierarchy, "x")), vec!["A"]);
        assert_eq!(pointee_classes(&precise, entry_var(&hierarchy, "y")), vec!["B"]);
        // The parameter of `id` can also be queried per individual context.
        let id = hierarchy
            .find_declared_method(
                hierarchy.class_id("Main").unwrap(),
                "id",
                &["Object".to_string()],
            )
            .unwrap();
        let p = hierarchy.find_var(id, "p").unwrap();
        let first_site = context::Context::empty().appended(&Tid::new("l1"), 1);
        let ctx = precise.manager().find_context(&first_site).unwrap();
        let under_first = precise.points_to(ctx, p).unwrap();
        assert_eq!(under_first.len(), 1);
        assert_eq!(precise.points_to_of_var(p).len(), 2);

        let merged = analyze(&hierarchy, "insensitive");
        assert_eq!(
            pointee_classes(&merged, entry_var(&hierarchy, "x")),
            vec!["A", "B"]
        );
        assert_eq!(
            pointee_classes(&merged, entry_var(&hierarchy, "y")),
            vec!["A", "B"]
        );
    }

    /// The two analyses of the previous test must agree on the call graph shape,
    /// but the context-sensitive one analyzes `id` under two distinct contexts.
    #[test]
    fn contexts_multiply_reachable_methods() {
        let program = two_site_identity_program();
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let precise = analyze(&hierarchy, "1-call");
        let merged = analyze(&hierarchy, "insensitive");
        // main + id under two contexts vs main + id once.
        assert_eq!(precise.call_graph().reachable_methods().len(), 3);
        assert_eq!(merged.call_graph().reachable_methods().len(), 2);
        assert_eq!(precise.call_graph().num_call_edges(), 2);
        assert_eq!(merged.call_graph().num_call_edges(), 2);
    }

    /// Static fields are context-free: stores and loads in different methods meet.
    #[test]
    fn static_fields_flow_between_methods() {
        let class_a = Class::mock("A");
        let mut holder = Class::mock("Holder");
        holder.methods.push(Method::mock(
            "put",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("v", "A")],
                vec![
                    Term::mock("s1", Stmt::New { result: 0, class: "A".to_string() }),
                    Term::mock(
                        "s2",
                        Stmt::StoreStatic {
                            field: FieldRef::mock("Holder", "instance"),
                            value: 0,
                        },
                    ),
                ],
            )),
        ));
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("w", "A")],
                vec![
                    Term::mock(
                        "l1",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Holder", "put", &[], "void"),
                            receiver: None,
                            args: Vec::new(),
                            result: None,
                        }),
                    ),
                    Term::mock(
                        "s3",
                        Stmt::LoadStatic {
                            result: 0,
                            field: FieldRef::mock("Holder", "instance"),
                        },
                    ),
                ],
            )),
        ));
        let program = Program::mock(
            vec![class_a, holder, main],
            MethodRef::mock("Main", "main", &[], "void"),
        );
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let results = analyze(&hierarchy, "2-call");
        assert_eq!(pointee_classes(&results, entry_var(&hierarchy, "w")), vec!["A"]);
    }

    /// All indices of one array object are collapsed into a single slot:
    /// a store through one index variable is visible through a load with another.
    #[test]
    fn array_elements_are_collapsed() {
        let class_a = Class::mock("A");
        let arr = Class::mock("Array");
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("arr", "Array"), ("i", "Index"), ("j", "Index"), ("v", "A"), ("w", "A")],
                vec![
                    Term::mock("s1", Stmt::New { result: 0, class: "Array".to_string() }),
                    Term::mock("s2", Stmt::New { result: 3, class: "A".to_string() }),
                    Term::mock("s3", Stmt::StoreArray { base: 0, index: 1, value: 3 }),
                    Term::mock("s4", Stmt::LoadArray { result: 4, base: 0, index: 2 }),
                ],
            )),
        ));
        let program = Program::mock(
            vec![class_a, arr, main],
            MethodRef::mock("Main", "main", &[], "void"),
        );
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let results = analyze(&hierarchy, "insensitive");
        assert_eq!(pointee_classes(&results, entry_var(&hierarchy, "w")), vec!["A"]);
    }

    /// Recursive programs terminate because the bounded call strings
    /// eventually repeat and the points-to sets stop growing.
    #[test]
    fn recursion_terminates() {
        let mut main = Class::mock("Main");
        main.methods.push(Method::mock(
            "main",
            &[],
            "void",
            true,
            Some(MethodBody::mock(
                &[("o", "Main")],
                vec![
                    Term::mock("s1", Stmt::New { result: 0, class: "Main".to_string() }),
                    Term::mock(
                        "l1",
                        Stmt::Call(Call {
                            kind: CallKind::Static,
                            callee: MethodRef::mock("Main", "rec", &["Main"], "Main"),
                            receiver: None,
                            args: vec![0],
                            result: Some(0),
                        }),
                    ),
                ],
            )),
        ));
        main.methods.push(Method::mock(
            "rec",
            &["Main"],
            "Main",
            true,
            Some(MethodBody {
                variables: vec![Variable::mock("p", "Main"), Variable::mock("r", "Main")],
                this_var: None,
                param_vars: vec![0],
                return_vars: vec![1],
                stmts: vec![Term::mock(
                    "l2",
                    Stmt::Call(Call {
                        kind: CallKind::Static,
                        callee: MethodRef::mock("Main", "rec", &["Main"], "Main"),
                        receiver: None,
                        args: vec![0],
                        result: Some(1),
                    }),
                )],
            }),
        ));
        let program = Program::mock(vec![main], MethodRef::mock("Main", "main", &[], "void"));
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let results = analyze(&hierarchy, "2-call");
        assert_eq!(pointee_classes(&results, entry_var(&hierarchy, "o")), vec!["Main"]);
    }

    /// Every method in the final call graph is transitively reachable
    /// from the entry method via inserted call edges.
    #[test]
    fn call_graph_is_connected_from_entry() {
        let program = two_site_identity_program();
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let results = analyze(&hierarchy, "2-call");
        let call_graph = results.call_graph();
        let entry = call_graph.entry().unwrap();
        let entry_node = call_graph.node_of(entry).unwrap();
        for &method in call_graph.reachable_methods() {
            let node = call_graph.node_of(method).unwrap();
            assert!(has_path_connecting(call_graph.graph(), entry_node, node, None));
        }
    }

    /// Points-to sets distinguish heap contexts under object sensitivity but
    /// the abstract object (the allocation site) stays canonical.
    #[test]
    fn allocation_sites_are_canonical() {
        let program = two_site_identity_program();
        let hierarchy = ClassHierarchy::build(&program).unwrap();
        let results = analyze(&hierarchy, "1-obj");
        let x = entry_var(&hierarchy, "x");
        let objs: Vec<Obj> = results
            .points_to_of_var(x)
            .iter()
            .map(|&cs_obj| {
                let (_, obj) = results.manager().cs_obj_parts(cs_obj);
                results.manager().obj(obj).clone()
            })
            .collect();
        assert_eq!(
            objs,
            vec![Obj::Alloc {
                site: Tid::new("s1"),
                class: "A".to_string()
            }]
        );
    }
}
