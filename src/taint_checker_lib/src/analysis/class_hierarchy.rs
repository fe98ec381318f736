//! A resolved view of the class hierarchy of the analyzed program.
//!
//! The [`ClassHierarchy`] struct indexes all classes, methods and variables of a program
//! with dense numeric IDs and provides the lookups the pointer analysis needs:
//! superclass chains, declared-method lookup by signature and,
//! most importantly, virtual dispatch against the runtime type of a receiver object.
//! It also validates the IR once during construction,
//! so that the analyses can rely on all variable indices being in bounds.

use crate::intermediate_representation::*;
use crate::prelude::*;
use fnv::FnvHashMap;

/// Identifier of a class in a [`ClassHierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) usize);

/// Identifier of a method in a [`ClassHierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(pub(crate) usize);

/// Identifier of a method-local variable in a [`ClassHierarchy`].
/// Variable IDs are unique across the whole program, not just within one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

/// A statement, identified by its containing method and its index into the method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtRef {
    /// The method containing the statement.
    pub method: MethodId,
    /// The index of the statement in the method body.
    pub index: usize,
}

/// The statements of a method that access a given variable.
///
/// The pointer analysis consults these lists whenever the points-to set of the variable grows:
/// new objects arriving at a base variable determine which field/array accesses
/// get connected to the pointer flow graph and which call sites get (re)resolved.
#[derive(Debug, Default, Clone)]
pub struct VarAccess {
    /// Indices of `LoadField` statements with this variable as base.
    pub field_loads: Vec<usize>,
    /// Indices of `StoreField` statements with this variable as base.
    pub field_stores: Vec<usize>,
    /// Indices of `LoadArray` statements with this variable as base.
    pub array_loads: Vec<usize>,
    /// Indices of `StoreArray` statements with this variable as base.
    pub array_stores: Vec<usize>,
    /// Indices of call statements with this variable as receiver.
    pub invokes: Vec<usize>,
    /// Indices of call statements with this variable among the arguments.
    pub arg_invokes: Vec<usize>,
}

struct ClassInfo<'a> {
    class: &'a Class,
    superclass: Option<ClassId>,
    subclasses: Vec<ClassId>,
    methods: Vec<MethodId>,
}

struct MethodInfo<'a> {
    class: ClassId,
    term: &'a Term<Method>,
    var_base: usize,
}

struct VarInfo {
    method: MethodId,
    local: usize,
}

/// The resolved whole-program view described in the module documentation.
///
/// Borrows the program it was built from; all accessors returning IR data
/// return references with the lifetime of the program, not of the hierarchy itself.
pub struct ClassHierarchy<'a> {
    program: &'a Program,
    class_ids: FnvHashMap<&'a str, ClassId>,
    classes: Vec<ClassInfo<'a>>,
    methods: Vec<MethodInfo<'a>>,
    vars: Vec<VarInfo>,
    var_access: Vec<VarAccess>,
}

impl<'a> ClassHierarchy<'a> {
    /// Build the hierarchy from a program.
    ///
    /// Returns an error if the program is malformed:
    /// unknown superclass or interface names,
    /// variable indices out of bounds,
    /// or parameter variable lists not matching the declared parameter types.
    pub fn build(program: &'a Program) -> Result<ClassHierarchy<'a>, Error> {
        let mut hierarchy = ClassHierarchy {
            program,
            class_ids: FnvHashMap::default(),
            classes: Vec::new(),
            methods: Vec::new(),
            vars: Vec::new(),
            var_access: Vec::new(),
        };
        for class in program.classes.values() {
            let id = ClassId(hierarchy.classes.len());
            hierarchy.class_ids.insert(class.name.as_str(), id);
            hierarchy.classes.push(ClassInfo {
                class,
                superclass: None,
                subclasses: Vec::new(),
                methods: Vec::new(),
            });
        }
        hierarchy.link_classes()?;
        hierarchy.index_methods()?;
        hierarchy.index_var_accesses();
        Ok(hierarchy)
    }

    /// Resolve superclass and interface names and record the inverse subclass edges.
    fn link_classes(&mut self) -> Result<(), Error> {
        for id in 0..self.classes.len() {
            let class = self.classes[id].class;
            if let Some(superclass) = &class.superclass {
                let super_id = *self
                    .class_ids
                    .get(superclass.as_str())
                    .ok_or_else(|| anyhow!("unknown superclass {} of {}", superclass, class.name))?;
                self.classes[id].superclass = Some(super_id);
                self.classes[super_id.0].subclasses.push(ClassId(id));
            }
            for interface in &class.interfaces {
                let interface_id = *self
                    .class_ids
                    .get(interface.as_str())
                    .ok_or_else(|| anyhow!("unknown interface {} of {}", interface, class.name))?;
                self.classes[interface_id.0].subclasses.push(ClassId(id));
            }
        }
        Ok(())
    }

    /// Assign method and variable IDs and validate all method bodies.
    fn index_methods(&mut self) -> Result<(), Error> {
        for class_index in 0..self.classes.len() {
            for term in &self.classes[class_index].class.methods {
                let method_id = MethodId(self.methods.len());
                self.classes[class_index].methods.push(method_id);
                let var_base = self.vars.len();
                if let Some(body) = &term.term.body {
                    validate_body(term, body)?;
                    for local in 0..body.variables.len() {
                        self.vars.push(VarInfo {
                            method: method_id,
                            local,
                        });
                    }
                }
                self.methods.push(MethodInfo {
                    class: ClassId(class_index),
                    term,
                    var_base,
                });
            }
        }
        Ok(())
    }

    /// Compute the per-variable access lists for all method bodies.
    fn index_var_accesses(&mut self) {
        self.var_access = vec![VarAccess::default(); self.vars.len()];
        for info in &self.methods {
            let Some(body) = &info.term.term.body else {
                continue;
            };
            for (index, stmt) in body.stmts.iter().enumerate() {
                match &stmt.term {
                    Stmt::LoadField { base, .. } => {
                        self.var_access[info.var_base + base].field_loads.push(index)
                    }
                    Stmt::StoreField { base, .. } => self.var_access[info.var_base + base]
                        .field_stores
                        .push(index),
                    Stmt::LoadArray { base, .. } => {
                        self.var_access[info.var_base + base].array_loads.push(index)
                    }
                    Stmt::StoreArray { base, .. } => self.var_access[info.var_base + base]
                        .array_stores
                        .push(index),
                    Stmt::Call(call) => {
                        if let Some(receiver) = call.receiver {
                            self.var_access[info.var_base + receiver].invokes.push(index);
                        }
                        for &arg in &call.args {
                            let arg_invokes = &mut self.var_access[info.var_base + arg].arg_invokes;
                            if arg_invokes.last() != Some(&index) {
                                arg_invokes.push(index);
                            }
                        }
                    }
                    _ => (),
                }
            }
        }
    }

    /// Get the ID of the class with the given name.
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.class_ids.get(name).copied()
    }

    /// Get the class with the given ID.
    pub fn class(&self, id: ClassId) -> &'a Class {
        self.classes[id.0].class
    }

    /// Get the direct superclass of a class.
    pub fn superclass(&self, id: ClassId) -> Option<ClassId> {
        self.classes[id.0].superclass
    }

    /// Get the direct subclasses of a class
    /// (for interfaces: the direct implementors and subinterfaces).
    pub fn direct_subclasses(&self, id: ClassId) -> &[ClassId] {
        &self.classes[id.0].subclasses
    }

    /// Get the methods declared by a class.
    pub fn methods_of(&self, id: ClassId) -> &[MethodId] {
        &self.classes[id.0].methods
    }

    /// Get the method term with the given ID.
    pub fn method(&self, id: MethodId) -> &'a Term<Method> {
        self.methods[id.0].term
    }

    /// Get the class declaring the method with the given ID.
    pub fn method_class(&self, id: MethodId) -> ClassId {
        self.methods[id.0].class
    }

    /// Get the body of a method, if it has one.
    pub fn method_body(&self, id: MethodId) -> Option<&'a MethodBody> {
        self.methods[id.0].term.term.body.as_ref()
    }

    /// Get the `Class.method` display name of a method for log messages and reports.
    pub fn full_name(&self, id: MethodId) -> String {
        let info = &self.methods[id.0];
        format!("{}.{}", self.classes[info.class.0].class.name, info.term.term.name)
    }

    /// Look up a method declared by the given class (not by its superclasses)
    /// matching the given name and parameter types.
    pub fn find_declared_method(
        &self,
        class: ClassId,
        name: &str,
        param_types: &[String],
    ) -> Option<MethodId> {
        self.classes[class.0]
            .methods
            .iter()
            .copied()
            .find(|&id| {
                let method = &self.methods[id.0].term.term;
                method.name == name && method.param_types == param_types
            })
    }

    /// Resolve a method reference against its declared class,
    /// walking up the superclass chain until a non-abstract declaration is found.
    ///
    /// This is the resolution used for static and special call sites,
    /// where the invoked method does not depend on a receiver object.
    pub fn resolve(&self, callee: &MethodRef) -> Option<MethodId> {
        self.dispatch(&callee.class, callee)
    }

    /// Dispatch a method reference against the runtime type of a receiver object.
    ///
    /// Walks from the receiver class up the superclass chain and returns the first
    /// non-abstract method matching the name and parameter types of the reference.
    /// Returns `None` if no implementation exists;
    /// the caller treats this as a silent no-call.
    pub fn dispatch(&self, receiver_class: &str, callee: &MethodRef) -> Option<MethodId> {
        let mut current = self.class_id(receiver_class);
        while let Some(class) = current {
            if let Some(method) =
                self.find_declared_method(class, &callee.name, &callee.param_types)
            {
                if !self.methods[method.0].term.term.is_abstract {
                    return Some(method);
                }
            }
            current = self.superclass(class);
        }
        None
    }

    /// Resolve the entry point of the program.
    ///
    /// Returns an error if the entry method does not exist or has no body,
    /// since the whole analysis would be vacuous without it.
    pub fn entry_method(&self) -> Result<MethodId, Error> {
        let entry = &self.program.entry_point;
        let method = self
            .resolve(entry)
            .ok_or_else(|| anyhow!("entry point {} not found in program", entry))?;
        if self.method_body(method).is_none() {
            return Err(anyhow!("entry point {} has no body", entry));
        }
        Ok(method)
    }

    /// Get the program-wide ID of a method-local variable.
    pub fn var_id(&self, method: MethodId, local: usize) -> VarId {
        VarId(self.methods[method.0].var_base + local)
    }

    /// Get the method and local index of a variable.
    pub fn var_parts(&self, var: VarId) -> (MethodId, usize) {
        let info = &self.vars[var.0];
        (info.method, info.local)
    }

    /// Get the IR data of a variable.
    pub fn var(&self, var: VarId) -> &'a Variable {
        let info = &self.vars[var.0];
        &self.methods[info.method.0].term.term.body.as_ref().unwrap().variables[info.local]
    }

    /// Find a variable of a method by name.
    pub fn find_var(&self, method: MethodId, name: &str) -> Option<VarId> {
        let body = self.method_body(method)?;
        body.variables
            .iter()
            .position(|var| var.name == name)
            .map(|local| self.var_id(method, local))
    }

    /// Get the access lists of a variable.
    pub fn var_access(&self, var: VarId) -> &VarAccess {
        &self.var_access[var.0]
    }

    /// Get a statement by reference.
    pub fn stmt(&self, stmt: StmtRef) -> &'a Term<Stmt> {
        &self.methods[stmt.method.0]
            .term
            .term
            .body
            .as_ref()
            .unwrap()
            .stmts[stmt.index]
    }

    /// The total number of classes of the program.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// The total number of methods of the program.
    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    /// The total number of variables of the program.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }
}

/// Check that all variable indices of a method body are in bounds
/// and that the parameter list matches the declared parameter types.
fn validate_body(term: &Term<Method>, body: &MethodBody) -> Result<(), Error> {
    let num_vars = body.variables.len();
    let check = |index: usize| -> Result<(), Error> {
        if index < num_vars {
            Ok(())
        } else {
            Err(anyhow!(
                "variable index {} out of bounds in method {}",
                index,
                term.tid
            ))
        }
    };
    if body.param_vars.len() != term.term.param_types.len() {
        return Err(anyhow!(
            "parameter variable list of method {} does not match its declared parameter types",
            term.tid
        ));
    }
    for &index in body
        .param_vars
        .iter()
        .chain(body.return_vars.iter())
        .chain(body.this_var.iter())
    {
        check(index)?;
    }
    for stmt in &body.stmts {
        match &stmt.term {
            Stmt::New { result, .. } => check(*result)?,
            Stmt::Copy { result, value } => {
                check(*result)?;
                check(*value)?;
            }
            Stmt::LoadStatic { result, .. } => check(*result)?,
            Stmt::StoreStatic { value, .. } => check(*value)?,
            Stmt::LoadField { result, base, .. } => {
                check(*result)?;
                check(*base)?;
            }
            Stmt::StoreField { base, value, .. } => {
                check(*base)?;
                check(*value)?;
            }
            Stmt::LoadArray {
                result,
                base,
                index,
            } => {
                check(*result)?;
                check(*base)?;
                check(*index)?;
            }
            Stmt::StoreArray { base, index, value } => {
                check(*base)?;
                check(*index)?;
                check(*value)?;
            }
            Stmt::Call(call) => {
                for &var in call
                    .args
                    .iter()
                    .chain(call.receiver.iter())
                    .chain(call.result.iter())
                {
                    check(var)?;
                }
            }
        }
    }
    Ok(())
}
