//! Canonicalization of context-qualified analysis elements.
//!
//! All elements the pointer analysis talks about — contexts, abstract objects,
//! context-qualified variables, objects, call sites and methods, and pointers —
//! are interned by the [`ElementManager`]:
//! structurally equal elements are mapped to the same numeric handle for the lifetime
//! of one analysis session.
//! This makes set membership and graph edges cheap to compare and merge,
//! and it implements the heap abstraction (one abstract object per allocation site).

use super::context::Context;
use super::points_to_set::PointsToSet;
use crate::analysis::class_hierarchy::{MethodId, StmtRef, VarId};
use crate::intermediate_representation::{FieldRef, Tid};
use fnv::FnvHashMap;
use std::hash::Hash;

/// Handle of an interned [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) usize);

/// Handle of an interned abstract object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub(crate) usize);

/// Handle of an interned field reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub(crate) usize);

/// Handle of a context-qualified variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsVarId(pub(crate) usize);

/// Handle of a context-qualified abstract object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsObjId(pub(crate) usize);

/// Handle of a context-qualified call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsCallSiteId(pub(crate) usize);

/// Handle of a context-qualified method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsMethodId(pub(crate) usize);

/// Handle of a pointer, i.e. a node of the pointer flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointerId(pub(crate) usize);

/// An abstract object, representing a set of concrete runtime objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Obj {
    /// All objects created at one allocation site.
    Alloc {
        /// The `Tid` of the allocation statement.
        site: Tid,
        /// The class of the allocated objects.
        class: String,
    },
    /// A synthetic object marking values that may carry data from a taint source.
    /// Taint objects flow through the same machinery as ordinary objects.
    Taint {
        /// The call site of the source call that introduced the taint.
        source_call: Tid,
        /// The declared type of the tainted value.
        data_type: String,
    },
}

impl Obj {
    /// The class name used when dispatching methods on this object.
    pub fn class_name(&self) -> &str {
        match self {
            Obj::Alloc { class, .. } => class,
            Obj::Taint { data_type, .. } => data_type,
        }
    }

    /// The site identifying this object:
    /// the allocation statement for ordinary objects,
    /// the source call for taint objects.
    pub fn site(&self) -> &Tid {
        match self {
            Obj::Alloc { site, .. } => site,
            Obj::Taint { source_call, .. } => source_call,
        }
    }

    /// Returns whether this is a synthetic taint object.
    pub fn is_taint(&self) -> bool {
        matches!(self, Obj::Taint { .. })
    }
}

/// One of the four pointer kinds of the analysis.
///
/// Static fields carry no context;
/// all array indices of one object are collapsed into a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pointer {
    /// A context-qualified local variable.
    Var(CsVarId),
    /// A static field.
    StaticField(FieldId),
    /// An instance field of a context-qualified object.
    InstanceField(CsObjId, FieldId),
    /// The collapsed array-element slot of a context-qualified object.
    ArrayIndex(CsObjId),
}

/// An arena with hash-based lookup,
/// guaranteeing a single shared handle per distinct value.
#[derive(Debug, Clone)]
struct Interner<T> {
    items: Vec<T>,
    index: FnvHashMap<T, usize>,
}

impl<T: Clone + Eq + Hash> Interner<T> {
    fn new() -> Interner<T> {
        Interner {
            items: Vec::new(),
            index: FnvHashMap::default(),
        }
    }

    /// Intern a value. Returns its handle and whether the value was new.
    fn intern(&mut self, item: T) -> (usize, bool) {
        if let Some(&index) = self.index.get(&item) {
            (index, false)
        } else {
            let index = self.items.len();
            self.index.insert(item.clone(), index);
            self.items.push(item);
            (index, true)
        }
    }

    fn lookup(&self, item: &T) -> Option<usize> {
        self.index.get(item).copied()
    }

    fn get(&self, index: usize) -> &T {
        &self.items[index]
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items.iter().enumerate()
    }
}

/// The canonicalizing registry for all context-qualified elements of one analysis session.
///
/// Also owns the points-to sets of all pointers,
/// stored in a vector parallel to the pointer arena.
/// The manager is owned by the solver and must not be shared between sessions,
/// since handles are only meaningful relative to the manager that produced them.
pub struct ElementManager {
    contexts: Interner<Context>,
    objs: Interner<Obj>,
    fields: Interner<FieldRef>,
    cs_vars: Interner<(ContextId, VarId)>,
    cs_objs: Interner<(ContextId, ObjId)>,
    cs_call_sites: Interner<(ContextId, StmtRef)>,
    cs_methods: Interner<(ContextId, MethodId)>,
    pointers: Interner<Pointer>,
    points_to: Vec<PointsToSet>,
}

impl ElementManager {
    /// Create a fresh manager.
    pub fn new() -> ElementManager {
        ElementManager {
            contexts: Interner::new(),
            objs: Interner::new(),
            fields: Interner::new(),
            cs_vars: Interner::new(),
            cs_objs: Interner::new(),
            cs_call_sites: Interner::new(),
            cs_methods: Interner::new(),
            pointers: Interner::new(),
            points_to: Vec::new(),
        }
    }

    /// Intern a context.
    pub fn context_id(&mut self, context: Context) -> ContextId {
        ContextId(self.contexts.intern(context).0)
    }

    /// Get an interned context.
    pub fn context(&self, id: ContextId) -> &Context {
        self.contexts.get(id.0)
    }

    /// Look up a context without creating it.
    pub fn find_context(&self, context: &Context) -> Option<ContextId> {
        self.contexts.lookup(context).map(ContextId)
    }

    /// Intern an abstract object.
    /// Interning the allocation statement of a `New` twice yields the same handle,
    /// implementing the allocation-site abstraction.
    pub fn obj_id(&mut self, obj: Obj) -> ObjId {
        ObjId(self.objs.intern(obj).0)
    }

    /// Get an interned object.
    pub fn obj(&self, id: ObjId) -> &Obj {
        self.objs.get(id.0)
    }

    /// Intern a field reference.
    pub fn field_id(&mut self, field: FieldRef) -> FieldId {
        FieldId(self.fields.intern(field).0)
    }

    /// Get an interned field reference.
    pub fn field(&self, id: FieldId) -> &FieldRef {
        self.fields.get(id.0)
    }

    /// Intern a context-qualified variable.
    pub fn cs_var(&mut self, context: ContextId, var: VarId) -> CsVarId {
        CsVarId(self.cs_vars.intern((context, var)).0)
    }

    /// Get the context and variable of a context-qualified variable.
    pub fn cs_var_parts(&self, id: CsVarId) -> (ContextId, VarId) {
        *self.cs_vars.get(id.0)
    }

    /// Look up a context-qualified variable without creating it.
    pub fn find_cs_var(&self, context: ContextId, var: VarId) -> Option<CsVarId> {
        self.cs_vars.lookup(&(context, var)).map(CsVarId)
    }

    /// Intern a context-qualified object.
    pub fn cs_obj(&mut self, context: ContextId, obj: ObjId) -> CsObjId {
        CsObjId(self.cs_objs.intern((context, obj)).0)
    }

    /// Get the heap context and object of a context-qualified object.
    pub fn cs_obj_parts(&self, id: CsObjId) -> (ContextId, ObjId) {
        *self.cs_objs.get(id.0)
    }

    /// Intern a context-qualified call site.
    pub fn cs_call_site(&mut self, context: ContextId, site: StmtRef) -> CsCallSiteId {
        CsCallSiteId(self.cs_call_sites.intern((context, site)).0)
    }

    /// Get the caller context and statement of a context-qualified call site.
    pub fn cs_call_site_parts(&self, id: CsCallSiteId) -> (ContextId, StmtRef) {
        *self.cs_call_sites.get(id.0)
    }

    /// Intern a context-qualified method.
    pub fn cs_method(&mut self, context: ContextId, method: MethodId) -> CsMethodId {
        CsMethodId(self.cs_methods.intern((context, method)).0)
    }

    /// Get the context and method of a context-qualified method.
    pub fn cs_method_parts(&self, id: CsMethodId) -> (ContextId, MethodId) {
        *self.cs_methods.get(id.0)
    }

    /// Intern a pointer, allocating its (empty) points-to set on first creation.
    fn pointer_id(&mut self, pointer: Pointer) -> PointerId {
        let (index, new) = self.pointers.intern(pointer);
        if new {
            self.points_to.push(PointsToSet::new());
        }
        PointerId(index)
    }

    /// Get the pointer of a context-qualified variable.
    pub fn var_pointer(&mut self, var: CsVarId) -> PointerId {
        self.pointer_id(Pointer::Var(var))
    }

    /// Get the pointer of a static field. Static fields are not context-qualified.
    pub fn static_field_pointer(&mut self, field: FieldId) -> PointerId {
        self.pointer_id(Pointer::StaticField(field))
    }

    /// Get the pointer of an instance field of a context-qualified object.
    pub fn instance_field_pointer(&mut self, obj: CsObjId, field: FieldId) -> PointerId {
        self.pointer_id(Pointer::InstanceField(obj, field))
    }

    /// Get the pointer of the collapsed array-element slot of a context-qualified object.
    pub fn array_pointer(&mut self, obj: CsObjId) -> PointerId {
        self.pointer_id(Pointer::ArrayIndex(obj))
    }

    /// Look up the pointer of a context-qualified variable without creating it.
    pub fn find_var_pointer(&self, var: CsVarId) -> Option<PointerId> {
        self.pointers.lookup(&Pointer::Var(var)).map(PointerId)
    }

    /// Get an interned pointer.
    pub fn pointer(&self, id: PointerId) -> &Pointer {
        self.pointers.get(id.0)
    }

    /// Get the points-to set of a pointer.
    pub fn points_to(&self, id: PointerId) -> &PointsToSet {
        &self.points_to[id.0]
    }

    /// Get the mutable points-to set of a pointer.
    pub fn points_to_mut(&mut self, id: PointerId) -> &mut PointsToSet {
        &mut self.points_to[id.0]
    }

    /// Compute the points-to set of an uncontextualized variable:
    /// the union of the points-to sets of the variable under all its contexts.
    pub fn points_to_of_var(&self, var: VarId) -> PointsToSet {
        let mut result = PointsToSet::new();
        for (index, &(_, v)) in self.cs_vars.iter() {
            if v != var {
                continue;
            }
            if let Some(pointer) = self.find_var_pointer(CsVarId(index)) {
                for &obj in self.points_to(pointer).iter() {
                    result.insert(obj);
                }
            }
        }
        result
    }

    /// Iterate over all pointers created so far.
    pub fn iter_pointers(&self) -> impl Iterator<Item = (PointerId, &Pointer)> {
        self.pointers.iter().map(|(index, pointer)| (PointerId(index), pointer))
    }

    /// The number of distinct pointers created so far.
    pub fn num_pointers(&self) -> usize {
        self.pointers.len()
    }

    /// The number of distinct abstract objects created so far.
    pub fn num_objects(&self) -> usize {
        self.objs.len()
    }

    /// The number of distinct contexts created so far.
    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }
}

impl Default for ElementManager {
    fn default() -> ElementManager {
        ElementManager::new()
    }
}
