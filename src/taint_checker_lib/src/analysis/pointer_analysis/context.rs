//! Calling contexts and the context-selection policies that produce them.
//!
//! A [`Context`] is an immutable, structurally comparable token qualifying
//! methods, variables, objects and call sites during the analysis.
//! Which context a callee or a freshly allocated object receives is decided by a
//! [`ContextSelector`], the single policy knob controlling the precision/cost tradeoff
//! of the whole analysis: the same solver run with different selectors yields
//! context-insensitive analysis, k-CFA or k-object-sensitive analysis.

use super::element::Obj;
use crate::analysis::class_hierarchy::MethodId;
use crate::intermediate_representation::Tid;
use crate::prelude::*;
use itertools::Itertools;
use std::fmt;

/// A calling context: a bounded sequence of site tokens, most recent last.
///
/// For call-string sensitivity the tokens are call site IDs,
/// for object sensitivity they are allocation site IDs.
/// The empty sequence is the distinguished empty context.
/// Contexts are interned by the element manager,
/// so equal contexts are represented by the same handle throughout a solver run.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct Context {
    tokens: Vec<Tid>,
}

impl Context {
    /// The empty context.
    pub fn empty() -> Context {
        Context { tokens: Vec::new() }
    }

    /// Returns true if this is the empty context.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The site tokens of the context, oldest first.
    pub fn tokens(&self) -> &[Tid] {
        &self.tokens
    }

    /// Return a new context with `token` appended,
    /// truncated to the last `depth` tokens.
    pub fn appended(&self, token: &Tid, depth: usize) -> Context {
        let mut tokens = self.tokens.clone();
        tokens.push(token.clone());
        let cut = tokens.len().saturating_sub(depth);
        tokens.drain(..cut);
        Context { tokens }
    }

    /// Return a new context containing only the last `depth` tokens of this one.
    pub fn truncated(&self, depth: usize) -> Context {
        let cut = self.tokens.len().saturating_sub(depth);
        Context {
            tokens: self.tokens[cut..].to_vec(),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tokens.iter().join(", "))
    }
}

/// Policy deciding which context a callee method or a freshly allocated object is analyzed under.
///
/// Selectors are pure functions of their inputs and carry no mutable state.
/// A selector must only produce finitely many distinct contexts per site,
/// otherwise the fixpoint of the solver is not guaranteed to terminate.
pub trait ContextSelector {
    /// Select the context for a callee reached through static or special dispatch,
    /// i.e. without a receiver object.
    fn select_call_context(&self, caller: &Context, call_site: &Tid, callee: MethodId) -> Context;

    /// Select the context for a callee reached through receiver-based dispatch.
    fn select_receiver_context(
        &self,
        caller: &Context,
        call_site: &Tid,
        receiver_context: &Context,
        receiver: &Obj,
        callee: MethodId,
    ) -> Context;

    /// Select the heap context for an object allocated at `alloc_site`
    /// inside a method analyzed under `method_context`.
    fn select_heap_context(&self, method_context: &Context, alloc_site: &Tid) -> Context;
}

/// The selector yielding context-insensitive analysis:
/// every method and object is analyzed under the empty context.
pub struct ContextInsensitiveSelector;

impl ContextSelector for ContextInsensitiveSelector {
    fn select_call_context(&self, _caller: &Context, _call_site: &Tid, _callee: MethodId) -> Context {
        Context::empty()
    }

    fn select_receiver_context(
        &self,
        _caller: &Context,
        _call_site: &Tid,
        _receiver_context: &Context,
        _receiver: &Obj,
        _callee: MethodId,
    ) -> Context {
        Context::empty()
    }

    fn select_heap_context(&self, _method_context: &Context, _alloc_site: &Tid) -> Context {
        Context::empty()
    }
}

/// The k-CFA family of selectors:
/// the callee context is the string of the last `depth` call sites leading to the call,
/// heap contexts are limited to `depth - 1` call sites.
pub struct CallStringSelector {
    depth: usize,
}

impl CallStringSelector {
    /// Create a selector with call strings limited to `depth` call sites.
    pub fn new(depth: usize) -> CallStringSelector {
        CallStringSelector { depth }
    }
}

impl ContextSelector for CallStringSelector {
    fn select_call_context(&self, caller: &Context, call_site: &Tid, _callee: MethodId) -> Context {
        caller.appended(call_site, self.depth)
    }

    fn select_receiver_context(
        &self,
        caller: &Context,
        call_site: &Tid,
        _receiver_context: &Context,
        _receiver: &Obj,
        _callee: MethodId,
    ) -> Context {
        caller.appended(call_site, self.depth)
    }

    fn select_heap_context(&self, method_context: &Context, _alloc_site: &Tid) -> Context {
        method_context.truncated(self.depth - 1)
    }
}

/// The k-object-sensitive family of selectors:
/// the callee context is derived from the allocation site string of the receiver object.
/// Static calls inherit the context of the caller.
pub struct ObjectSensitiveSelector {
    depth: usize,
}

impl ObjectSensitiveSelector {
    /// Create a selector with allocation site strings limited to `depth` sites.
    pub fn new(depth: usize) -> ObjectSensitiveSelector {
        ObjectSensitiveSelector { depth }
    }
}

impl ContextSelector for ObjectSensitiveSelector {
    fn select_call_context(&self, caller: &Context, _call_site: &Tid, _callee: MethodId) -> Context {
        caller.clone()
    }

    fn select_receiver_context(
        &self,
        _caller: &Context,
        _call_site: &Tid,
        receiver_context: &Context,
        receiver: &Obj,
        _callee: MethodId,
    ) -> Context {
        receiver_context.appended(receiver.site(), self.depth)
    }

    fn select_heap_context(&self, method_context: &Context, _alloc_site: &Tid) -> Context {
        method_context.truncated(self.depth - 1)
    }
}

/// Parse a context sensitivity policy name into a selector.
///
/// Accepted policies are `insensitive`, `<k>-call` and `<k>-obj` with `k >= 1`.
pub fn parse_selector(policy: &str) -> Result<Box<dyn ContextSelector>, Error> {
    if policy == "insensitive" {
        return Ok(Box::new(ContextInsensitiveSelector));
    }
    if let Some(depth) = policy.strip_suffix("-call") {
        let depth: usize = depth
            .parse()
            .map_err(|_| anyhow!("invalid context sensitivity policy: {}", policy))?;
        if depth >= 1 {
            return Ok(Box::new(CallStringSelector::new(depth)));
        }
    }
    if let Some(depth) = policy.strip_suffix("-obj") {
        let depth: usize = depth
            .parse()
            .map_err(|_| anyhow!("invalid context sensitivity policy: {}", policy))?;
        if depth >= 1 {
            return Ok(Box::new(ObjectSensitiveSelector::new(depth)));
        }
    }
    Err(anyhow!("unknown context sensitivity policy: {}", policy))
}
