use super::{Stmt, Term, Variable};
use crate::prelude::*;
use itertools::Itertools;
use std::fmt;

/// A method of a class of the analyzed program.
///
/// Abstract methods and methods whose code is not part of the analyzed program
/// (e.g. stubs for library methods) carry no body.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Method {
    /// The name of the method.
    pub name: String,
    /// The static types of the declared parameters, in order.
    /// Together with the name they form the signature used for dispatch.
    pub param_types: Vec<String>,
    /// The static type of the return value. `void` if the method returns nothing.
    pub return_type: String,
    /// Set to `true` for static methods, which are invoked without a receiver object.
    pub is_static: bool,
    /// Set to `true` for abstract methods. Abstract methods are never dispatch targets.
    pub is_abstract: bool,
    /// The three-address code of the method, if present.
    pub body: Option<MethodBody>,
}

/// The three-address code of a method.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct MethodBody {
    /// All variables of the method.
    /// Statements and the index lists below refer to variables by their index into this list.
    pub variables: Vec<Variable>,
    /// The variable holding the implicit receiver parameter.
    /// `None` for static methods.
    pub this_var: Option<usize>,
    /// The variables holding the declared parameters, in declaration order.
    pub param_vars: Vec<usize>,
    /// The variables whose values the method may return.
    /// Methods with more than one return statement list one variable per return.
    pub return_vars: Vec<usize>,
    /// The statements of the method in program order.
    pub stmts: Vec<Term<Stmt>>,
}

/// A reference to a method by declaring class and signature.
///
/// Used at call sites and in taint rule files to name methods
/// without resolving them against the class hierarchy yet.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct MethodRef {
    /// The name of the class against which the reference is resolved.
    pub class: String,
    /// The name of the referenced method.
    pub name: String,
    /// The static parameter types of the referenced method.
    pub param_types: Vec<String>,
    /// The static return type of the referenced method.
    pub return_type: String,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.class,
            self.name,
            self.param_types.iter().join(",")
        )
    }
}

#[cfg(test)]
impl MethodRef {
    /// Generate a method reference from string slices.
    pub fn mock(class: &str, name: &str, param_types: &[&str], return_type: &str) -> MethodRef {
        MethodRef {
            class: class.to_string(),
            name: name.to_string(),
            param_types: param_types.iter().map(|ty| ty.to_string()).collect(),
            return_type: return_type.to_string(),
        }
    }
}

#[cfg(test)]
impl Method {
    /// Generate a method term with the given signature and body.
    pub fn mock(
        name: &str,
        param_types: &[&str],
        return_type: &str,
        is_static: bool,
        body: Option<MethodBody>,
    ) -> Term<Method> {
        Term::mock(
            name,
            Method {
                name: name.to_string(),
                param_types: param_types.iter().map(|ty| ty.to_string()).collect(),
                return_type: return_type.to_string(),
                is_static,
                is_abstract: false,
                body,
            },
        )
    }
}

#[cfg(test)]
impl MethodBody {
    /// Generate a method body without parameters or returns
    /// from a list of `(name, type)` variable pairs and a statement list.
    pub fn mock(variables: &[(&str, &str)], stmts: Vec<Term<Stmt>>) -> MethodBody {
        MethodBody {
            variables: variables
                .iter()
                .map(|(name, ty)| Variable::mock(name, ty))
                .collect(),
            this_var: None,
            param_vars: Vec::new(),
            return_vars: Vec::new(),
            stmts,
        }
    }
}
