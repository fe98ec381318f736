use std::fmt;

use super::{FieldRef, MethodRef};
use crate::prelude::*;
use derive_more::Display;
use itertools::Itertools;

/// A statement of a method body in three-address form.
///
/// Variables are referenced by their index into the variable list of the containing method body.
/// The statement kinds form a closed set,
/// so the statement processors of the analyses match exhaustively over this enum.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub enum Stmt {
    /// An allocation `x = new T`.
    /// The `Tid` of the surrounding term identifies the allocation site.
    New {
        /// The variable the fresh object is assigned to.
        result: usize,
        /// The class of the allocated object.
        class: String,
    },
    /// A copy assignment `x = y` between local variables.
    Copy {
        /// The variable that is written to.
        result: usize,
        /// The variable that is read.
        value: usize,
    },
    /// A load `x = T.f` from a static field.
    LoadStatic {
        /// The variable that is written to.
        result: usize,
        /// The static field that is read.
        field: FieldRef,
    },
    /// A store `T.f = y` to a static field.
    StoreStatic {
        /// The static field that is written to.
        field: FieldRef,
        /// The variable that is read.
        value: usize,
    },
    /// A load `x = y.f` from an instance field.
    LoadField {
        /// The variable that is written to.
        result: usize,
        /// The variable holding the accessed object.
        base: usize,
        /// The accessed field.
        field: FieldRef,
    },
    /// A store `x.f = y` to an instance field.
    StoreField {
        /// The variable holding the accessed object.
        base: usize,
        /// The accessed field.
        field: FieldRef,
        /// The variable that is read.
        value: usize,
    },
    /// A load `x = y[i]` from an array element.
    /// The pointer analysis collapses all elements of one array object into a single slot,
    /// so the index variable does not influence the analysis result.
    LoadArray {
        /// The variable that is written to.
        result: usize,
        /// The variable holding the accessed array object.
        base: usize,
        /// The variable holding the element index.
        index: usize,
    },
    /// A store `x[i] = y` to an array element.
    StoreArray {
        /// The variable holding the accessed array object.
        base: usize,
        /// The variable holding the element index.
        index: usize,
        /// The variable that is read.
        value: usize,
    },
    /// A method invocation.
    Call(Call),
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::New { result, class } => write!(f, "%{result} = new {class}"),
            Stmt::Copy { result, value } => write!(f, "%{result} = %{value}"),
            Stmt::LoadStatic { result, field } => write!(f, "%{result} = {field}"),
            Stmt::StoreStatic { field, value } => write!(f, "{field} = %{value}"),
            Stmt::LoadField {
                result,
                base,
                field,
            } => write!(f, "%{result} = %{base}.{}", field.name),
            Stmt::StoreField { base, field, value } => {
                write!(f, "%{base}.{} = %{value}", field.name)
            }
            Stmt::LoadArray {
                result,
                base,
                index,
            } => write!(f, "%{result} = %{base}[%{index}]"),
            Stmt::StoreArray { base, index, value } => {
                write!(f, "%{base}[%{index}] = %{value}")
            }
            Stmt::Call(call) => call.fmt(f),
        }
    }
}

/// A method invocation statement.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Call {
    /// The dispatch kind of the call site.
    pub kind: CallKind,
    /// The method reference named at the call site.
    /// For receiver-based dispatch kinds this is only the starting point of the method lookup;
    /// the actually invoked method depends on the runtime type of the receiver object.
    pub callee: MethodRef,
    /// The variable holding the receiver object.
    /// `None` for static and dynamic call sites.
    pub receiver: Option<usize>,
    /// The variables holding the actual arguments, in parameter order.
    pub args: Vec<usize>,
    /// The variable the return value is assigned to, if the result is used.
    pub result: Option<usize>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "%{result} = ")?;
        }
        write!(f, "invoke{} ", self.kind)?;
        if let Some(receiver) = self.receiver {
            write!(f, "%{receiver}.")?;
        }
        write!(
            f,
            "{}({})",
            self.callee,
            self.args.iter().map(|arg| format!("%{arg}")).join(", ")
        )
    }
}

/// The dispatch kind of a call site.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy, Display)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    /// A call to a static method, resolved without a receiver object.
    #[display(fmt = "static")]
    Static,
    /// A call to a constructor, private method or superclass method.
    /// The invoked method is determined by the method reference, not by the receiver type.
    #[display(fmt = "special")]
    Special,
    /// A call dispatched on the runtime type of the receiver object.
    #[display(fmt = "virtual")]
    Virtual,
    /// A call through an interface, dispatched on the runtime type of the receiver object.
    #[display(fmt = "interface")]
    Interface,
    /// A call site whose target is produced at runtime.
    /// Such call sites cannot be resolved by this analysis.
    #[display(fmt = "dynamic")]
    Dynamic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_statements() {
        let store = Stmt::StoreField {
            base: 0,
            field: FieldRef {
                class: "A".to_string(),
                name: "f".to_string(),
            },
            value: 1,
        };
        assert_eq!(format!("{store}"), "%0.f = %1");
        let load = Stmt::LoadArray {
            result: 2,
            base: 0,
            index: 1,
        };
        assert_eq!(format!("{load}"), "%2 = %0[%1]");
        let call = Stmt::Call(Call {
            kind: CallKind::Virtual,
            callee: MethodRef::mock("A", "m", &["B"], "void"),
            receiver: Some(0),
            args: vec![1],
            result: None,
        });
        assert_eq!(format!("{call}"), "invokevirtual %0.A.m(B)(%1)");
    }
}
