use super::{Method, Term};
use crate::prelude::*;
use std::fmt;

/// A class (or interface) of the analyzed program together with its declared methods.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Class {
    /// The name of the class. Class names are unique in the program.
    pub name: String,
    /// The name of the direct superclass, if any.
    /// Only the root of the hierarchy has no superclass.
    pub superclass: Option<String>,
    /// The names of the interfaces this class directly implements
    /// (for interfaces: directly extends).
    pub interfaces: Vec<String>,
    /// Set to `true` for interfaces.
    pub is_interface: bool,
    /// The methods declared by this class.
    pub methods: Vec<Term<Method>>,
}

/// A reference to a field by declaring class and field name.
///
/// Fields are not declared separately in the IR;
/// field accesses carry the full reference.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct FieldRef {
    /// The name of the class declaring the field.
    pub class: String,
    /// The name of the field.
    pub name: String,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

#[cfg(test)]
impl Class {
    /// Generate a class without superclass, interfaces or methods.
    pub fn mock(name: &str) -> Class {
        Class {
            name: name.to_string(),
            superclass: None,
            interfaces: Vec::new(),
            is_interface: false,
            methods: Vec::new(),
        }
    }
}

#[cfg(test)]
impl FieldRef {
    /// Generate a field reference from string slices.
    pub fn mock(class: &str, name: &str) -> FieldRef {
        FieldRef {
            class: class.to_string(),
            name: name.to_string(),
        }
    }
}
