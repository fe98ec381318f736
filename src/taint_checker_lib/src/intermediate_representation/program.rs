use super::{Class, MethodRef};
use crate::prelude::*;
use std::collections::BTreeMap;

/// The program under analysis: all classes plus the single entry point.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Program {
    /// All classes of the program, keyed by class name.
    pub classes: BTreeMap<String, Class>,
    /// The method at which execution of the program starts.
    pub entry_point: MethodRef,
}

/// The `Project` struct is the top-level input of the analysis.
///
/// It is deserialized from the JSON file produced by a frontend
/// and contains the whole program in intermediate representation.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Project {
    /// The program under analysis.
    pub program: Program,
}

#[cfg(test)]
impl Program {
    /// Generate a program from a class list and an entry point reference.
    pub fn mock(classes: Vec<Class>, entry_point: MethodRef) -> Program {
        Program {
            classes: classes
                .into_iter()
                .map(|class| (class.name.clone(), class))
                .collect(),
            entry_point,
        }
    }
}
