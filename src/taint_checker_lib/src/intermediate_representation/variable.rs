use crate::prelude::*;
use std::fmt::Display;

/// A variable represents a method-local value slot with a known name and static type.
///
/// Variables include the named locals of the source program as well as
/// temporaries introduced by the lowering to three-address form.
/// Statements refer to variables by their index into the containing method body's variable list.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub struct Variable {
    /// The name of the variable.
    pub name: String,
    /// The static type of the variable (the name of a class of the analyzed program).
    pub data_type: String,
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.name, self.data_type)
    }
}

#[cfg(test)]
impl Variable {
    /// Generate a variable with the given name and static type.
    pub fn mock(name: &str, data_type: &str) -> Variable {
        Variable {
            name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }
}
