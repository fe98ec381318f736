use crate::prelude::*;

/// A term identifier consisting of an ID string which is required to be unique
/// across the whole program under analysis.
///
/// Statements, methods and call sites are all identified by their `Tid`.
/// Since taint-flow reports refer to call sites by their `Tid`,
/// the ordering on `Tid`s (lexicographic on the ID string) determines the report order.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Tid {
    id: String,
}

impl Tid {
    /// Generate a new term identifier with the given ID string.
    pub fn new<T: ToString>(val: T) -> Tid {
        Tid { id: val.to_string() }
    }
}

impl std::fmt::Display for Tid {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "{}", self.id)
    }
}

/// A term is an object inside the program under analysis with a unique ID.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone)]
pub struct Term<T> {
    /// The term identifier.
    pub tid: Tid,
    /// The object.
    pub term: T,
}

#[cfg(test)]
impl<T> Term<T> {
    /// Wrap an object into a term with the given ID string.
    pub fn mock<S: ToString>(id: S, term: T) -> Term<T> {
        Term {
            tid: Tid::new(id),
            term,
        }
    }
}
