//! This module defines the intermediate representation used to represent the program under analysis.
//!
//! The main data structure is the `Project` struct,
//! which contains the whole program in an already lowered three-address form.
//! Each class of the program is represented by a `Class` struct holding its methods,
//! and each method body is an ordered sequence of `Stmt` terms over typed, method-local variables.
//! The analysis consumes this representation as given;
//! constructing it from source or bytecode is the job of a frontend and not part of this crate.

mod term;
pub use term::*;
mod variable;
pub use variable::*;
mod stmt;
pub use stmt::*;
mod method;
pub use method::*;
mod class;
pub use class::*;
mod program;
pub use program::*;
