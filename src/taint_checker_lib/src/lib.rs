/*!
The main library of the taint_checker containing the pointer analysis and the taint analysis.

# What is the taint_checker

The taint_checker is a whole-program static analysis tool for Java-like programs
in three-address intermediate representation.
It computes, for every variable and heap field of the program,
which abstract objects it may point to at runtime,
using a context-sensitive, inclusion-based (Andersen-style) pointer analysis
that constructs the call graph on the fly:
virtual and interface calls are resolved against the computed points-to sets
rather than against static types,
and methods only become part of the analyzed world once a call edge into them is found.

On top of the pointer analysis rides a taint analysis:
values returned by configurable source methods are marked
and tracked through the points-to machinery,
across configurable transfer methods,
until they reach an argument of a configurable sink method.
The final report lists every such source-to-sink flow.

# Usage

If the taint_checker is installed locally, just run
```sh
taint_checker PROGRAM --config RULES
```
where `PROGRAM` is a program IR file produced by a frontend
and `RULES` is a taint rule file.
One can modify the behaviour of the taint_checker through the command line;
use the `--help` command line option for more information.

# Analysis structure

The [`intermediate_representation`](crate::intermediate_representation) module
defines the input model of the analysis.
The [`analysis::class_hierarchy`](crate::analysis::class_hierarchy) module
provides the resolved program view including virtual dispatch.
The pointer analysis engine and its context-sensitivity policies live in
[`analysis::pointer_analysis`](crate::analysis::pointer_analysis),
the taint rules and the taint overlay in
[`analysis::taint`](crate::analysis::taint).
*/

pub mod analysis;
pub mod intermediate_representation;
pub mod utils;

mod prelude {
    pub use serde::{Deserialize, Serialize};

    pub use crate::intermediate_representation::{Term, Tid};
    pub use anyhow::{anyhow, Context as _, Error};
}
