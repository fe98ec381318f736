//! The analyses of this crate.
//!
//! The [`pointer_analysis`] module contains the context-sensitive, inclusion-based
//! pointer analysis with on-the-fly call graph construction that forms the core of this crate.
//! The [`taint`] module implements the taint-flow analysis that rides on top of it.
//! Both consume the resolved program view provided by the [`class_hierarchy`] module.

pub mod class_hierarchy;
pub mod pointer_analysis;
pub mod taint;
