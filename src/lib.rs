//! pegtrace: one PEG grammar, many interpretations.
//!
//! A grammar is built through the operations of [`algebra::Algebra`]. The
//! [`compiler`] lowers grammar documents into any interpretation: the plain
//! interpreter builds value trees, the step interpreter produces a replayable
//! trace and a display tree, and the type-description walk produces a schema
//! report. Grammar text itself is read by a hand-built instance of the engine
//! (see [`syntax::meta`]).

pub use crate::diagnostics::{to_error_source, ErrorContext, ErrorType, PegError};

pub mod algebra;
pub mod ast;
pub mod cli;
pub mod compiler;
pub mod diagnostics;
pub mod engine;
pub mod runtime;
pub mod syntax;
