//! Runtime interpretations of the grammar algebra.
//!
//! Both interpretations share one cursor model ([`context::ParseContext`]) and
//! one name-resolution scheme ([`registry::RuleRegistry`]):
//!
//! - [`interp`] runs terms as plain recursive-descent closures and builds
//!   [`Value`](crate::ast::value::Value)s.
//! - [`step`] runs the same grammar as a resumable session that yields
//!   [`trace::TraceEvent`]s, which [`nodes::NodeTree`] projects into a display
//!   tree.

pub mod context;
pub mod interp;
pub mod nodes;
pub mod registry;
pub mod step;
pub mod trace;

pub use context::{ParseContext, DEFAULT_MAX_DEPTH};
pub use interp::{Interpreter, Outcome, PlainTerm};
pub use nodes::{DisplayNode, NodeTree};
pub use registry::RuleRegistry;
pub use step::{StepSession, StepTerm, Stepper};
pub use trace::{NodeId, NodeKind, Trace, TraceEvent, Verdict};
