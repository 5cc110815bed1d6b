//! Grammar text: the meta-grammar and the parser built on it.

pub mod meta;
pub mod parser;

pub use meta::META_GRAMMAR;
pub use parser::{parse_grammar, parse_grammar_named};
