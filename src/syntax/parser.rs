//! Grammar text parser.
//!
//! Converts grammar documents into [`Grammar`] ASTs by running the meta-grammar
//! under the plain interpreter and lowering its value tree with
//! [`crate::ast::builder`]. The hand-built meta-grammar instance is created
//! once per thread.

use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::ast::builder::grammar_from_value;
use crate::ast::{Grammar, Span};
use crate::compiler::Compiled;
use crate::diagnostics::to_error_source;
use crate::runtime::interp::Interpreter;
use crate::syntax::meta::{self, START_RULE};
use crate::PegError;

thread_local! {
    static BOOTSTRAP: OnceCell<Rc<Compiled<Interpreter>>> = const { OnceCell::new() };
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse grammar text into a grammar AST.
pub fn parse_grammar(text: &str) -> Result<Grammar, PegError> {
    parse_grammar_named("grammar", text)
}

/// Parse grammar text, naming the source `name` in diagnostics.
pub fn parse_grammar_named(name: &str, text: &str) -> Result<Grammar, PegError> {
    let meta = bootstrap()?;
    parse_grammar_with(&meta, name, text)
}

/// Parse grammar text with a given instance of the meta-grammar, e.g. one
/// compiled from [`meta::META_GRAMMAR`].
pub fn parse_grammar_with(
    meta: &Compiled<Interpreter>,
    name: &str,
    text: &str,
) -> Result<Grammar, PegError> {
    if text.trim().is_empty() {
        return Ok(Grammar {
            rules: Vec::new(),
            span: Span::new(0, text.len()),
        });
    }
    let source = to_error_source(name, text);
    let value = meta
        .parse(START_RULE, text)
        .map_err(|e| e.with_source_replaced(&source))?;
    let grammar = grammar_from_value(&value)?;
    tracing::debug!(source = name, rules = grammar.rules.len(), "grammar parsed");
    Ok(grammar)
}

/// The hand-built meta-grammar under the plain interpreter.
pub fn bootstrap() -> Result<Rc<Compiled<Interpreter>>, PegError> {
    BOOTSTRAP.with(|cell| {
        cell.get_or_try_init(|| meta::build(Interpreter).map(Rc::new))
            .cloned()
    })
}
