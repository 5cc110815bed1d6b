//! Plain recursive-descent interpretation of the grammar algebra.
//!
//! Each term is a closure over a [`ParseContext`]. A failed match is the
//! [`Outcome::Fail`] value, checked explicitly by every combinator; only fatal
//! conditions (unresolved rules, runaway repetition or recursion) travel as
//! `Err(PegError)`.

use std::fmt;
use std::rc::Rc;

use crate::algebra::{Algebra, CharClass};
use crate::ast::value::{Record, Value};
use crate::ast::Span;
use crate::diagnostics::to_error_source;
use crate::runtime::context::ParseContext;
use crate::runtime::registry::RuleRegistry;
use crate::{err_ctx, err_msg, PegError};

// ============================================================================
// OUTCOME
// ============================================================================

/// The result of applying a term: a value, or the Fail sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Matched(Value),
    /// No match. A sequence that failed part-way keeps the fields its
    /// successful parts captured, for diagnostics.
    Fail { partial: Option<Record> },
}

impl Outcome {
    pub fn fail() -> Self {
        Outcome::Fail { partial: None }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Matched(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Matched(v) => Some(v),
            Outcome::Fail { .. } => None,
        }
    }
}

// ============================================================================
// TERMS
// ============================================================================

// Nested rule calls recurse on the native stack. Below the red zone a call
// continues on a fresh segment, so depth is bounded by the nesting limit alone.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROWTH: usize = 2 * 1024 * 1024;

type RunFn = dyn Fn(&mut ParseContext<'_, PlainTerm>) -> Result<Outcome, PegError>;

/// An executable term of the plain interpreter.
#[derive(Clone)]
pub struct PlainTerm(Rc<RunFn>);

impl PlainTerm {
    fn new(
        f: impl Fn(&mut ParseContext<'_, PlainTerm>) -> Result<Outcome, PegError> + 'static,
    ) -> Self {
        PlainTerm(Rc::new(f))
    }

    /// Applies the term at the context's cursor.
    pub fn run(&self, ctx: &mut ParseContext<'_, PlainTerm>) -> Result<Outcome, PegError> {
        (self.0)(ctx)
    }
}

impl fmt::Debug for PlainTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlainTerm(..)")
    }
}

/// The plain interpretation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

fn repeat(term: PlainTerm, at_least_one: bool) -> PlainTerm {
    PlainTerm::new(move |ctx| {
        let mut items = Vec::new();
        loop {
            let start = ctx.position();
            match term.run(ctx)? {
                Outcome::Matched(value) => {
                    ctx.check_progress(start)?;
                    items.push(value);
                }
                Outcome::Fail { .. } => {
                    ctx.restore(start);
                    break;
                }
            }
        }
        if at_least_one && items.is_empty() {
            Ok(Outcome::fail())
        } else {
            Ok(Outcome::Matched(Value::List(items)))
        }
    })
}

impl Algebra for Interpreter {
    type Term = PlainTerm;

    fn literal(&self, value: &str) -> PlainTerm {
        let value = value.to_string();
        PlainTerm::new(move |ctx| {
            if ctx.eat_literal(&value) {
                Ok(Outcome::Matched(Value::Text(value.clone())))
            } else {
                Ok(Outcome::fail())
            }
        })
    }

    fn char_class(&self, class: CharClass) -> PlainTerm {
        PlainTerm::new(move |ctx| match ctx.eat_char(|c| class.matches(c)) {
            Some(c) => Ok(Outcome::Matched(Value::Text(c.to_string()))),
            None => Ok(Outcome::fail()),
        })
    }

    fn stringify(&self, term: PlainTerm) -> PlainTerm {
        PlainTerm::new(move |ctx| {
            let start = ctx.position();
            match term.run(ctx)? {
                Outcome::Matched(_) => {
                    let text = ctx.slice(start, ctx.position()).to_string();
                    Ok(Outcome::Matched(Value::Text(text)))
                }
                fail => Ok(fail),
            }
        })
    }

    fn optional(&self, term: PlainTerm) -> PlainTerm {
        PlainTerm::new(move |ctx| {
            let start = ctx.position();
            match term.run(ctx)? {
                Outcome::Matched(value) => Ok(Outcome::Matched(value)),
                Outcome::Fail { .. } => {
                    ctx.restore(start);
                    Ok(Outcome::Matched(Value::Absent))
                }
            }
        })
    }

    fn zero_or_more(&self, term: PlainTerm) -> PlainTerm {
        repeat(term, false)
    }

    fn one_or_more(&self, term: PlainTerm) -> PlainTerm {
        repeat(term, true)
    }

    fn rule_call(&self, name: &str) -> PlainTerm {
        let name = name.to_string();
        PlainTerm::new(move |ctx| {
            let term = ctx.resolve(&name)?;
            ctx.enter_rule(&name)?;
            let outcome = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || term.run(ctx));
            ctx.exit_rule();
            outcome
        })
    }

    fn empty(&self) -> PlainTerm {
        PlainTerm::new(|_| Ok(Outcome::Matched(Value::Record(Record::new()))))
    }

    fn sequence_append(&self, prev: PlainTerm, term: PlainTerm) -> PlainTerm {
        PlainTerm::new(move |ctx| match prev.run(ctx)? {
            Outcome::Matched(value) => match term.run(ctx)? {
                Outcome::Matched(_) => Ok(Outcome::Matched(value)),
                Outcome::Fail { .. } => Ok(Outcome::Fail {
                    partial: Some(value.into_record()),
                }),
            },
            fail => Ok(fail),
        })
    }

    fn sequence_append_named(&self, prev: PlainTerm, field: &str, term: PlainTerm) -> PlainTerm {
        let field = field.to_string();
        PlainTerm::new(move |ctx| match prev.run(ctx)? {
            Outcome::Matched(value) => {
                let mut record = value.into_record();
                match term.run(ctx)? {
                    Outcome::Matched(item) => {
                        record.insert(field.as_str(), item);
                        Ok(Outcome::Matched(Value::Record(record)))
                    }
                    Outcome::Fail { .. } => Ok(Outcome::Fail {
                        partial: Some(record),
                    }),
                }
            }
            fail => Ok(fail),
        })
    }

    fn never_match(&self) -> PlainTerm {
        PlainTerm::new(|_| Ok(Outcome::fail()))
    }

    fn or_else(&self, prev: PlainTerm, next: PlainTerm) -> PlainTerm {
        PlainTerm::new(move |ctx| {
            let start = ctx.position();
            match prev.run(ctx)? {
                Outcome::Matched(value) => Ok(Outcome::Matched(value)),
                Outcome::Fail { .. } => {
                    ctx.restore(start);
                    let outcome = next.run(ctx)?;
                    // A choice that fails as a whole leaves the cursor where it began.
                    if !outcome.is_match() {
                        ctx.restore(start);
                    }
                    Ok(outcome)
                }
            }
        })
    }

    fn tagged_rule(&self, name: &str, body: PlainTerm) -> PlainTerm {
        let name = name.to_string();
        PlainTerm::new(move |ctx| {
            let from = ctx.position();
            match body.run(ctx)? {
                Outcome::Matched(value) => {
                    let mut record = match value {
                        Value::Record(record) => record,
                        other => {
                            let mut record = Record::new();
                            record.insert("value", other);
                            record
                        }
                    };
                    record.tag = Some(name.clone());
                    record.span = Some(Span::new(from, ctx.position()));
                    Ok(Outcome::Matched(Value::Record(record)))
                }
                Outcome::Fail { partial } => Ok(Outcome::Fail {
                    partial: partial.map(|mut record| {
                        record.tag = Some(name.clone());
                        record
                    }),
                }),
            }
        })
    }

    fn untagged_rule(&self, _name: &str, body: PlainTerm) -> PlainTerm {
        body
    }

    fn span(&self, _from: usize, _to: usize, term: PlainTerm) -> PlainTerm {
        term
    }
}

// ============================================================================
// TOP-LEVEL ENTRY POINTS
// ============================================================================

/// Applies `start` to `input` without requiring the whole input to be consumed.
///
/// Returns the outcome and the cursor position it left behind.
pub fn run(
    rules: &RuleRegistry<PlainTerm>,
    start: &str,
    input: &str,
    max_depth: usize,
) -> Result<(Outcome, usize), PegError> {
    if rules.resolve(start).is_err() {
        return Err(err_msg!(Config, "unknown start rule '{}'", start));
    }
    // Entered through a call, so the start rule counts toward the nesting limit.
    let term = Interpreter.rule_call(start);
    let mut ctx = ParseContext::new(input, rules).with_max_depth(max_depth);
    let outcome = term.run(&mut ctx)?;
    Ok((outcome, ctx.position()))
}

/// Parses `input` with rule `start`, requiring it to match the whole input.
///
/// # Errors
/// [`PegError::Parse`] if the start rule fails or leaves input unconsumed;
/// the error's span is the offset where the cursor stopped.
pub fn parse(
    rules: &RuleRegistry<PlainTerm>,
    start: &str,
    input: &str,
    max_depth: usize,
) -> Result<Value, PegError> {
    let source = to_error_source("input", input);
    let (outcome, pos) = run(rules, start, input, max_depth).map_err(|e| e.with_source(&source))?;
    match outcome {
        Outcome::Matched(value) if pos == input.len() => Ok(value),
        Outcome::Matched(_) => Err(rejection(start, input, pos, true)),
        Outcome::Fail { .. } => Err(rejection(start, input, pos, false)),
    }
}

/// The error reported when a top-level parse is rejected at `pos`.
pub(crate) fn rejection(start: &str, input: &str, pos: usize, matched: bool) -> PegError {
    let source = to_error_source("input", input);
    if matched {
        err_ctx!(
            Parse,
            format!("rule '{}' stopped before the end of input", start),
            &source,
            Span::point(pos),
            format!("{} of {} bytes were consumed", pos, input.len())
        )
    } else {
        err_ctx!(
            Parse,
            format!("input does not match rule '{}'", start),
            &source,
            Span::point(pos)
        )
    }
}

#[cfg(test)]
mod interp_tests {
    use super::*;

    fn single(name: &str, term: PlainTerm) -> RuleRegistry<PlainTerm> {
        let mut rules = RuleRegistry::new();
        rules.declare(name).unwrap();
        rules.define(name, term).unwrap();
        rules
    }

    #[test]
    fn test_failed_choice_restores_cursor() {
        let i = Interpreter;
        let seq = |a: &str, b: &str| {
            i.sequence_append(i.sequence_append(i.empty(), i.literal(a)), i.literal(b))
        };
        let choice = i.or_else(i.or_else(i.never_match(), seq("a", "b")), seq("a", "c"));
        let rules = single("r", i.tagged_rule("r", choice));
        let (outcome, pos) = run(&rules, "r", "ax", 8).unwrap();
        assert!(!outcome.is_match());
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_start_rule_counts_toward_depth() {
        let i = Interpreter;
        let rules = single("r", i.tagged_rule("r", i.literal("x")));
        assert!(parse(&rules, "r", "x", 1).is_ok());
        let err = parse(&rules, "r", "x", 0).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Grammar);
    }
}
