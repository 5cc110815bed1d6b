//! Lowering of a grammar AST into the algebra.
//!
//! [`compile`] is generic over any [`Algebra`], so the same grammar document
//! yields a plain [`Interpreter`] instance and a [`Stepper`] instance without
//! either one knowing about the AST. The sibling [`types`] module walks the
//! AST the same way but produces field-type descriptions instead of terms.
//!
//! ## Lowering order of a part
//! 1. base term (`Ref` → `span(rule_call)`, class → `char_class`, literal →
//!    `literal` of the unescaped text)
//! 2. repetition suffix (`+`, `*`, `?`)
//! 3. `stringify`, over the whole repeated term when a suffix is present
//! 4. `span` of the part, for every term that is not a reference

use std::collections::{HashMap, HashSet};

use crate::algebra::{Algebra, CharClass, ClassItem};
use crate::ast::value::Value;
use crate::ast::{ClassPart, ClassTerm, Grammar, Ident, Part, Rule, Suffix, Term};
use crate::diagnostics::{ErrorContext, RelatedLabel};
use crate::runtime::context::DEFAULT_MAX_DEPTH;
use crate::runtime::interp::{self, Interpreter, Outcome};
use crate::runtime::registry::RuleRegistry;
use crate::runtime::step::{StepSession, Stepper};
use crate::runtime::trace::Trace;
use crate::{err_msg, err_span, PegError};

pub mod types;

// ============================================================================
// COMPILED GRAMMAR
// ============================================================================

/// A grammar bound to one interpretation: one term per declared rule.
pub struct Compiled<A: Algebra> {
    algebra: A,
    rules: RuleRegistry<A::Term>,
    max_depth: usize,
}

impl<A: Algebra> Compiled<A> {
    /// Compiles a grammar document.
    pub fn from_grammar(grammar: &Grammar, algebra: A) -> Result<Self, PegError> {
        compile(grammar, algebra)
    }

    /// Wraps terms that were built by hand against `algebra`.
    pub fn from_terms<N: AsRef<str>>(
        algebra: A,
        terms: impl IntoIterator<Item = (N, A::Term)>,
    ) -> Result<Self, PegError> {
        let terms: Vec<_> = terms.into_iter().collect();
        let mut rules = RuleRegistry::new();
        for (name, _) in &terms {
            rules.declare(name.as_ref())?;
        }
        for (name, term) in terms {
            rules.define(name.as_ref(), term)?;
        }
        Ok(Self {
            algebra,
            rules,
            max_depth: DEFAULT_MAX_DEPTH,
        })
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// The entry point of rule `name`.
    pub fn rule(&self, name: &str) -> Result<&A::Term, PegError> {
        self.rules.resolve(name)
    }

    pub fn rules(&self) -> &RuleRegistry<A::Term> {
        &self.rules
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.names()
    }

    /// The first declared rule, the default start rule.
    pub fn first_rule(&self) -> Option<&str> {
        self.rules.names().next()
    }

    pub fn algebra(&self) -> &A {
        &self.algebra
    }
}

impl Compiled<Interpreter> {
    /// Parses `input` in full with rule `start`.
    pub fn parse(&self, start: &str, input: &str) -> Result<Value, PegError> {
        interp::parse(&self.rules, start, input, self.max_depth)
    }

    /// Applies rule `start` without requiring the whole input to match.
    pub fn run(&self, start: &str, input: &str) -> Result<(Outcome, usize), PegError> {
        interp::run(&self.rules, start, input, self.max_depth)
    }
}

impl Compiled<Stepper> {
    /// Starts a suspended step session over `input`.
    pub fn session<'a>(&'a self, start: &str, input: &'a str) -> Result<StepSession<'a>, PegError> {
        StepSession::new(&self.rules, start, input, self.max_depth)
    }

    /// Runs a step session to the end and returns the collected trace.
    pub fn trace(&self, start: &str, input: &str) -> Result<Trace, PegError> {
        self.session(start, input)?.finish()
    }
}

// ============================================================================
// EXECUTION COMPILER
// ============================================================================

/// Compiles every rule of `grammar` against `algebra`.
///
/// # Errors
/// [`PegError::Grammar`] for a duplicate rule name or an inverted class
/// range. References to undeclared rules are not errors here; they fail when
/// first executed.
pub fn compile<A: Algebra>(grammar: &Grammar, algebra: A) -> Result<Compiled<A>, PegError> {
    let mut rules = RuleRegistry::new();
    let mut declared: HashMap<&str, &Ident> = HashMap::new();
    for rule in &grammar.rules {
        let name = rule.name();
        if let Some(first) = declared.get(name.name.as_str()) {
            return Err(duplicate_rule(first, name));
        }
        declared.insert(&name.name, name);
        rules.declare(&name.name)?;
    }
    for rule in &grammar.rules {
        let term = compile_rule(&algebra, rule)?;
        rules.define(&rule.name().name, term)?;
    }
    tracing::debug!(rules = rules.len(), "grammar compiled");
    Ok(Compiled {
        algebra,
        rules,
        max_depth: DEFAULT_MAX_DEPTH,
    })
}

fn duplicate_rule(first: &Ident, second: &Ident) -> PegError {
    PegError::Grammar {
        message: format!("duplicate rule '{}'", second.name),
        ctx: ErrorContext {
            span: Some(second.span),
            help: Some("every rule name must be declared once".to_string()),
            related: vec![RelatedLabel {
                span: first.span,
                label: "first declared here".to_string(),
            }],
            ..ErrorContext::none()
        },
        source: None,
    }
}

fn compile_rule<A: Algebra>(alg: &A, rule: &Rule) -> Result<A::Term, PegError> {
    match rule {
        Rule::Sequence(seq) => {
            let mut body = alg.empty();
            for part in &seq.parts {
                let term = compile_part(alg, part)?;
                body = match &part.field {
                    Some(field) => alg.sequence_append_named(body, &field.name, term),
                    None => alg.sequence_append(body, term),
                };
            }
            Ok(alg.tagged_rule(&seq.name.name, body))
        }
        Rule::Union(union) => {
            let body = union.cases.iter().fold(alg.never_match(), |acc, case| {
                let call = alg.span(case.span.start, case.span.end, alg.rule_call(&case.name));
                alg.or_else(acc, call)
            });
            Ok(alg.untagged_rule(&union.name.name, body))
        }
    }
}

fn compile_part<A: Algebra>(alg: &A, part: &Part) -> Result<A::Term, PegError> {
    let mut term = match &part.term {
        Term::Ref(ident) => alg.span(ident.span.start, ident.span.end, alg.rule_call(&ident.name)),
        Term::Class(class) => alg.char_class(compile_class(class)?),
        Term::Literal(lit) => alg.literal(&lit.value()),
    };
    term = match part.suffix {
        Some(Suffix::OneOrMore) => alg.one_or_more(term),
        Some(Suffix::ZeroOrMore) => alg.zero_or_more(term),
        Some(Suffix::Optional) => alg.optional(term),
        None => term,
    };
    if part.stringify {
        term = alg.stringify(term);
    }
    if !matches!(part.term, Term::Ref(_)) {
        term = alg.span(part.span.start, part.span.end, term);
    }
    Ok(term)
}

/// Builds the typed class of a `[...]` term.
pub fn compile_class(class: &ClassTerm) -> Result<CharClass, PegError> {
    let mut out = CharClass::new();
    if class.inverted {
        out = out.negated();
    }
    for part in &class.parts {
        out = match part {
            ClassPart::Single(ch) => out.item(ClassItem::Single(ch.value())),
            ClassPart::Range { from, to, span } => {
                let (lo, hi) = (from.value(), to.value());
                if lo > hi {
                    return Err(err_span!(
                        Grammar,
                        format!("inverted character range '{}-{}'", lo.escape_default(), hi.escape_default()),
                        *span
                    )
                    .with_help("write the lower bound of a range first"));
                }
                out.item(ClassItem::Range(lo, hi))
            }
        };
    }
    Ok(out)
}

// ============================================================================
// REFERENCE CHECK
// ============================================================================

/// References to rules the grammar never declares, in source order.
///
/// Compilation accepts such grammars, since resolution happens at first
/// execution; this lets tools warn about them up front.
pub fn unresolved_references(grammar: &Grammar) -> Vec<&Ident> {
    let declared: HashSet<&str> = grammar.rule_names().collect();
    let missing: Vec<&Ident> = grammar
        .rules
        .iter()
        .flat_map(Rule::references)
        .filter(|ident| !declared.contains(ident.name.as_str()))
        .collect();
    for ident in &missing {
        tracing::warn!(rule = %ident.name, span = %ident.span, "reference to undeclared rule");
    }
    missing
}

/// Fails with the first undeclared reference, if any.
pub fn check_references(grammar: &Grammar) -> Result<(), PegError> {
    match unresolved_references(grammar).first() {
        Some(ident) => Err(PegError::UnresolvedRule {
            message: ident.name.clone(),
            ctx: ErrorContext::with_span(ident.span),
            source: None,
        }),
        None => Ok(()),
    }
}

/// Fails if `grammar` has no rules to start from.
pub(crate) fn require_rules(grammar: &Grammar) -> Result<(), PegError> {
    if grammar.rules.is_empty() {
        return Err(err_msg!(Grammar, "grammar declares no rules"));
    }
    Ok(())
}
