//! AST module for grammar descriptions
//!
//! This module provides the syntax tree of a grammar document, with source
//! location tracking on every node. A document is produced by the bootstrap
//! parser in [`crate::syntax`] and consumed by the compilers in
//! [`crate::compiler`].

// ============================================================================
// IMPORTS
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod builder;
pub mod value;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Represents a half-open byte range `[start, end)` in a source text.
///
/// # Examples
///
/// ```rust
/// use pegtrace::ast::Span;
/// let span = Span::new(0, 5);
/// assert_eq!(span.len(), 5);
/// assert!(Span::point(3).is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `offset`.
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A whole grammar document: an ordered list of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    pub rules: Vec<Rule>,
    pub span: Span,
}

/// A named identifier with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A grammar rule: either a sequence with a shape of its own, or a union
/// delegating to one of several other rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Rule {
    Sequence(SequenceRule),
    Union(UnionRule),
}

/// `name = part+ ;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRule {
    pub name: Ident,
    pub parts: Vec<Part>,
    pub span: Span,
}

/// `name : case+ ;`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionRule {
    pub name: Ident,
    pub cases: Vec<Ident>,
    pub span: Span,
}

/// One element of a sequence: `[field:]? [$]? term [+*?]?`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub field: Option<Ident>,
    pub stringify: bool,
    pub term: Term,
    pub suffix: Option<Suffix>,
    pub span: Span,
}

/// Repetition suffix of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suffix {
    /// `+`
    OneOrMore,
    /// `*`
    ZeroOrMore,
    /// `?`
    Optional,
}

/// The matchable core of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Term {
    /// A reference to another rule by name.
    Ref(Ident),
    /// `[...]`
    Class(ClassTerm),
    /// `'...'` or `"..."`
    Literal(LiteralTerm),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTerm {
    pub inverted: bool,
    pub parts: Vec<ClassPart>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClassPart {
    Range {
        from: SourceChar,
        to: SourceChar,
        span: Span,
    },
    Single(SourceChar),
}

/// Which quote delimits a string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quote {
    Single,
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralTerm {
    pub quote: Quote,
    pub chars: Vec<SourceChar>,
    pub span: Span,
}

/// A character as written in a class or literal: either raw, or the
/// character following a backslash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChar {
    pub ch: char,
    pub escaped: bool,
    pub span: Span,
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Grammar {
    /// Finds a rule by name.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name().name == name)
    }

    /// Rule names in declaration order.
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name().name.as_str())
    }
}

impl Rule {
    pub fn name(&self) -> &Ident {
        match self {
            Rule::Sequence(seq) => &seq.name,
            Rule::Union(union) => &union.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Rule::Sequence(seq) => seq.span,
            Rule::Union(union) => union.span,
        }
    }

    /// Every rule name this rule refers to, in source order.
    pub fn references(&self) -> Vec<&Ident> {
        match self {
            Rule::Sequence(seq) => seq
                .parts
                .iter()
                .filter_map(|part| match &part.term {
                    Term::Ref(ident) => Some(ident),
                    _ => None,
                })
                .collect(),
            Rule::Union(union) => union.cases.iter().collect(),
        }
    }
}

impl Term {
    pub fn span(&self) -> Span {
        match self {
            Term::Ref(ident) => ident.span,
            Term::Class(class) => class.span,
            Term::Literal(lit) => lit.span,
        }
    }
}

impl Suffix {
    pub fn as_char(&self) -> char {
        match self {
            Suffix::OneOrMore => '+',
            Suffix::ZeroOrMore => '*',
            Suffix::Optional => '?',
        }
    }
}

impl SourceChar {
    pub fn raw(ch: char, span: Span) -> Self {
        Self {
            ch,
            escaped: false,
            span,
        }
    }

    pub fn escaped(ch: char, span: Span) -> Self {
        Self {
            ch,
            escaped: true,
            span,
        }
    }

    /// The character this source character denotes.
    ///
    /// `\r`, `\n` and `\t` map to control characters; every other escape
    /// denotes the escaped character itself.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pegtrace::ast::{SourceChar, Span};
    /// assert_eq!(SourceChar::escaped('n', Span::default()).value(), '\n');
    /// assert_eq!(SourceChar::escaped('"', Span::default()).value(), '"');
    /// assert_eq!(SourceChar::raw('n', Span::default()).value(), 'n');
    /// ```
    pub fn value(&self) -> char {
        if !self.escaped {
            return self.ch;
        }
        match self.ch {
            'r' => '\r',
            'n' => '\n',
            't' => '\t',
            other => other,
        }
    }
}

impl LiteralTerm {
    /// The unescaped text of the literal.
    pub fn value(&self) -> String {
        self.chars.iter().map(SourceChar::value).collect()
    }
}

// ============================================================================
// DISPLAY
// ============================================================================

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in &self.rules {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Sequence(seq) => {
                write!(f, "{} =", seq.name.name)?;
                for part in &seq.parts {
                    write!(f, " {part}")?;
                }
                write!(f, ";")
            }
            Rule::Union(union) => {
                write!(f, "{} :", union.name.name)?;
                for case in &union.cases {
                    write!(f, " {}", case.name)?;
                }
                write!(f, ";")
            }
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{}:", field.name)?;
        }
        if self.stringify {
            write!(f, "$")?;
        }
        write!(f, "{}", self.term)?;
        if let Some(suffix) = self.suffix {
            write!(f, "{}", suffix.as_char())?;
        }
        Ok(())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Ref(ident) => write!(f, "{}", ident.name),
            Term::Class(class) => {
                write!(f, "[")?;
                if class.inverted {
                    write!(f, "^")?;
                }
                for part in &class.parts {
                    match part {
                        ClassPart::Range { from, to, .. } => {
                            write!(f, "{}-{}", SourceDisplay(from), SourceDisplay(to))?
                        }
                        ClassPart::Single(ch) => write!(f, "{}", SourceDisplay(ch))?,
                    }
                }
                write!(f, "]")
            }
            Term::Literal(lit) => {
                let quote = match lit.quote {
                    Quote::Single => '\'',
                    Quote::Double => '"',
                };
                write!(f, "{quote}")?;
                for ch in &lit.chars {
                    write!(f, "{}", SourceDisplay(ch))?;
                }
                write!(f, "{quote}")
            }
        }
    }
}

struct SourceDisplay<'a>(&'a SourceChar);

impl fmt::Display for SourceDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.escaped {
            write!(f, "\\{}", self.0.ch)
        } else {
            write!(f, "{}", self.0.ch)
        }
    }
}
