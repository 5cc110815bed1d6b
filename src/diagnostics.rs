//!
//! Unified, `miette`-based diagnostics for the pegtrace engine.
//!
//! # Overview
//!
//! Every fatal condition produced while bootstrapping, compiling, or running a
//! grammar is a [`PegError`]. A failed match inside a combinator is *not* an
//! error: it is the [`Outcome::Fail`](crate::runtime::interp::Outcome) sentinel
//! threaded through the algebra. Only these conditions surface as `PegError`:
//!
//! - the start rule fails, or succeeds without consuming the whole input
//!   ([`PegError::Parse`]);
//! - a rule call names a rule that was never declared ([`PegError::UnresolvedRule`]);
//! - the grammar itself is malformed (duplicate rules, inverted class ranges,
//!   zero-width repetition, runaway recursion) ([`PegError::Grammar`]);
//! - configuration, I/O, and internal invariants.
//!
//! # Error Construction Macros
//!
//! - **Use `err_msg!` for message-only errors.**
//!   - `err_msg!(Grammar, "duplicate rule '{}'", name)`
//!
//! - **Use `err_ctx!` when a source and span are available.**
//!   - `err_ctx!(Parse, "unexpected input", &source, span)`
//!   - `err_ctx!(Parse, "unexpected input", &source, span, help)`
//!
//! Pass the source as `&SourceArc`; the macro clones the `Arc`.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::ast::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe classification of [`PegError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The subject text was rejected by the start rule.
    Parse,
    /// A rule call could not be resolved.
    UnresolvedRule,
    /// The grammar is malformed.
    Grammar,
    /// Bad configuration or unknown start rule.
    Config,
    /// File access failed.
    Io,
    /// Internal engine errors
    Internal,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Parse => "Parse",
            ErrorType::UnresolvedRule => "UnresolvedRule",
            ErrorType::Grammar => "Grammar",
            ErrorType::Config => "Config",
            ErrorType::Io => "Io",
            ErrorType::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single additional label for multi-span diagnostics.
#[derive(Debug, Clone)]
pub struct RelatedLabel {
    pub span: Span,
    pub label: String,
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default)]
pub struct ErrorContext {
    /// The primary source for this error (if any).
    pub source: Option<SourceArc>,
    /// The primary span for this error (if any).
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
    /// Additional labeled spans in the same source.
    pub related: Vec<RelatedLabel>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_span(span: Span) -> Self {
        Self {
            span: Some(span),
            ..Self::default()
        }
    }

    pub fn with_source_and_span(source: SourceArc, span: Span) -> Self {
        Self {
            source: Some(source),
            span: Some(span),
            ..Self::default()
        }
    }
}

/// Unified error type for every pegtrace failure mode.
#[derive(Debug, Error)]
pub enum PegError {
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Unresolved rule '{message}'")]
    UnresolvedRule {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Grammar error: {message}")]
    Grammar {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("I/O error: {message}")]
    Io {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl PegError {
    fn get_ctx(&self) -> &ErrorContext {
        match self {
            PegError::Parse { ctx, .. } => ctx,
            PegError::UnresolvedRule { ctx, .. } => ctx,
            PegError::Grammar { ctx, .. } => ctx,
            PegError::Config { ctx, .. } => ctx,
            PegError::Io { ctx, .. } => ctx,
            PegError::Internal { ctx, .. } => ctx,
        }
    }

    fn get_ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            PegError::Parse { ctx, .. } => ctx,
            PegError::UnresolvedRule { ctx, .. } => ctx,
            PegError::Grammar { ctx, .. } => ctx,
            PegError::Config { ctx, .. } => ctx,
            PegError::Io { ctx, .. } => ctx,
            PegError::Internal { ctx, .. } => ctx,
        }
    }

    /// Returns the type-safe error classification for this error.
    pub fn error_type(&self) -> ErrorType {
        match self {
            PegError::Parse { .. } => ErrorType::Parse,
            PegError::UnresolvedRule { .. } => ErrorType::UnresolvedRule,
            PegError::Grammar { .. } => ErrorType::Grammar,
            PegError::Config { .. } => ErrorType::Config,
            PegError::Io { .. } => ErrorType::Io,
            PegError::Internal { .. } => ErrorType::Internal,
        }
    }

    /// The bare message, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            PegError::Parse { message, .. }
            | PegError::UnresolvedRule { message, .. }
            | PegError::Grammar { message, .. }
            | PegError::Config { message, .. }
            | PegError::Io { message, .. }
            | PegError::Internal { message, .. } => message,
        }
    }

    /// The primary span, if the error carries one.
    ///
    /// For [`PegError::Parse`] this is the offset where the cursor stalled.
    pub fn span(&self) -> Option<Span> {
        self.get_ctx().span
    }

    /// Attaches a source to an error that does not carry one yet.
    pub fn with_source(mut self, source: &SourceArc) -> Self {
        let ctx = self.get_ctx_mut();
        if ctx.source.is_none() {
            ctx.source = Some(Arc::clone(source));
        }
        self
    }

    /// Attaches a source, replacing any source the error already carries.
    pub fn with_source_replaced(mut self, source: &SourceArc) -> Self {
        self.get_ctx_mut().source = Some(Arc::clone(source));
        self
    }

    /// Replaces the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.get_ctx_mut().help = Some(help.into());
        self
    }
}

impl Diagnostic for PegError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self.error_type() {
            ErrorType::Parse => "pegtrace::parse",
            ErrorType::UnresolvedRule => "pegtrace::unresolved_rule",
            ErrorType::Grammar => "pegtrace::grammar",
            ErrorType::Config => "pegtrace::config",
            ErrorType::Io => "pegtrace::io",
            ErrorType::Internal => "pegtrace::internal",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.get_ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.get_ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.get_ctx();
        // Labels without a source cannot be rendered.
        ctx.source.as_ref()?;
        let mut labels = Vec::new();
        if let Some(span) = ctx.span {
            labels.push(LabeledSpan::new(
                Some(self.message().to_string()),
                span.start,
                span.len(),
            ));
        }
        for rel in &ctx.related {
            labels.push(LabeledSpan::new(
                Some(rel.label.clone()),
                rel.span.start,
                rel.span.len(),
            ));
        }
        if labels.is_empty() {
            None
        } else {
            Some(Box::new(labels.into_iter()))
        }
    }
}

/// Converts a text into an `Arc<NamedSource<String>>` for use in error contexts.
pub fn to_error_source<S: AsRef<str>>(name: &str, source: S) -> SourceArc {
    Arc::new(NamedSource::new(name, source.as_ref().to_string()))
}

/// Constructs a PegError variant with a formatted message and no context.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $msg:expr, $($arg:expr),+ $(,)?) => {
        $crate::PegError::$variant {
            message: format!($msg, $($arg),+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
    ($variant:ident, $msg:expr) => {
        $crate::PegError::$variant {
            message: format!("{}", $msg),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a PegError variant with a message, a `&SourceArc`, a span, and an optional help text.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, $msg:expr, $src:expr, $span:expr, $help:expr) => {
        $crate::PegError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some($crate::diagnostics::SourceArc::clone($src)),
                span: Some($span),
                help: Some(format!("{}", $help)),
                related: vec![],
            },
            source: None,
        }
    };
    ($variant:ident, $msg:expr, $src:expr, $span:expr) => {
        $crate::PegError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext {
                source: Some($crate::diagnostics::SourceArc::clone($src)),
                span: Some($span),
                help: None,
                related: vec![],
            },
            source: None,
        }
    };
}

/// Constructs a PegError variant carrying only a span; the source is attached later.
#[macro_export]
macro_rules! err_span {
    ($variant:ident, $msg:expr, $span:expr) => {
        $crate::PegError::$variant {
            message: $msg.to_string(),
            ctx: $crate::ErrorContext::with_span($span),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn test_multilabel_diagnostics() {
        let src = to_error_source("grammar.peg", "a = b;\na = c;");
        let ctx = ErrorContext {
            source: Some(src),
            span: Some(Span::new(7, 8)),
            help: Some("rename one of the rules".to_string()),
            related: vec![RelatedLabel {
                span: Span::new(0, 1),
                label: "first declared here".to_string(),
            }],
        };
        let err = PegError::Grammar {
            message: "duplicate rule 'a'".to_string(),
            ctx,
            source: None,
        };
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("duplicate rule 'a'"));
        assert!(output.contains("first declared here"));
        assert!(output.contains("rename one of the rules"));
    }

    #[test]
    fn test_error_chaining() {
        let cause = err_msg!(Io, "missing file");
        let err = PegError::Config {
            message: "could not load config".to_string(),
            ctx: ErrorContext::none(),
            source: Some(Box::new(cause)),
        };
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("could not load config"));
        assert!(output.contains("missing file"));
    }

    #[test]
    fn test_macros_and_accessors() {
        let src = to_error_source("input", "hi ");
        let err = err_ctx!(Parse, "expected a letter", &src, Span::point(3), "add a name");
        assert_eq!(err.error_type(), ErrorType::Parse);
        assert_eq!(err.message(), "expected a letter");
        assert_eq!(err.span(), Some(Span::point(3)));

        let err = err_msg!(Grammar, "duplicate rule '{}'", "x");
        assert_eq!(err.to_string(), "Grammar error: duplicate rule 'x'");
        assert!(err.span().is_none());

        let err = err_span!(UnresolvedRule, "ghost", Span::new(1, 6)).with_source(&src);
        assert_eq!(err.error_type().as_str(), "UnresolvedRule");
        assert!(err.source_code().is_some());
    }
}
