use crate::ast::Span;
use crate::runtime::registry::RuleRegistry;
use crate::{err_span, PegError};

/// Default limit on nested rule calls.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// The state of one top-level parse: the subject text, the single cursor, and
/// the registry rule calls resolve through.
///
/// The cursor is a byte offset that always sits on a character boundary. It
/// only moves forward inside leaf matches, and only moves back when a
/// combinator restores a position it saved earlier.
pub struct ParseContext<'a, T> {
    input: &'a str,
    pos: usize,
    rules: &'a RuleRegistry<T>,
    depth: usize,
    max_depth: usize,
}

impl<'a, T> ParseContext<'a, T> {
    pub fn new(input: &'a str, rules: &'a RuleRegistry<T>) -> Self {
        Self {
            input,
            pos: 0,
            rules,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Rewinds (or re-advances) the cursor to a previously saved position.
    pub fn restore(&mut self, pos: usize) {
        debug_assert!(self.input.is_char_boundary(pos));
        self.pos = pos;
    }

    /// The substring between two saved positions.
    pub fn slice(&self, from: usize, to: usize) -> &'a str {
        &self.input[from..to]
    }

    /// Matches `value` at the cursor, advancing past it on success.
    pub fn eat_literal(&mut self, value: &str) -> bool {
        if self.input[self.pos..].starts_with(value) {
            self.pos += value.len();
            true
        } else {
            false
        }
    }

    /// Matches one character satisfying `pred`, advancing past it on success.
    pub fn eat_char(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        let ch = self.input[self.pos..].chars().next()?;
        if pred(ch) {
            self.pos += ch.len_utf8();
            Some(ch)
        } else {
            None
        }
    }

    /// Resolves a rule by name. The returned term borrows the registry, not
    /// the context, so it can run against `self`.
    pub fn resolve(&self, name: &str) -> Result<&'a T, PegError> {
        self.rules.resolve(name)
    }

    /// Enters a rule call, failing once the nesting limit is exceeded.
    pub fn enter_rule(&mut self, name: &str) -> Result<(), PegError> {
        if self.depth >= self.max_depth {
            return Err(err_span!(
                Grammar,
                format!(
                    "rule '{}' exceeded the nesting limit of {} calls",
                    name, self.max_depth
                ),
                Span::point(self.pos)
            )
            .with_help("raise max_depth, or check the grammar for runaway recursion"));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn exit_rule(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Fails when a repetition body succeeded without consuming input, which
    /// would otherwise loop forever.
    pub fn check_progress(&self, start: usize) -> Result<(), PegError> {
        if self.pos == start {
            return Err(err_span!(
                Grammar,
                "repetition matched without consuming input",
                Span::point(self.pos)
            )
            .with_help("the repeated term can succeed on empty input; make it consume at least one character"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;

    #[test]
    fn test_leaf_matches_advance_by_bytes() {
        let rules: RuleRegistry<()> = RuleRegistry::new();
        let mut ctx = ParseContext::new("héllo", &rules);
        assert!(ctx.eat_literal("h"));
        assert_eq!(ctx.eat_char(|c| c == 'é'), Some('é'));
        assert_eq!(ctx.position(), 3);
        assert!(!ctx.eat_literal("x"));
        assert_eq!(ctx.position(), 3);
        assert_eq!(ctx.slice(0, 3), "hé");
    }

    #[test]
    fn test_eat_char_at_end_fails() {
        let rules: RuleRegistry<()> = RuleRegistry::new();
        let mut ctx = ParseContext::new("", &rules);
        assert!(ctx.at_end());
        assert_eq!(ctx.eat_char(|_| true), None);
    }

    #[test]
    fn test_depth_limit() {
        let rules: RuleRegistry<()> = RuleRegistry::new();
        let mut ctx = ParseContext::new("", &rules).with_max_depth(2);
        ctx.enter_rule("a").unwrap();
        ctx.enter_rule("a").unwrap();
        assert!(ctx.enter_rule("a").is_err());
        ctx.exit_rule();
        assert!(ctx.enter_rule("a").is_ok());
    }
}
