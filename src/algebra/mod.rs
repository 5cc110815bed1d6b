//! The grammar algebra.
//!
//! A grammar is never stored as a data structure that interpreters walk.
//! Instead it is *built* by calling the operations of [`Algebra`], and each
//! interpretation supplies its own implementation: the plain interpreter
//! builds executable closures, the step interpreter builds a term graph for its
//! suspendable machine. The compiler in [`crate::compiler`] and the
//! hand-written meta-grammar in [`crate::syntax::meta`] are generic over any
//! `Algebra`, so one grammar description runs under every interpretation.
//!
//! Construction has no side effects: cursor movement and failure happen only
//! when a built term is later applied to a parse context.

mod class;

pub use class::{CharClass, ClassItem};

/// The operation set every interpretation implements.
///
/// Sequences are built left to right from [`empty`](Algebra::empty) with
/// [`sequence_append`](Algebra::sequence_append) and
/// [`sequence_append_named`](Algebra::sequence_append_named); choices are
/// built from [`never_match`](Algebra::never_match) with
/// [`or_else`](Algebra::or_else).
pub trait Algebra {
    /// An executable unit of this interpretation. Cheap to clone.
    type Term: Clone;

    /// Matches `value` exactly at the cursor.
    fn literal(&self, value: &str) -> Self::Term;

    /// Matches a single character belonging to `class`.
    fn char_class(&self, class: CharClass) -> Self::Term;

    /// Yields the exact substring consumed by `term` instead of its value.
    fn stringify(&self, term: Self::Term) -> Self::Term;

    /// Never fails; yields "absent" when `term` does not match.
    fn optional(&self, term: Self::Term) -> Self::Term;

    /// Greedy repetition, zero or more times.
    fn zero_or_more(&self, term: Self::Term) -> Self::Term;

    /// Greedy repetition, at least once.
    fn one_or_more(&self, term: Self::Term) -> Self::Term;

    /// Calls a rule by name. The name is resolved through the rule registry
    /// when the term runs, never at construction, so rules may refer to
    /// themselves and to each other in any order.
    fn rule_call(&self, name: &str) -> Self::Term;

    /// The neutral start of a sequence: matches nothing, yields no fields.
    fn empty(&self) -> Self::Term;

    /// Appends a part whose value is discarded.
    fn sequence_append(&self, prev: Self::Term, term: Self::Term) -> Self::Term;

    /// Appends a part whose value is captured as field `field`.
    fn sequence_append_named(&self, prev: Self::Term, field: &str, term: Self::Term)
        -> Self::Term;

    /// The neutral start of a choice: always fails.
    fn never_match(&self) -> Self::Term;

    /// Ordered choice: `next` is tried only if `prev` fails.
    fn or_else(&self, prev: Self::Term, next: Self::Term) -> Self::Term;

    /// Wraps a sequence rule's body: tags its record with `name` and the
    /// span it matched.
    fn tagged_rule(&self, name: &str, body: Self::Term) -> Self::Term;

    /// Wraps a union rule's body: brackets it with rule enter/exit but adds
    /// nothing to the delegated value.
    fn untagged_rule(&self, name: &str, body: Self::Term) -> Self::Term;

    /// Annotates `term` with the grammar-source range it was compiled from.
    /// Semantically transparent.
    fn span(&self, from: usize, to: usize, term: Self::Term) -> Self::Term;
}
