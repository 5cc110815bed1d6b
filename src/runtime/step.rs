//! Instrumented step interpretation of the grammar algebra.
//!
//! Terms built by [`Stepper`] form a graph that a [`StepSession`] executes
//! with an explicit frame stack instead of the Rust call stack. That makes the
//! session a pull-based iterator: each call to [`StepSession::step`] does just
//! enough work to produce the next [`TraceEvent`], so a driver can pace the
//! parse one visible step at a time, or abandon it at any point.
//!
//! Matching semantics are identical to the plain interpreter; the session
//! additionally projects every value into the display tree addressed by
//! [`NodeId`]s (see [`crate::runtime::nodes`]).
//!
//! # Emitted events
//!
//! | Construct        | Events                                                              |
//! |------------------|---------------------------------------------------------------------|
//! | literal / class  | on match: `setText`, `setKind(text)`, `consume`                      |
//! | stringify        | inner runs into a scratch node; on match: `setText`, `setKind(text)` |
//! | optional         | on miss: `rollback`, `reset`, `setText(null)`, `setKind(absent)`     |
//! | repetition       | `setText([])`, `setKind(list)`, `attach` per attempt; on the final miss: `rollback`, `detach` |
//! | sequence         | `attach` + `setPrefix` for every named part, before any part runs    |
//! | choice           | `reset` before each alternative, `rollback` after each failed one    |
//! | tagged rule      | `ruleEnter`, `setText(name)`, `setKind(record)` ... `ruleExit`       |
//! | untagged rule    | `ruleEnter` ... `ruleExit`                                           |
//! | span             | `sourceSpan`                                                         |

use std::collections::VecDeque;
use std::rc::Rc;

use crate::algebra::{Algebra, CharClass};
use crate::runtime::context::ParseContext;
use crate::runtime::interp::rejection;
use crate::runtime::registry::RuleRegistry;
use crate::runtime::trace::{NodeId, NodeKind, Trace, TraceEvent, Verdict};
use crate::{err_msg, PegError};

// ============================================================================
// TERMS
// ============================================================================

/// A term of the step interpretation.
#[derive(Debug, Clone)]
pub struct StepTerm(Rc<StepOp>);

#[derive(Debug)]
enum StepOp {
    Literal(String),
    Class(CharClass),
    Stringify(StepTerm),
    Optional(StepTerm),
    Repeat { term: StepTerm, at_least_one: bool },
    Call(String),
    Sequence(Rc<Vec<SeqPart>>),
    Choice(Rc<Vec<StepTerm>>),
    Tagged { name: String, body: StepTerm },
    Untagged { name: String, body: StepTerm },
    Span { from: usize, to: usize, term: StepTerm },
}

#[derive(Debug, Clone)]
struct SeqPart {
    field: Option<String>,
    term: StepTerm,
}

impl StepTerm {
    fn new(op: StepOp) -> Self {
        StepTerm(Rc::new(op))
    }

    fn parts(&self) -> Vec<SeqPart> {
        match &*self.0 {
            StepOp::Sequence(parts) => parts.as_ref().clone(),
            _ => vec![SeqPart {
                field: None,
                term: self.clone(),
            }],
        }
    }

    fn alternatives(&self) -> Vec<StepTerm> {
        match &*self.0 {
            StepOp::Choice(alts) => alts.as_ref().clone(),
            _ => vec![self.clone()],
        }
    }
}

/// The step interpretation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stepper;

impl Algebra for Stepper {
    type Term = StepTerm;

    fn literal(&self, value: &str) -> StepTerm {
        StepTerm::new(StepOp::Literal(value.to_string()))
    }

    fn char_class(&self, class: CharClass) -> StepTerm {
        StepTerm::new(StepOp::Class(class))
    }

    fn stringify(&self, term: StepTerm) -> StepTerm {
        StepTerm::new(StepOp::Stringify(term))
    }

    fn optional(&self, term: StepTerm) -> StepTerm {
        StepTerm::new(StepOp::Optional(term))
    }

    fn zero_or_more(&self, term: StepTerm) -> StepTerm {
        StepTerm::new(StepOp::Repeat {
            term,
            at_least_one: false,
        })
    }

    fn one_or_more(&self, term: StepTerm) -> StepTerm {
        StepTerm::new(StepOp::Repeat {
            term,
            at_least_one: true,
        })
    }

    fn rule_call(&self, name: &str) -> StepTerm {
        StepTerm::new(StepOp::Call(name.to_string()))
    }

    fn empty(&self) -> StepTerm {
        StepTerm::new(StepOp::Sequence(Rc::new(Vec::new())))
    }

    fn sequence_append(&self, prev: StepTerm, term: StepTerm) -> StepTerm {
        let mut parts = prev.parts();
        parts.push(SeqPart { field: None, term });
        StepTerm::new(StepOp::Sequence(Rc::new(parts)))
    }

    fn sequence_append_named(&self, prev: StepTerm, field: &str, term: StepTerm) -> StepTerm {
        let mut parts = prev.parts();
        parts.push(SeqPart {
            field: Some(field.to_string()),
            term,
        });
        StepTerm::new(StepOp::Sequence(Rc::new(parts)))
    }

    fn never_match(&self) -> StepTerm {
        StepTerm::new(StepOp::Choice(Rc::new(Vec::new())))
    }

    fn or_else(&self, prev: StepTerm, next: StepTerm) -> StepTerm {
        let mut alts = prev.alternatives();
        alts.push(next);
        StepTerm::new(StepOp::Choice(Rc::new(alts)))
    }

    fn tagged_rule(&self, name: &str, body: StepTerm) -> StepTerm {
        StepTerm::new(StepOp::Tagged {
            name: name.to_string(),
            body,
        })
    }

    fn untagged_rule(&self, name: &str, body: StepTerm) -> StepTerm {
        StepTerm::new(StepOp::Untagged {
            name: name.to_string(),
            body,
        })
    }

    fn span(&self, from: usize, to: usize, term: StepTerm) -> StepTerm {
        StepTerm::new(StepOp::Span { from, to, term })
    }
}

// ============================================================================
// SESSION MACHINE
// ============================================================================

/// Pending work on the session's explicit stack. `Enter` starts a term; every
/// other frame is the continuation of a composite term, resumed with the
/// outcome of the child that just finished.
#[derive(Debug)]
enum Frame {
    Enter {
        term: StepTerm,
        node: NodeId,
    },
    Stringify {
        node: NodeId,
        start: usize,
    },
    // `opened` counts the events emitted before the attempt began.
    Optional {
        node: NodeId,
        start: usize,
        opened: usize,
    },
    Repeat {
        term: StepTerm,
        node: NodeId,
        start: usize,
        opened: usize,
        count: usize,
        at_least_one: bool,
    },
    Sequence {
        parts: Rc<Vec<SeqPart>>,
        children: Rc<[NodeId]>,
        index: usize,
    },
    Choice {
        alts: Rc<Vec<StepTerm>>,
        node: NodeId,
        start: usize,
        opened: usize,
        index: usize,
    },
    RuleExit {
        name: String,
    },
    CallReturn,
}

/// One suspended, resumable parse under the step interpretation.
///
/// Implements [`Iterator`] over `Result<TraceEvent, PegError>`; the iterator
/// ends after the last event, or right after a fatal error.
pub struct StepSession<'a> {
    ctx: ParseContext<'a, StepTerm>,
    start_rule: String,
    stack: Vec<Frame>,
    outbox: VecDeque<TraceEvent>,
    emitted: usize,
    /// Outcome of the most recently finished term.
    matched: bool,
    next_node: u32,
    rule_stack: Vec<String>,
    verdict: Option<Verdict>,
    halted: bool,
    #[cfg(test)]
    rollback_log: Vec<(&'static str, usize, usize)>,
}

impl<'a> StepSession<'a> {
    /// Prepares a session; no work happens until the first step.
    pub fn new(
        rules: &'a RuleRegistry<StepTerm>,
        start: &str,
        input: &'a str,
        max_depth: usize,
    ) -> Result<Self, PegError> {
        if rules.resolve(start).is_err() {
            return Err(err_msg!(Config, "unknown start rule '{}'", start));
        }
        let entry = Frame::Enter {
            term: StepTerm::new(StepOp::Call(start.to_string())),
            node: NodeId::ROOT,
        };
        Ok(Self {
            ctx: ParseContext::new(input, rules).with_max_depth(max_depth),
            start_rule: start.to_string(),
            stack: vec![entry],
            outbox: VecDeque::new(),
            emitted: 0,
            matched: false,
            next_node: NodeId::ROOT.0 + 1,
            rule_stack: Vec::new(),
            verdict: None,
            halted: false,
            #[cfg(test)]
            rollback_log: Vec::new(),
        })
    }

    /// Advances to the next event. `Ok(None)` once the parse is over.
    pub fn step(&mut self) -> Result<Option<TraceEvent>, PegError> {
        loop {
            if let Some(event) = self.outbox.pop_front() {
                self.track(&event);
                return Ok(Some(event));
            }
            if self.halted {
                return Ok(None);
            }
            let Some(frame) = self.stack.pop() else {
                self.conclude();
                return Ok(None);
            };
            if let Err(err) = self.advance(frame) {
                self.halted = true;
                self.stack.clear();
                self.outbox.clear();
                let source = crate::diagnostics::to_error_source("input", self.ctx.input());
                return Err(err.with_source(&source));
            }
        }
    }

    /// Runs the session to the end, collecting every remaining event.
    pub fn finish(mut self) -> Result<Trace, PegError> {
        let mut events = Vec::new();
        while let Some(event) = self.step()? {
            events.push(event);
        }
        let verdict = self
            .verdict
            .ok_or_else(|| err_msg!(Internal, "step session ended without a verdict"))?;
        Ok(Trace { events, verdict })
    }

    /// The verdict, once the last event has been produced.
    pub fn verdict(&self) -> Option<Verdict> {
        self.verdict
    }

    /// Turns the verdict into the top-level parse result: the consumed length,
    /// or the same [`PegError::Parse`] the plain interpreter reports.
    pub fn outcome(&self) -> Option<Result<usize, PegError>> {
        self.verdict.map(|verdict| match verdict {
            Verdict::Accepted { consumed } => Ok(consumed),
            Verdict::Rejected { position, matched } => Err(rejection(
                &self.start_rule,
                self.ctx.input(),
                position,
                matched,
            )),
        })
    }

    pub fn position(&self) -> usize {
        self.ctx.position()
    }

    /// Names of the rules entered and not yet exited, outermost first, as of
    /// the last event returned.
    pub fn call_stack(&self) -> &[String] {
        &self.rule_stack
    }

    pub fn is_finished(&self) -> bool {
        self.halted && self.outbox.is_empty()
    }

    // ------------------------------------------------------------------------

    fn track(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::RuleEnter { name } => self.rule_stack.push(name.clone()),
            TraceEvent::RuleExit { .. } => {
                self.rule_stack.pop();
            }
            _ => {}
        }
    }

    fn conclude(&mut self) {
        let position = self.ctx.position();
        let verdict = if self.matched && self.ctx.at_end() {
            Verdict::Accepted { consumed: position }
        } else {
            Verdict::Rejected {
                position,
                matched: self.matched,
            }
        };
        tracing::debug!(rule = %self.start_rule, ?verdict, "step session finished");
        self.verdict = Some(verdict);
        self.halted = true;
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    fn emit(&mut self, event: TraceEvent) {
        self.emitted += 1;
        self.outbox.push_back(event);
    }

    /// Returns the cursor to `start`, where the attempt of `kind` opened.
    fn rollback(&mut self, kind: &'static str, start: usize, opened: usize) {
        tracing::trace!(kind, pos = start, opened, "rollback");
        #[cfg(test)]
        self.rollback_log.push((kind, opened, start));
        self.ctx.restore(start);
        self.emit(TraceEvent::Rollback { pos: start });
    }

    fn set_text(&mut self, node: NodeId, text: String, kind: NodeKind) {
        self.emit(TraceEvent::SetText { node, text });
        self.emit(TraceEvent::SetKind { node, kind });
    }

    fn begin_attempt(&mut self, term: StepTerm, node: NodeId, count: usize, at_least_one: bool) {
        let child = self.alloc();
        self.emit(TraceEvent::Attach {
            parent: node,
            index: count,
            child,
        });
        self.stack.push(Frame::Repeat {
            term: term.clone(),
            node,
            start: self.ctx.position(),
            opened: self.emitted,
            count,
            at_least_one,
        });
        self.stack.push(Frame::Enter { term, node: child });
    }

    fn advance(&mut self, frame: Frame) -> Result<(), PegError> {
        match frame {
            Frame::Enter { term, node } => self.enter(&term, node)?,
            Frame::Stringify { node, start } => {
                if self.matched {
                    let text = self.ctx.slice(start, self.ctx.position());
                    self.set_text(node, quote(text), NodeKind::Text);
                }
            }
            Frame::Optional {
                node,
                start,
                opened,
            } => {
                if !self.matched {
                    self.rollback("optional", start, opened);
                    self.emit(TraceEvent::Reset { node });
                    self.set_text(node, "null".to_string(), NodeKind::Absent);
                    self.matched = true;
                }
            }
            Frame::Repeat {
                term,
                node,
                start,
                opened,
                count,
                at_least_one,
            } => {
                if self.matched {
                    self.ctx.check_progress(start)?;
                    self.begin_attempt(term, node, count + 1, at_least_one);
                } else {
                    self.rollback("repeat", start, opened);
                    self.emit(TraceEvent::Detach { parent: node });
                    self.matched = count > 0 || !at_least_one;
                }
            }
            Frame::Sequence {
                parts,
                children,
                index,
            } => {
                let next = index + 1;
                if self.matched && next < parts.len() {
                    let term = parts[next].term.clone();
                    let node = children[next];
                    self.stack.push(Frame::Sequence {
                        parts,
                        children,
                        index: next,
                    });
                    self.stack.push(Frame::Enter { term, node });
                }
            }
            Frame::Choice {
                alts,
                node,
                start,
                opened,
                index,
            } => {
                if !self.matched {
                    self.rollback("choice", start, opened);
                    let next = index + 1;
                    if next < alts.len() {
                        let term = alts[next].clone();
                        self.emit(TraceEvent::Reset { node });
                        self.stack.push(Frame::Choice {
                            alts,
                            node,
                            start,
                            opened,
                            index: next,
                        });
                        self.stack.push(Frame::Enter { term, node });
                    }
                }
            }
            Frame::RuleExit { name } => self.emit(TraceEvent::RuleExit { name }),
            Frame::CallReturn => self.ctx.exit_rule(),
        }
        Ok(())
    }

    fn enter(&mut self, term: &StepTerm, node: NodeId) -> Result<(), PegError> {
        match &*term.0 {
            StepOp::Literal(value) => {
                self.matched = self.ctx.eat_literal(value);
                if self.matched {
                    self.set_text(node, quote(value), NodeKind::Text);
                    self.emit(TraceEvent::Consume {
                        pos: self.ctx.position(),
                    });
                }
            }
            StepOp::Class(class) => {
                let hit = self.ctx.eat_char(|c| class.matches(c));
                self.matched = hit.is_some();
                if let Some(ch) = hit {
                    self.set_text(node, quote(ch.encode_utf8(&mut [0; 4])), NodeKind::Text);
                    self.emit(TraceEvent::Consume {
                        pos: self.ctx.position(),
                    });
                }
            }
            StepOp::Stringify(inner) => {
                let scratch = self.alloc();
                self.stack.push(Frame::Stringify {
                    node,
                    start: self.ctx.position(),
                });
                self.stack.push(Frame::Enter {
                    term: inner.clone(),
                    node: scratch,
                });
            }
            StepOp::Optional(inner) => {
                self.stack.push(Frame::Optional {
                    node,
                    start: self.ctx.position(),
                    opened: self.emitted,
                });
                self.stack.push(Frame::Enter {
                    term: inner.clone(),
                    node,
                });
            }
            StepOp::Repeat { term, at_least_one } => {
                self.set_text(node, "[]".to_string(), NodeKind::List);
                self.begin_attempt(term.clone(), node, 0, *at_least_one);
            }
            StepOp::Call(name) => {
                let target = self.ctx.resolve(name)?.clone();
                self.ctx.enter_rule(name)?;
                self.stack.push(Frame::CallReturn);
                self.stack.push(Frame::Enter { term: target, node });
            }
            StepOp::Sequence(parts) => {
                if parts.is_empty() {
                    self.matched = true;
                    return Ok(());
                }
                let mut children = Vec::with_capacity(parts.len());
                let mut field_index = 0;
                for part in parts.iter() {
                    let child = self.alloc();
                    if let Some(field) = &part.field {
                        self.emit(TraceEvent::Attach {
                            parent: node,
                            index: field_index,
                            child,
                        });
                        self.emit(TraceEvent::SetPrefix {
                            node: child,
                            prefix: field.clone(),
                        });
                        field_index += 1;
                    }
                    children.push(child);
                }
                let first = parts[0].term.clone();
                let first_node = children[0];
                self.stack.push(Frame::Sequence {
                    parts: Rc::clone(parts),
                    children: children.into(),
                    index: 0,
                });
                self.stack.push(Frame::Enter {
                    term: first,
                    node: first_node,
                });
            }
            StepOp::Choice(alts) => {
                if alts.is_empty() {
                    self.matched = false;
                    return Ok(());
                }
                self.emit(TraceEvent::Reset { node });
                self.stack.push(Frame::Choice {
                    alts: Rc::clone(alts),
                    node,
                    start: self.ctx.position(),
                    opened: self.emitted,
                    index: 0,
                });
                self.stack.push(Frame::Enter {
                    term: alts[0].clone(),
                    node,
                });
            }
            StepOp::Tagged { name, body } => {
                self.emit(TraceEvent::RuleEnter { name: name.clone() });
                self.set_text(node, name.clone(), NodeKind::Record);
                self.stack.push(Frame::RuleExit { name: name.clone() });
                self.stack.push(Frame::Enter {
                    term: body.clone(),
                    node,
                });
            }
            StepOp::Untagged { name, body } => {
                self.emit(TraceEvent::RuleEnter { name: name.clone() });
                self.stack.push(Frame::RuleExit { name: name.clone() });
                self.stack.push(Frame::Enter {
                    term: body.clone(),
                    node,
                });
            }
            StepOp::Span { from, to, term } => {
                self.emit(TraceEvent::SourceSpan {
                    from: *from,
                    to: *to,
                });
                self.stack.push(Frame::Enter {
                    term: term.clone(),
                    node,
                });
            }
        }
        Ok(())
    }
}

impl Iterator for StepSession<'_> {
    type Item = Result<TraceEvent, PegError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step().transpose()
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{text:?}"))
}

#[cfg(test)]
mod step_tests {
    use super::*;
    use crate::engine::{Engine, EngineConfig};
    use proptest::prelude::*;

    fn registry(rules: Vec<(&str, StepTerm)>) -> RuleRegistry<StepTerm> {
        let mut registry = RuleRegistry::new();
        for (name, _) in &rules {
            registry.declare(name).unwrap();
        }
        for (name, term) in rules {
            registry.define(name, term).unwrap();
        }
        registry
    }

    #[test]
    fn test_session_is_lazy() {
        let s = Stepper;
        let body = s.sequence_append(s.empty(), s.literal("ab"));
        let rules = registry(vec![("r", s.tagged_rule("r", body))]);
        let mut session = StepSession::new(&rules, "r", "ab", 16).unwrap();
        assert_eq!(session.position(), 0);
        assert_eq!(
            session.step().unwrap(),
            Some(TraceEvent::RuleEnter { name: "r".into() })
        );
        // The literal has not been tried yet.
        assert_eq!(session.position(), 0);
        assert_eq!(session.call_stack(), ["r".to_string()]);
        let trace = session.finish().unwrap();
        assert_eq!(trace.verdict, Verdict::Accepted { consumed: 2 });
        assert_eq!(trace.events.last(), Some(&TraceEvent::RuleExit { name: "r".into() }));
    }

    #[test]
    fn test_sequence_and_choice_flatten() {
        let s = Stepper;
        let seq = s.sequence_append_named(
            s.sequence_append(s.empty(), s.literal("a")),
            "b",
            s.literal("b"),
        );
        assert_eq!(seq.parts().len(), 2);
        let choice = s.or_else(s.or_else(s.never_match(), s.literal("x")), s.literal("y"));
        assert_eq!(choice.alternatives().len(), 2);
    }

    #[test]
    fn test_unknown_start_rule() {
        let rules: RuleRegistry<StepTerm> = RuleRegistry::new();
        assert!(StepSession::new(&rules, "nope", "", 16).is_err());
    }

    const LISTS: &str = r#"list = "(" _ items:item* ")" _;
item : list atom;
atom = text:$[a-z0-9]+ _ mark:"?"?;
_ = [ \t\n]*;
"#;

    /// Events of a full run over `input`, with the session's rollback log.
    fn run_lists(input: &str) -> (Vec<TraceEvent>, Vec<(&'static str, usize, usize)>) {
        let engine = Engine::from_source("lists.peg", LISTS, EngineConfig::default()).unwrap();
        let mut session = engine.session(input).unwrap();
        let events = session.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
        let log = std::mem::take(&mut session.rollback_log);
        (events, log)
    }

    /// The cursor a consumer of `events` would track: the last consumed or
    /// restored offset.
    fn replayed_cursor(events: &[TraceEvent]) -> usize {
        events
            .iter()
            .rev()
            .find_map(|event| match event {
                TraceEvent::Consume { pos } | TraceEvent::Rollback { pos } => Some(*pos),
                _ => None,
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_every_rollback_kind_returns_to_attempt_start() {
        let (events, log) = run_lists("(a b?)");
        for kind in ["optional", "repeat", "choice"] {
            assert!(log.iter().any(|(k, _, _)| *k == kind), "no {kind} rollback");
        }
        for (kind, opened, pos) in log {
            assert_eq!(replayed_cursor(&events[..opened]), pos, "{kind} rollback");
        }
    }

    proptest! {
        #[test]
        fn prop_rollback_targets_attempt_start(input in "[()a-c? ]{0,16}") {
            let (events, log) = run_lists(&input);
            for (kind, opened, pos) in log {
                prop_assert!(opened <= events.len());
                prop_assert_eq!(replayed_cursor(&events[..opened]), pos, "{} rollback", kind);
            }
        }
    }

    #[test]
    fn test_fatal_error_ends_iteration() {
        let s = Stepper;
        let rules = registry(vec![("r", s.tagged_rule("r", s.rule_call("ghost")))]);
        let mut session = StepSession::new(&rules, "r", "", 16).unwrap();
        let results: Vec<_> = session.by_ref().collect();
        assert!(results.last().unwrap().is_err());
        assert!(session.next().is_none());
        assert!(session.verdict().is_none());
    }
}
