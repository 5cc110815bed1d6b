// tests/step_tests.rs

mod common;

use common::{engine, GREETING, LISTS, TERMS};
use pegtrace::runtime::nodes::NodeTree;
use pegtrace::runtime::trace::{NodeId, NodeKind, TraceEvent, Verdict};
use pegtrace::ErrorType;

fn position_of(events: &[TraceEvent], wanted: &TraceEvent) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("missing event {wanted}"))
}

fn enter(name: &str) -> TraceEvent {
    TraceEvent::RuleEnter {
        name: name.to_string(),
    }
}

fn exit(name: &str) -> TraceEvent {
    TraceEvent::RuleExit {
        name: name.to_string(),
    }
}

// ---
// Verdicts
// ---

#[test]
fn test_greeting_trace_is_accepted() {
    let engine = engine(GREETING);
    let trace = engine.trace("hi alice").unwrap();
    assert_eq!(trace.verdict, Verdict::Accepted { consumed: 8 });
    assert_eq!(trace.events.first(), Some(&enter("greeting")));
    assert_eq!(trace.events.last(), Some(&exit("greeting")));
    let last_consume = trace.events.iter().rev().find_map(TraceEvent::cursor);
    assert_eq!(last_consume, Some(8));
}

#[test]
fn test_greeting_without_name_is_rejected_at_three() {
    let engine = engine(GREETING);
    let mut session = engine.session("hi ").unwrap();
    while session.step().unwrap().is_some() {}
    assert_eq!(
        session.verdict(),
        Some(Verdict::Rejected {
            position: 3,
            matched: false
        })
    );
    let err = session.outcome().unwrap().unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Parse);
    assert_eq!(err.span().map(|s| s.start), Some(3));
}

#[test]
fn test_trailing_input_is_rejected_as_matched() {
    let engine = engine(GREETING);
    let trace = engine.trace("hi al1").unwrap();
    assert_eq!(
        trace.verdict,
        Verdict::Rejected {
            position: 5,
            matched: true
        }
    );
}

// ---
// Event protocol
// ---

#[test]
fn test_union_rolls_back_failed_case_to_zero() {
    let engine = engine(TERMS);
    let trace = engine.trace("[ab]").unwrap();
    assert!(trace.verdict.is_accepted());

    let events = &trace.events;
    assert_eq!(events[0], enter("term"));
    let ref_exit = position_of(events, &exit("ref"));
    let klass_enter = position_of(events, &enter("klass"));
    assert!(ref_exit < klass_enter);
    // The choice rewinds right after the failed case returns, then resets the
    // losing alternative's rendering before the next one starts.
    assert_eq!(events[ref_exit + 1], TraceEvent::Rollback { pos: 0 });
    assert_eq!(events[ref_exit + 2], TraceEvent::Reset { node: NodeId::ROOT });
}

#[test]
fn test_union_rollback_after_partial_consumption() {
    let engine = engine(TERMS);
    let trace = engine.trace("ab").unwrap();
    assert_eq!(
        trace.verdict,
        Verdict::Rejected {
            position: 0,
            matched: false
        }
    );
    let consumed = trace
        .events
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Consume { pos } => Some(*pos),
            _ => None,
        })
        .max();
    assert_eq!(consumed, Some(2));
    assert!(trace.events.contains(&TraceEvent::Rollback { pos: 0 }));
}

#[test]
fn test_leaf_events_precede_consume() {
    let engine = engine("one = v:\"x\";\n");
    let trace = engine.trace("x").unwrap();
    let consume = position_of(&trace.events, &TraceEvent::Consume { pos: 1 });
    assert!(matches!(
        &trace.events[consume - 2],
        TraceEvent::SetText { text, .. } if text == "\"x\""
    ));
    assert!(matches!(
        trace.events[consume - 1],
        TraceEvent::SetKind {
            kind: NodeKind::Text,
            ..
        }
    ));
}

#[test]
fn test_named_parts_attach_before_running() {
    let engine = engine("pair = a:\"a\" \"-\" b:\"b\";\n");
    let trace = engine.trace("a-b").unwrap();
    let first_consume = trace
        .events
        .iter()
        .position(|e| matches!(e, TraceEvent::Consume { .. }))
        .unwrap();
    let attaches: Vec<usize> = trace
        .events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, TraceEvent::Attach { parent, .. } if *parent == NodeId::ROOT))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(attaches.len(), 2);
    assert!(attaches.iter().all(|&i| i < first_consume));
}

#[test]
fn test_optional_miss_renders_null() {
    let engine = engine("opt = a:\"a\" b:\"b\"?;\n");
    let trace = engine.trace("a").unwrap();
    assert!(trace.events.iter().any(|e| matches!(
        e,
        TraceEvent::SetKind {
            kind: NodeKind::Absent,
            ..
        }
    )));
    let tree = NodeTree::replay(&trace.events);
    assert_eq!(tree.render(), "opt {\n  a: \"a\"\n  b: null\n}");
}

#[test]
fn test_handles_are_never_reused() {
    let engine = engine(LISTS);
    let trace = engine.trace("(a (b c?) d)").unwrap();
    let mut children: Vec<u32> = trace
        .events
        .iter()
        .filter_map(|e| match e {
            TraceEvent::Attach { child, .. } => Some(child.0),
            _ => None,
        })
        .collect();
    let total = children.len();
    children.sort_unstable();
    children.dedup();
    assert_eq!(children.len(), total);
    assert!(!children.contains(&NodeId::ROOT.0));
}

#[test]
fn test_rule_brackets_are_balanced() {
    let engine = engine(LISTS);
    let trace = engine.trace("(a (b) c").unwrap();
    let mut stack = Vec::new();
    for event in &trace.events {
        match event {
            TraceEvent::RuleEnter { name } => stack.push(name.clone()),
            TraceEvent::RuleExit { name } => assert_eq!(stack.pop().as_ref(), Some(name)),
            _ => {}
        }
    }
    assert!(stack.is_empty());
    assert!(!trace.verdict.is_accepted());
}

// ---
// Suspension
// ---

#[test]
fn test_session_yields_one_event_per_step() {
    let engine = engine(GREETING);
    let mut session = engine.session("hi alice").unwrap();
    assert_eq!(session.step().unwrap(), Some(enter("greeting")));
    assert_eq!(session.call_stack(), ["greeting".to_string()]);
    assert_eq!(session.position(), 0);
    assert!(session.verdict().is_none());
    // Abandoning a session part-way is fine.
    drop(session);

    let full = engine.trace("hi alice").unwrap();
    let stepped: Vec<TraceEvent> = engine
        .session("hi alice")
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(stepped, full.events);
}

#[test]
fn test_fatal_error_stops_the_session() {
    let engine = engine("a = x:\"x\" y:ghost;\n");
    let mut session = engine.session("x").unwrap();
    let err = loop {
        match session.step() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("expected an unresolved rule"),
            Err(e) => break e,
        }
    };
    assert_eq!(err.error_type(), ErrorType::UnresolvedRule);
    assert!(session.step().unwrap().is_none());
    assert!(session.verdict().is_none());
}

#[test]
fn test_events_serialize_as_json_lines() {
    let engine = engine("one = v:\"x\";\n");
    let trace = engine.trace("x").unwrap();
    let lines: Vec<String> = trace
        .events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap())
        .collect();
    assert_eq!(lines[0], r#"{"type":"ruleEnter","name":"one"}"#);
    assert!(lines.contains(&r#"{"type":"consume","pos":1}"#.to_string()));
    let back: Vec<TraceEvent> = lines
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(back, trace.events);
}
