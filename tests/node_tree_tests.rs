// tests/node_tree_tests.rs

mod common;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use common::{engine, GREETING, LISTS, TERMS};
use pegtrace::runtime::nodes::{NodeTree, PENDING_TEXT};
use pegtrace::runtime::trace::{NodeId, NodeKind, TraceEvent};

// ---
// Rendering
// ---

#[test]
fn test_greeting_tree() {
    let engine = engine(GREETING);
    let trace = engine.trace("hi alice").unwrap();
    let tree = NodeTree::replay(&trace.events);
    assert_eq!(tree.render(), "greeting {\n  name: \"alice\"\n}");
    assert_eq!(tree.reachable(), 2);
}

#[test]
fn test_losing_alternative_leaves_no_trace() {
    let engine = engine(TERMS);
    let trace = engine.trace("[ab]").unwrap();
    let tree = NodeTree::replay(&trace.events);
    assert_eq!(tree.render(), "klass {\n  body: \"ab\"\n}");
}

#[test]
fn test_nested_lists() {
    let engine = engine(LISTS);
    let trace = engine.trace("(a (b) c?)").unwrap();
    assert!(trace.verdict.is_accepted());
    let tree = NodeTree::replay(&trace.events);
    let expected = "\
list {
  items: [
    atom {
      text: \"a\"
      mark: null
    }
    list {
      items: [
        atom {
          text: \"b\"
          mark: null
        }
      ]
    }
    atom {
      text: \"c\"
      mark: \"?\"
    }
  ]
}";
    assert_eq!(tree.render(), expected);
}

#[test]
fn test_rejected_parse_still_renders() {
    let engine = engine(GREETING);
    let trace = engine.trace("hi ").unwrap();
    assert!(!trace.verdict.is_accepted());
    let tree = NodeTree::replay(&trace.events);
    let root = tree.root().unwrap();
    assert_eq!(root.text, "greeting");
    assert_eq!(root.kind, NodeKind::Record);
}

// ---
// Live application
// ---

#[test]
fn test_partial_session_shows_pending_nodes() {
    let engine = engine(GREETING);
    let mut session = engine.session("hi alice").unwrap();
    let mut tree = NodeTree::new();
    // Enter, then the record header, then the named part's attach and prefix.
    for _ in 0..5 {
        let event = session.step().unwrap().unwrap();
        tree.apply(&event);
    }
    assert_eq!(tree.root().unwrap().text, "greeting");
    let child = tree.root().unwrap().children[0];
    let node = tree.get(child).unwrap();
    assert_eq!(node.prefix.as_deref(), Some("name"));
    assert_eq!(node.text, PENDING_TEXT);
    assert_eq!(node.kind, NodeKind::Pending);
}

#[test]
fn test_live_tree_matches_replay_from_log() {
    let engine = engine(LISTS);
    let seen = Rc::new(RefCell::new(HashSet::new()));
    let mut live = NodeTree::new();
    let sink = Rc::clone(&seen);
    live.subscribe(move |id| {
        sink.borrow_mut().insert(id);
    });

    let mut log = Vec::new();
    for event in engine.session("(x y?)").unwrap() {
        let event = event.unwrap();
        live.apply(&event);
        log.push(serde_json::to_string(&event).unwrap());
    }

    let replayed: Vec<TraceEvent> = log
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(live.render(), NodeTree::replay(&replayed).render());
    assert!(seen.borrow().contains(&NodeId::ROOT));
    assert!(seen.borrow().len() >= live.reachable());
}
