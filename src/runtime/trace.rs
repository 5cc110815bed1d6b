//! The trace event protocol of the step interpreter.
//!
//! A trace is a total order of [`TraceEvent`]s. Nothing is ever retracted:
//! undoing (a failed alternative, an exhausted repetition) is expressed by
//! later `Rollback`, `Reset` and `Detach` events, so a trace can be logged
//! append-only and replayed exactly.
//!
//! Events that target the display tree carry a [`NodeId`]. Handles are
//! assigned in visitation order, starting from [`NodeId::ROOT`], and are never
//! reused within one parse.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a node in the display tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The node the start rule renders into.
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a display node currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Not resolved yet.
    #[default]
    Pending,
    Text,
    Absent,
    List,
    Record,
}

/// One step of a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TraceEvent {
    /// A rule started running.
    RuleEnter { name: String },
    /// A rule finished, matched or not.
    RuleExit { name: String },
    /// The grammar-source range driving what follows.
    SourceSpan { from: usize, to: usize },
    /// A leaf match advanced the cursor to `pos`.
    Consume { pos: usize },
    /// A failed attempt rewound the cursor to `pos`.
    Rollback { pos: usize },
    SetText { node: NodeId, text: String },
    SetKind { node: NodeId, kind: NodeKind },
    /// Labels a record child with its field name.
    SetPrefix { node: NodeId, prefix: String },
    /// Inserts `child` into `parent` at `index`.
    Attach {
        parent: NodeId,
        index: usize,
        child: NodeId,
    },
    /// Removes the last child of `parent`.
    Detach { parent: NodeId },
    /// Returns `node` and its whole subtree to the pending state.
    Reset { node: NodeId },
}

impl TraceEvent {
    /// The display node this event mutates, if any.
    pub fn target(&self) -> Option<NodeId> {
        match self {
            TraceEvent::SetText { node, .. }
            | TraceEvent::SetKind { node, .. }
            | TraceEvent::SetPrefix { node, .. }
            | TraceEvent::Reset { node } => Some(*node),
            TraceEvent::Attach { parent, .. } | TraceEvent::Detach { parent } => Some(*parent),
            _ => None,
        }
    }

    /// The cursor position this event moves to, if any.
    pub fn cursor(&self) -> Option<usize> {
        match self {
            TraceEvent::Consume { pos } | TraceEvent::Rollback { pos } => Some(*pos),
            _ => None,
        }
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::RuleEnter { name } => write!(f, "enter {name}"),
            TraceEvent::RuleExit { name } => write!(f, "exit {name}"),
            TraceEvent::SourceSpan { from, to } => write!(f, "span {from}..{to}"),
            TraceEvent::Consume { pos } => write!(f, "consume @{pos}"),
            TraceEvent::Rollback { pos } => write!(f, "rollback @{pos}"),
            TraceEvent::SetText { node, text } => write!(f, "{node} text {text}"),
            TraceEvent::SetKind { node, kind } => write!(f, "{node} kind {kind:?}"),
            TraceEvent::SetPrefix { node, prefix } => write!(f, "{node} prefix {prefix}"),
            TraceEvent::Attach {
                parent,
                index,
                child,
            } => write!(f, "{parent} attach {child} at {index}"),
            TraceEvent::Detach { parent } => write!(f, "{parent} detach"),
            TraceEvent::Reset { node } => write!(f, "{node} reset"),
        }
    }
}

/// Final verdict of a step session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "camelCase")]
pub enum Verdict {
    /// The start rule matched the whole input.
    Accepted { consumed: usize },
    /// The start rule failed (`matched == false`) or stopped early.
    Rejected { position: usize, matched: bool },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }

    /// Where the cursor ended.
    pub fn position(&self) -> usize {
        match *self {
            Verdict::Accepted { consumed } => consumed,
            Verdict::Rejected { position, .. } => position,
        }
    }
}

/// A fully collected trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    pub events: Vec<TraceEvent>,
    pub verdict: Verdict,
}

#[cfg(test)]
mod trace_tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = TraceEvent::Attach {
            parent: NodeId::ROOT,
            index: 0,
            child: NodeId(4),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"attach","parent":0,"index":0,"child":4}"#
        );
        let event = TraceEvent::SetKind {
            node: NodeId(2),
            kind: NodeKind::Absent,
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"setKind","node":2,"kind":"absent"}"#
        );
        let back: TraceEvent = serde_json::from_str(r#"{"type":"rollback","pos":3}"#).unwrap();
        assert_eq!(back.cursor(), Some(3));
    }

    #[test]
    fn test_targets() {
        assert_eq!(TraceEvent::Detach { parent: NodeId(7) }.target(), Some(NodeId(7)));
        assert_eq!(TraceEvent::Consume { pos: 1 }.target(), None);
        assert_eq!(TraceEvent::RuleExit { name: "a".into() }.to_string(), "exit a");
    }
}
