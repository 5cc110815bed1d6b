//! The display tree a trace projects into.
//!
//! A [`NodeTree`] is rebuilt purely from [`TraceEvent`]s, so the same trace
//! always yields the same tree whether it is applied live, step by step, or
//! replayed from a log. Handles the tree has not seen yet are created on first
//! use; scratch handles that are never attached stay unreachable from the root
//! and never show up in [`NodeTree::render`].

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::runtime::trace::{NodeId, NodeKind, TraceEvent};

/// Placeholder text of a node that has not resolved yet.
pub const PENDING_TEXT: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayNode {
    pub text: String,
    pub prefix: Option<String>,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
}

impl Default for DisplayNode {
    fn default() -> Self {
        Self {
            text: PENDING_TEXT.to_string(),
            prefix: None,
            kind: NodeKind::Pending,
            children: Vec::new(),
        }
    }
}

type Observer = Box<dyn FnMut(NodeId)>;

/// Mutable display tree rooted at [`NodeId::ROOT`].
#[derive(Default)]
pub struct NodeTree {
    nodes: HashMap<NodeId, DisplayNode>,
    observers: Vec<Observer>,
}

impl fmt::Debug for NodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTree")
            .field("nodes", &self.nodes.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl NodeTree {
    pub fn new() -> Self {
        let mut tree = Self::default();
        tree.nodes.insert(NodeId::ROOT, DisplayNode::default());
        tree
    }

    /// Builds a tree by applying every event in order.
    pub fn replay<'e>(events: impl IntoIterator<Item = &'e TraceEvent>) -> Self {
        let mut tree = Self::new();
        for event in events {
            tree.apply(event);
        }
        tree
    }

    /// Registers a callback run with the handle of every node an event changes.
    pub fn subscribe(&mut self, observer: impl FnMut(NodeId) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn get(&self, id: NodeId) -> Option<&DisplayNode> {
        self.nodes.get(&id)
    }

    pub fn root(&self) -> Option<&DisplayNode> {
        self.get(NodeId::ROOT)
    }

    /// Number of nodes reachable from the root.
    pub fn reachable(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![NodeId::ROOT];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get(&id) {
                count += 1;
                pending.extend(node.children.iter().copied());
            }
        }
        count
    }

    /// Applies one event. Events that do not touch the tree are ignored.
    pub fn apply(&mut self, event: &TraceEvent) {
        let Some(target) = event.target() else {
            return;
        };
        match event {
            TraceEvent::SetText { node, text } => self.node_mut(*node).text = text.clone(),
            TraceEvent::SetKind { node, kind } => self.node_mut(*node).kind = *kind,
            TraceEvent::SetPrefix { node, prefix } => {
                self.node_mut(*node).prefix = Some(prefix.clone())
            }
            TraceEvent::Attach {
                parent,
                index,
                child,
            } => {
                self.node_mut(*child);
                let children = &mut self.node_mut(*parent).children;
                let at = (*index).min(children.len());
                children.insert(at, *child);
            }
            TraceEvent::Detach { parent } => {
                if let Some(child) = self.node_mut(*parent).children.pop() {
                    self.drop_subtree(child);
                }
            }
            TraceEvent::Reset { node } => {
                let node = self.node_mut(*node);
                node.text = PENDING_TEXT.to_string();
                node.kind = NodeKind::Pending;
                let children = std::mem::take(&mut node.children);
                for child in children {
                    self.drop_subtree(child);
                }
            }
            _ => {}
        }
        for observer in &mut self.observers {
            observer(target);
        }
    }

    /// Renders the reachable tree as indented text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(NodeId::ROOT, 0, &mut out);
        out
    }

    // ------------------------------------------------------------------------

    fn node_mut(&mut self, id: NodeId) -> &mut DisplayNode {
        self.nodes.entry(id).or_default()
    }

    fn drop_subtree(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                pending.extend(node.children);
            }
        }
    }

    fn render_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        if let Some(prefix) = &node.prefix {
            out.push_str(prefix);
            out.push_str(": ");
        }
        let (open, close) = match node.kind {
            NodeKind::Record => {
                out.push_str(&node.text);
                out.push(' ');
                ('{', '}')
            }
            NodeKind::List => ('[', ']'),
            _ => {
                out.push_str(&node.text);
                return;
            }
        };
        out.push(open);
        if !node.children.is_empty() {
            out.push('\n');
            for child in &node.children {
                out.push_str(&"  ".repeat(depth + 1));
                self.render_node(*child, depth + 1, out);
                out.push('\n');
            }
            out.push_str(&"  ".repeat(depth));
        }
        out.push(close);
    }
}
