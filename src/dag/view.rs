// src/dag/view.rs

//! Read-only snapshots handed to reporting / UI collaborators.

use std::fmt;

use crate::dag::forest::Forest;
use crate::dag::node::{NodeId, NodeState};
use crate::dag::progress::{NOT_STARTED, format_elapsed};

/// Public, read-only view of a node.
///
/// Owns its data so it can be sent to another thread or kept around after
/// the manager moved on.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    pub label: String,
    pub state: NodeState,
    pub progress: f64,
    /// Human-readable time spent in the body, `--` before start.
    pub elapsed: String,
    pub generation: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub takes_slot: bool,
    pub cancelled: bool,
    pub error: Option<String>,
}

impl NodeView {
    pub(crate) fn capture(forest: &Forest, id: NodeId) -> Option<Self> {
        let node = forest.get(id)?;
        Some(Self {
            id,
            label: node.label().to_string(),
            state: node.state(),
            progress: node.progress(),
            elapsed: node
                .elapsed()
                .map(format_elapsed)
                .unwrap_or_else(|| NOT_STARTED.to_string()),
            generation: forest.generation(id),
            parent: node.parent(),
            children: node.children().to_vec(),
            takes_slot: node.takes_slot(),
            cancelled: node.is_cancelled(),
            error: node.error(),
        })
    }
}

impl fmt::Display for NodeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{indent}{label} [{state:?}] {pct:>3.0}% {elapsed}",
            indent = "  ".repeat(self.generation),
            label = self.label,
            state = self.state,
            pct = self.progress * 100.0,
            elapsed = self.elapsed,
        )
    }
}

/// One failed node, for end-of-run reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub id: NodeId,
    pub label: String,
    pub error: String,
}
