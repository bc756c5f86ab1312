// src/dag/forest.rs

//! Arena of every node the manager has accepted, plus the graph queries the
//! scheduling loop needs (branch completion, readiness, failure blocking).

use std::collections::HashMap;

use tracing::debug;

use crate::dag::node::{NodeId, NodeState, TaskNode};

/// Owns all submitted nodes, keyed by identity.
///
/// Nodes are never removed: a dependent may still need to ask whether a
/// long-finished branch is complete.
#[derive(Debug, Default)]
pub struct Forest {
    nodes: HashMap<NodeId, TaskNode>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&TaskNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TaskNode> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// Insert a node. Returns `false` (and leaves the arena untouched) if the
    /// id is already present.
    pub(crate) fn insert(&mut self, node: TaskNode) -> bool {
        if self.nodes.contains_key(&node.id()) {
            return false;
        }
        self.nodes.insert(node.id(), node);
        true
    }

    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.nodes.get(&id).map(TaskNode::state)
    }

    /// A branch is finished when the node is `Finished`/`Finalized` and every
    /// child's branch is finished as well. Unknown ids are never finished.
    pub fn is_branch_finished(&self, root: NodeId) -> bool {
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                return false;
            };
            if !node.state().is_finished() {
                return false;
            }
            stack.extend(node.children().iter().copied());
        }

        true
    }

    /// Like [`is_branch_finished`](Self::is_branch_finished), but every node
    /// in the branch must also be `Finalized`, i.e. its children are known.
    pub fn is_branch_settled(&self, root: NodeId) -> bool {
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                return false;
            };
            if node.state() != NodeState::Finalized {
                return false;
            }
            stack.extend(node.children().iter().copied());
        }

        true
    }

    /// First `Failed` node found in the branch rooted at `root`, if any.
    pub fn failed_in_branch(&self, root: NodeId) -> Option<NodeId> {
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.state() == NodeState::Failed {
                return Some(id);
            }
            stack.extend(node.children().iter().copied());
        }

        None
    }

    /// Whether every required node of `id` has a finished branch.
    ///
    /// A required node that finished but has not been finalized yet may still
    /// produce children, so its branch is only accepted once settled.
    pub fn deps_satisfied(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };

        for dep in node.required() {
            if !self.nodes.contains_key(dep) {
                debug!(
                    node = %id,
                    dep = %dep,
                    "required node has not been submitted yet"
                );
                return false;
            }
            if !self.is_branch_settled(*dep) {
                return false;
            }
        }

        true
    }

    /// A node is ready when it is still `Pending`, its required branches are
    /// finished and all its extra conditions hold.
    pub fn can_run(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        node.state() == NodeState::Pending && self.deps_satisfied(id) && node.conditions_hold()
    }

    /// If a required branch of `id` contains a failed node, return it.
    ///
    /// `Failed` is terminal, so such a node can never become ready.
    pub fn blocked_by_failure(&self, id: NodeId) -> Option<NodeId> {
        let node = self.nodes.get(&id)?;
        node.required()
            .iter()
            .find_map(|dep| self.failed_in_branch(*dep))
    }

    /// Distance from the nearest root (roots are generation 0).
    pub fn generation(&self, id: NodeId) -> usize {
        let mut generation = 0;
        let mut current = self.nodes.get(&id).and_then(TaskNode::parent);

        while let Some(parent) = current {
            generation += 1;
            current = self.nodes.get(&parent).and_then(TaskNode::parent);
        }

        generation
    }

    /// `id` plus every descendant currently in the arena.
    pub fn branch_ids(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(id);
                stack.extend(node.children().iter().copied());
            }
        }

        out
    }
}
