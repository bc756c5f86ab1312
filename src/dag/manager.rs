// src/dag/manager.rs

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use crate::dag::forest::Forest;
use crate::dag::node::{NodeId, NodeState, TaskNode};
use crate::dag::tick_report::TickReport;
use crate::dag::view::{NodeFailure, NodeView};
use crate::exec::{Dispatcher, TokioDispatcher};

/// Owns the live forest of nodes and drives it one [`tick`](Self::tick) at a
/// time.
///
/// It is responsible for:
/// - remembering which nodes are pending, running, and which roots are not
///   finished yet
/// - dispatching ready nodes (FIFO) while slots are available
/// - collecting continuations of finished nodes and merging their children
/// - pruning finished roots and terminal running nodes
///
/// The collections are only touched from `submit*`, `cancel*` and `tick`,
/// which all take `&mut self`; no locking is involved.
#[derive(Debug)]
pub struct TaskManager<D: Dispatcher = TokioDispatcher> {
    forest: Forest,
    /// Insertion-ordered.
    pending: Vec<NodeId>,
    running: BTreeSet<NodeId>,
    unfinished_roots: Vec<NodeId>,
    concurrency_limit: usize,
    dispatcher: D,
    ticks: u64,
}

impl TaskManager<TokioDispatcher> {
    /// Manager that spawns bodies on the ambient Tokio runtime.
    pub fn new(concurrency_limit: usize) -> Self {
        Self::with_dispatcher(concurrency_limit, TokioDispatcher::new())
    }
}

impl<D: Dispatcher> TaskManager<D> {
    pub fn with_dispatcher(concurrency_limit: usize, dispatcher: D) -> Self {
        Self {
            forest: Forest::new(),
            pending: Vec::new(),
            running: BTreeSet::new(),
            unfinished_roots: Vec::new(),
            concurrency_limit,
            dispatcher,
            ticks: 0,
        }
    }

    /// Submit a root node. Submitting the same node id twice is a no-op.
    pub fn submit(&mut self, node: TaskNode) -> NodeId {
        let id = node.id();
        if self.insert(node, None) {
            self.unfinished_roots.push(id);
        }
        id
    }

    /// Submit several root nodes, preserving their order.
    pub fn submit_all<I>(&mut self, nodes: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = TaskNode>,
    {
        nodes.into_iter().map(|node| self.submit(node)).collect()
    }

    /// Insert into the arena and the pending list, linking it to `parent` in
    /// the same step.
    fn insert(&mut self, mut node: TaskNode, parent: Option<NodeId>) -> bool {
        let id = node.id();
        if self.forest.contains(id) {
            debug!(node = %id, label = %node.label(), "node already submitted; ignoring");
            return false;
        }

        if let Some(parent_id) = parent {
            node.set_parent(parent_id);
            if let Some(parent_node) = self.forest.get_mut(parent_id) {
                parent_node.push_child(id);
            }
        }

        debug!(
            node = %id,
            label = %node.label(),
            parent = ?parent,
            takes_slot = node.takes_slot(),
            "node submitted"
        );

        self.forest.insert(node);
        self.pending.push(id);
        true
    }

    /// One non-blocking scheduling pass.
    ///
    /// 1. compute the ready set in pending order
    /// 2. dispatch ready nodes; slot-consuming ones only while slots remain
    /// 3. finalize finished running nodes and submit their children
    /// 4. prune finished roots and terminal running nodes
    pub fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            tick: self.ticks,
            ..TickReport::default()
        };

        self.dispatch_ready(&mut report);
        self.finalize_finished(&mut report);
        self.prune(&mut report);

        report.slots_in_use = self.slots_in_use();
        report
    }

    fn dispatch_ready(&mut self, report: &mut TickReport) {
        // Decide first, then mutate.
        let ready: Vec<NodeId> = self
            .pending
            .iter()
            .copied()
            .filter(|id| self.forest.can_run(*id))
            .collect();

        if ready.is_empty() {
            return;
        }

        let mut slots_in_use = self.slots_in_use();

        for id in ready {
            let takes_slot = self.forest.get(id).is_some_and(TaskNode::takes_slot);
            if takes_slot && slots_in_use >= self.concurrency_limit {
                continue;
            }

            let Some(node) = self.forest.get_mut(id) else {
                continue;
            };
            let Some(job) = node.run() else {
                warn!(node = %id, "ready node refused to start; leaving it pending");
                continue;
            };

            info!(
                node = %id,
                label = %node.label(),
                takes_slot,
                tick = self.ticks,
                "dispatching node"
            );

            self.pending.retain(|p| *p != id);
            self.running.insert(id);
            if takes_slot {
                slots_in_use += 1;
            }
            self.dispatcher.dispatch(id, job);
            report.dispatched.push(id);
        }

        debug!(
            tick = self.ticks,
            slots_in_use,
            limit = self.concurrency_limit,
            "dispatch pass complete"
        );
    }

    fn finalize_finished(&mut self, report: &mut TickReport) {
        let finished: Vec<NodeId> = self
            .running
            .iter()
            .copied()
            .filter(|id| self.forest.state(*id) == Some(NodeState::Finished))
            .collect();

        for id in finished {
            let Some(node) = self.forest.get_mut(id) else {
                continue;
            };
            let label = node.label().to_string();

            let children = match node.take_continuation() {
                Some(Ok(children)) => children,
                Some(Err(err)) => {
                    error!(
                        node = %id,
                        label = %label,
                        error = %format!("{err:#}"),
                        "continuation failed; finalizing without children"
                    );
                    Vec::new()
                }
                None => Vec::new(),
            };
            node.mark_finalized();

            for child in children {
                let child_id = child.id();
                if self.insert(child, Some(id)) {
                    report.spawned.push(child_id);
                } else {
                    warn!(
                        node = %id,
                        child = %child_id,
                        "continuation returned an already submitted node; not re-parenting"
                    );
                }
            }

            debug!(
                node = %id,
                label = %label,
                children = self.forest.get(id).map_or(0, |n| n.children().len()),
                "node finalized"
            );
            report.finalized.push(id);
        }
    }

    fn prune(&mut self, report: &mut TickReport) {
        let forest = &self.forest;

        let mut failed = Vec::new();
        self.running.retain(|id| match forest.state(*id) {
            Some(NodeState::Failed) => {
                failed.push(*id);
                false
            }
            Some(NodeState::Finalized) | None => false,
            _ => true,
        });

        for id in &failed {
            if let Some(node) = forest.get(*id) {
                error!(
                    node = %id,
                    label = %node.label(),
                    error = %node.error().unwrap_or_default(),
                    "step failed; dependents of this branch will not start"
                );
            }
        }
        report.failed = failed;

        let mut completed = Vec::new();
        self.unfinished_roots.retain(|id| {
            if forest.is_branch_finished(*id) {
                completed.push(*id);
                false
            } else {
                true
            }
        });

        for id in &completed {
            info!(
                node = %id,
                label = %forest.get(*id).map(|n| n.label().to_string()).unwrap_or_default(),
                "root branch finished"
            );
        }
        report.completed_roots = completed;
    }

    /// Slot-consuming nodes currently in the running set.
    pub fn slots_in_use(&self) -> usize {
        self.running
            .iter()
            .filter(|id| self.forest.get(**id).is_some_and(TaskNode::takes_slot))
            .count()
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Pending node ids in submission order.
    pub fn pending(&self) -> &[NodeId] {
        &self.pending
    }

    /// Running node ids (ascending id order).
    pub fn running(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.running.iter().copied()
    }

    pub fn unfinished_roots(&self) -> &[NodeId] {
        &self.unfinished_roots
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.forest.state(id)
    }

    pub fn can_run(&self, id: NodeId) -> bool {
        self.forest.can_run(id)
    }

    pub fn is_branch_finished(&self, id: NodeId) -> bool {
        self.forest.is_branch_finished(id)
    }

    pub fn generation(&self, id: NodeId) -> usize {
        self.forest.generation(id)
    }

    pub fn view(&self, id: NodeId) -> Option<NodeView> {
        NodeView::capture(&self.forest, id)
    }

    /// Views of every running node, then every pending node.
    pub fn live_views(&self) -> Vec<NodeView> {
        self.running
            .iter()
            .chain(self.pending.iter())
            .filter_map(|id| self.view(*id))
            .collect()
    }

    /// Mean progress over every node ever submitted (1.0 when empty).
    pub fn overall_progress(&self) -> f64 {
        if self.forest.is_empty() {
            return 1.0;
        }
        let sum: f64 = self.forest.nodes().map(TaskNode::progress).sum();
        sum / self.forest.len() as f64
    }

    /// No pending and no running nodes.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.running.is_empty()
    }

    /// Every submitted root has a finished branch and nothing is left to do.
    pub fn is_complete(&self) -> bool {
        self.unfinished_roots.is_empty() && self.is_idle()
    }

    /// Nothing is running and every pending node waits on a failed branch,
    /// so no further progress is possible without new submissions.
    pub fn is_settled(&self) -> bool {
        self.running.is_empty()
            && self
                .pending
                .iter()
                .all(|id| self.forest.blocked_by_failure(*id).is_some())
    }

    /// Pending nodes that can never start, with the failed node blocking each.
    pub fn stalled(&self) -> Vec<(NodeId, NodeId)> {
        self.pending
            .iter()
            .filter_map(|id| self.forest.blocked_by_failure(*id).map(|f| (*id, f)))
            .collect()
    }

    /// Every node whose body failed.
    pub fn failures(&self) -> Vec<NodeFailure> {
        let mut failures: Vec<NodeFailure> = self
            .forest
            .nodes()
            .filter(|node| node.state() == NodeState::Failed)
            .map(|node| NodeFailure {
                id: node.id(),
                label: node.label().to_string(),
                error: node.error().unwrap_or_default(),
            })
            .collect();
        failures.sort_by_key(|f| f.id);
        failures
    }

    /// Cancel a node and every descendant known so far.
    ///
    /// Returns the number of nodes whose flag was newly set.
    pub fn cancel(&mut self, id: NodeId) -> usize {
        let mut newly = 0;
        for member in self.forest.branch_ids(id) {
            if let Some(node) = self.forest.get(member) {
                if node.cancel_token().cancel() {
                    newly += 1;
                }
            }
        }
        if newly > 0 {
            info!(node = %id, cancelled = newly, "cancellation requested for branch");
        }
        newly
    }

    /// Cancel every pending and running node.
    pub fn cancel_all(&mut self) -> usize {
        let live: Vec<NodeId> = self.pending.iter().chain(self.running.iter()).copied().collect();
        let newly = live
            .into_iter()
            .filter(|id| {
                self.forest
                    .get(*id)
                    .is_some_and(|node| node.cancel_token().cancel())
            })
            .count();
        if newly > 0 {
            info!(cancelled = newly, "cancellation requested for all live nodes");
        }
        newly
    }
}
