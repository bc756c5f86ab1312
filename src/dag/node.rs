// src/dag/node.rs

//! A single unit of work in the launch forest.
//!
//! A [`TaskNode`] wraps a concrete [`Step`] together with everything the
//! manager needs to schedule it: required nodes, extra readiness conditions,
//! parent/children links, slot usage, timing and progress.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::dag::progress::{CancelToken, WorkProgress, clamp_progress};
use crate::exec::BodyJob;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity. Ids are handed out in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a node. States only ever move forward:
/// `Pending -> Started -> Finished -> Finalized`, or `Started -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Submitted, waiting for dependencies, conditions or a free slot.
    Pending,
    /// Body dispatched and not yet resolved.
    Started,
    /// Body completed successfully; continuation not collected yet.
    Finished,
    /// Continuation collected and children merged.
    Finalized,
    /// Body returned an error (or panicked). Terminal.
    Failed,
}

impl NodeState {
    /// `Finished` or `Finalized`.
    pub fn is_finished(self) -> bool {
        matches!(self, NodeState::Finished | NodeState::Finalized)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Finalized | NodeState::Failed)
    }
}

/// Future returned by a step body.
pub type StepFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Extra readiness predicate attached with [`TaskNode::with_condition`].
pub type Condition = Box<dyn Fn() -> bool + Send>;

/// The concrete work behind a node.
///
/// Implementations are plain IO wrappers; the scheduler only cares about the
/// body future, the follow-up nodes and an optional progress override.
pub trait Step: Send {
    /// Short human-readable name used in logs and views.
    fn label(&self) -> String;

    /// Whether a running instance counts against the concurrency limit.
    fn takes_slot(&self) -> bool {
        true
    }

    /// Build the asynchronous body. Called exactly once, when the node is
    /// dispatched. The future must own everything it touches.
    fn body(&mut self, ctx: StepContext) -> StepFuture;

    /// Follow-up nodes, collected once after the body finished successfully.
    fn continuation(&mut self, _ctx: &StepContext) -> anyhow::Result<Vec<TaskNode>> {
        Ok(Vec::new())
    }

    /// Step-specific progress in `[0, 1]`; `None` falls back to the node's
    /// work counters.
    fn progress(&self) -> Option<f64> {
        None
    }
}

/// Handles a step gets to report progress and observe cancellation.
#[derive(Debug, Clone)]
pub struct StepContext {
    node: NodeId,
    label: String,
    work: WorkProgress,
    cancel: CancelToken,
}

impl StepContext {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn work(&self) -> &WorkProgress {
        &self.work
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

#[derive(Debug)]
struct StatusInner {
    state: NodeState,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    error: Option<String>,
}

/// State cell shared between the manager and the dispatched body.
#[derive(Debug)]
pub(crate) struct NodeStatus {
    inner: Mutex<StatusInner>,
}

impl NodeStatus {
    fn new() -> Self {
        Self {
            inner: Mutex::new(StatusInner {
                state: NodeState::Pending,
                started_at: None,
                finished_at: None,
                error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> NodeState {
        self.lock().state
    }

    /// `Pending -> Started`. Returns `false` if the node already left `Pending`.
    fn start(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != NodeState::Pending {
            return false;
        }
        inner.state = NodeState::Started;
        inner.started_at = Some(Instant::now());
        true
    }

    /// Record the body's outcome: `Started -> Finished | Failed`.
    fn complete(&self, outcome: anyhow::Result<()>) {
        let mut inner = self.lock();
        if inner.state != NodeState::Started {
            warn!(state = ?inner.state, "body completed for a node that is not Started; ignoring");
            return;
        }
        inner.finished_at = Some(Instant::now());
        match outcome {
            Ok(()) => inner.state = NodeState::Finished,
            Err(err) => {
                inner.state = NodeState::Failed;
                inner.error = Some(format!("{err:#}"));
            }
        }
    }

    /// `Finished -> Finalized`.
    fn finalize(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != NodeState::Finished {
            return false;
        }
        inner.state = NodeState::Finalized;
        true
    }

    fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    fn elapsed(&self) -> Option<Duration> {
        let inner = self.lock();
        let started = inner.started_at?;
        let end = inner.finished_at.unwrap_or_else(Instant::now);
        Some(end.saturating_duration_since(started))
    }
}

/// A schedulable unit of work.
///
/// Builder methods ([`after`](TaskNode::after),
/// [`with_condition`](TaskNode::with_condition),
/// [`with_slot`](TaskNode::with_slot)) take the node by value; once it has
/// been submitted the manager owns it and it can no longer be reconfigured.
pub struct TaskNode {
    id: NodeId,
    label: String,
    step: Box<dyn Step>,
    required: Vec<NodeId>,
    conditions: Vec<Condition>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    takes_slot: bool,
    status: Arc<NodeStatus>,
    work: WorkProgress,
    cancel: CancelToken,
    continued: bool,
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("state", &self.state())
            .field("required", &self.required)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("takes_slot", &self.takes_slot)
            .finish_non_exhaustive()
    }
}

impl TaskNode {
    pub fn new<S: Step + 'static>(step: S) -> Self {
        Self::from_boxed(Box::new(step))
    }

    pub fn from_boxed(step: Box<dyn Step>) -> Self {
        let label = step.label();
        let takes_slot = step.takes_slot();
        Self {
            id: NodeId::next(),
            label,
            step,
            required: Vec::new(),
            conditions: Vec::new(),
            parent: None,
            children: Vec::new(),
            takes_slot,
            status: Arc::new(NodeStatus::new()),
            work: WorkProgress::new(),
            cancel: CancelToken::new(),
            continued: false,
        }
    }

    /// Require every node in `nodes` to have a finished branch before this
    /// node may start.
    pub fn after<I>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        for dep in nodes {
            if dep == self.id {
                warn!(node = %self.id, label = %self.label, "node cannot depend on itself; ignoring");
                continue;
            }
            if !self.required.contains(&dep) {
                self.required.push(dep);
            }
        }
        self
    }

    /// Add an extra readiness predicate. All predicates must hold.
    pub fn with_condition<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        self.conditions.push(Box::new(predicate));
        self
    }

    /// Override whether this node counts against the concurrency limit.
    pub fn with_slot(mut self, takes_slot: bool) -> Self {
        self.takes_slot = takes_slot;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> NodeState {
        self.status.state()
    }

    pub fn required(&self) -> &[NodeId] {
        &self.required
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn takes_slot(&self) -> bool {
        self.takes_slot
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn error(&self) -> Option<String> {
        self.status.error()
    }

    /// Time spent in the body so far (or in total once it resolved).
    pub fn elapsed(&self) -> Option<Duration> {
        self.status.elapsed()
    }

    /// Step override if present, otherwise `completed / total` work.
    pub fn progress(&self) -> f64 {
        match self.step.progress() {
            Some(p) => clamp_progress(p),
            None => self.work.ratio(),
        }
    }

    /// Whether every extra condition currently evaluates to true.
    pub fn conditions_hold(&self) -> bool {
        self.conditions.iter().all(|cond| cond())
    }

    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn set_parent(&mut self, parent: NodeId) {
        debug_assert!(self.parent.is_none(), "parent link set twice");
        self.parent = Some(parent);
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    fn context(&self) -> StepContext {
        StepContext {
            node: self.id,
            label: self.label.clone(),
            work: self.work.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// `Pending -> Started` and build the job that drives the body.
    ///
    /// Returns `None` if the node was already started. The body runs on its
    /// own Tokio task so a panic surfaces as a failure instead of leaving the
    /// node `Started` forever.
    pub(crate) fn run(&mut self) -> Option<BodyJob> {
        if !self.status.start() {
            return None;
        }

        let body = self.step.body(self.context());
        let status = Arc::clone(&self.status);
        let node = self.id;

        Some(Box::pin(async move {
            let outcome = match tokio::spawn(body).await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow!("step body aborted: {join_err}")),
            };
            debug!(node = %node, ok = outcome.is_ok(), "step body resolved");
            status.complete(outcome);
        }))
    }

    /// Collect follow-up nodes. Only yields once, and only after `Finished`.
    pub(crate) fn take_continuation(&mut self) -> Option<anyhow::Result<Vec<TaskNode>>> {
        if self.continued || self.state() != NodeState::Finished {
            return None;
        }
        self.continued = true;
        let ctx = self.context();
        Some(self.step.continuation(&ctx))
    }

    pub(crate) fn mark_finalized(&mut self) -> bool {
        self.status.finalize()
    }
}
