use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use launchdag::dag::NodeId;
use launchdag::exec::{BodyJob, Dispatcher};

/// Dispatcher that holds on to every job until the test runs it.
///
/// Clones share the same queue, so a test keeps one clone and gives the
/// other to the manager. Running a job resolves the body and records its
/// outcome on the node; the manager observes it on its next tick.
#[derive(Clone, Default)]
pub struct QueuedDispatcher {
    queue: Arc<Mutex<VecDeque<(NodeId, BodyJob)>>>,
    dispatched: Arc<Mutex<Vec<NodeId>>>,
}

impl std::fmt::Debug for QueuedDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedDispatcher")
            .field("queued", &self.queued())
            .field("dispatched", &self.dispatched())
            .finish()
    }
}

impl QueuedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of jobs not run yet, in dispatch order.
    pub fn queued(&self) -> Vec<NodeId> {
        self.queue.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    /// Every id ever dispatched, in dispatch order.
    pub fn dispatched(&self) -> Vec<NodeId> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Remove the job for `node` without running it.
    pub fn take(&self, node: NodeId) -> Option<BodyJob> {
        let mut queue = self.queue.lock().unwrap();
        let pos = queue.iter().position(|(id, _)| *id == node)?;
        queue.remove(pos).map(|(_, job)| job)
    }

    /// Run the body of `node` to completion. Returns false if it was not queued.
    pub async fn complete(&self, node: NodeId) -> bool {
        match self.take(node) {
            Some(job) => {
                job.await;
                true
            }
            None => false,
        }
    }

    /// Run the oldest queued job.
    pub async fn run_next(&self) -> Option<NodeId> {
        let next = self.queue.lock().unwrap().pop_front();
        let (id, job) = next?;
        job.await;
        Some(id)
    }

    /// Run every queued job, oldest first.
    pub async fn run_all(&self) -> Vec<NodeId> {
        let mut ran = Vec::new();
        while let Some(id) = self.run_next().await {
            ran.push(id);
        }
        ran
    }
}

impl Dispatcher for QueuedDispatcher {
    fn dispatch(&mut self, node: NodeId, job: BodyJob) {
        self.dispatched.lock().unwrap().push(node);
        self.queue.lock().unwrap().push_back((node, job));
    }
}
