// src/exec/backend.rs

//! Pluggable body dispatch.
//!
//! The manager hands every started node's body to a `Dispatcher` and never
//! waits for it. Production code uses [`TokioDispatcher`]; tests can provide
//! their own implementation that holds on to the jobs and decides when each
//! body gets to complete.

use std::future::Future;
use std::pin::Pin;

use tracing::trace;

use crate::dag::NodeId;

/// Self-contained job driving one node body to completion and recording the
/// outcome on the node.
pub type BodyJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Trait abstracting how started bodies are executed.
pub trait Dispatcher {
    /// Start `job` without blocking the caller.
    fn dispatch(&mut self, node: NodeId, job: BodyJob);
}

/// Spawns every job as a Tokio task.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TokioDispatcher {
    spawned: u64,
}

impl TokioDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs spawned so far.
    pub fn spawned(&self) -> u64 {
        self.spawned
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&mut self, node: NodeId, job: BodyJob) {
        self.spawned += 1;
        trace!(node = %node, "spawning body job");
        tokio::spawn(job);
    }
}
