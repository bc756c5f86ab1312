// src/dag/tick_report.rs

//! Result type for a single scheduling pass.

use crate::dag::node::NodeId;

/// Structured result of one [`TaskManager::tick`](crate::dag::TaskManager::tick).
///
/// Useful for tests that step the manager by hand and for the driver's
/// progress reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 1-based index of this tick.
    pub tick: u64,
    /// Nodes moved from pending to running in this tick, in dispatch order.
    pub dispatched: Vec<NodeId>,
    /// Nodes whose continuation was collected in this tick.
    pub finalized: Vec<NodeId>,
    /// Children produced by those continuations, in submission order.
    pub spawned: Vec<NodeId>,
    /// Nodes whose body failed and that left the running set in this tick.
    pub failed: Vec<NodeId>,
    /// Roots whose whole branch finished in this tick.
    pub completed_roots: Vec<NodeId>,
    /// Slot-consuming nodes still running after this tick.
    pub slots_in_use: usize,
}

impl TickReport {
    /// Whether anything changed in this tick.
    pub fn is_quiet(&self) -> bool {
        self.dispatched.is_empty()
            && self.finalized.is_empty()
            && self.failed.is_empty()
            && self.completed_roots.is_empty()
    }
}
