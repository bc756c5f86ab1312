// src/dag/mod.rs

//! Task forest representation and scheduling.
//!
//! - [`node`] defines a single unit of work ([`TaskNode`]) and the [`Step`]
//!   trait concrete steps implement.
//! - [`forest`] is the arena of submitted nodes and answers readiness and
//!   branch-completion questions.
//! - [`manager`] contains the cooperative scheduling loop ([`TaskManager::tick`]).
//! - [`tick_report`] defines the result type for a single tick.
//! - [`progress`] has the work counters, cancel token and elapsed-time helpers.
//! - [`view`] provides read-only snapshots for reporting.

pub mod forest;
pub mod manager;
pub mod node;
pub mod progress;
pub mod tick_report;
pub mod view;

pub use forest::Forest;
pub use manager::TaskManager;
pub use node::{NodeId, NodeState, Step, StepContext, StepFuture, TaskNode};
pub use progress::{CancelToken, WorkProgress, format_elapsed};
pub use tick_report::TickReport;
pub use view::{NodeFailure, NodeView};
