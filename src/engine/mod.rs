// src/engine/mod.rs

//! Orchestration engine for launchdag.
//!
//! The scheduling semantics live in the synchronous
//! [`TaskManager`](crate::dag::TaskManager); this module is the async shell
//! around it. The [`Driver`] ticks the manager on a fixed interval and reacts
//! to:
//! - new submissions
//! - cancellation requests
//! - shutdown signals

use std::fmt;
use std::time::Duration;

use crate::config::SchedulerSection;
use crate::dag::{NodeFailure, NodeId, TaskNode, format_elapsed};
use crate::types::FailurePolicy;

pub mod driver;

pub use driver::Driver;

/// Events flowing into the driver from the CLI, signal handlers or tests.
#[derive(Debug)]
pub enum DriverEvent {
    /// Submit additional root nodes.
    Submit(Vec<TaskNode>),
    /// Cancel a node and its known descendants.
    Cancel(NodeId),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Options controlling the driver loop.
#[derive(Debug, Clone, Copy)]
pub struct DriverOptions {
    /// Time between two ticks.
    pub tick_interval: Duration,
    /// Reaction to the first failed node.
    pub failure_policy: FailurePolicy,
    /// Log overall progress every N ticks (0 disables it).
    pub report_every: u64,
    /// If true, exit as soon as the forest is complete or settled, even while
    /// the event channel is still open. Otherwise the driver waits for the
    /// channel to close (or a shutdown request) first.
    pub exit_when_idle: bool,
}

impl DriverOptions {
    pub fn from_scheduler(section: &SchedulerSection, exit_when_idle: bool) -> Self {
        Self {
            tick_interval: section.tick_interval(),
            failure_policy: section.failure_policy,
            report_every: section.report_every,
            exit_when_idle,
        }
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self::from_scheduler(&SchedulerSection::default(), true)
    }
}

/// Why the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Every submitted root finished.
    Completed,
    /// At least one node failed and everything still pending depends on it.
    Stalled,
    /// A node failed under `FailurePolicy::Abort`.
    Aborted,
    /// A shutdown was requested before the forest completed.
    Interrupted,
}

impl fmt::Display for DriveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriveOutcome::Completed => "completed",
            DriveOutcome::Stalled => "stalled",
            DriveOutcome::Aborted => "aborted",
            DriveOutcome::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// What a finished [`Driver::run`] reports back.
#[derive(Debug, Clone)]
pub struct DriveSummary {
    pub outcome: DriveOutcome,
    pub ticks: u64,
    pub failures: Vec<NodeFailure>,
    /// `(pending node, failed node it waits on)`.
    pub stalled: Vec<(NodeId, NodeId)>,
    pub elapsed: Duration,
}

impl DriveSummary {
    pub fn is_success(&self) -> bool {
        self.outcome == DriveOutcome::Completed
    }
}

impl fmt::Display for DriveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} ticks ({})",
            self.outcome,
            self.ticks,
            format_elapsed(self.elapsed)
        )?;
        for failure in &self.failures {
            write!(f, "\n  failed {} {}: {}", failure.id, failure.label, failure.error)?;
        }
        if !self.stalled.is_empty() {
            write!(f, "\n  {} node(s) blocked by failures", self.stalled.len())?;
        }
        Ok(())
    }
}
