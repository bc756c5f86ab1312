// src/engine/driver.rs

use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::dag::{TaskManager, TickReport};
use crate::exec::Dispatcher;
use crate::types::FailurePolicy;

use super::{DriveOutcome, DriveSummary, DriverEvent, DriverOptions};

enum Wakeup {
    Tick,
    Event(Option<DriverEvent>),
}

/// Ticks a [`TaskManager`] on a fixed interval until the forest completes,
/// stalls, aborts or a shutdown is requested.
///
/// All scheduling decisions stay in the manager; the driver only decides
/// *when* to tick and *when* to stop.
pub struct Driver<D: Dispatcher> {
    manager: TaskManager<D>,
    event_rx: mpsc::Receiver<DriverEvent>,
    events_open: bool,
    options: DriverOptions,
}

impl<D: Dispatcher + fmt::Debug> fmt::Debug for Driver<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("manager", &self.manager)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<D: Dispatcher> Driver<D> {
    pub fn new(
        manager: TaskManager<D>,
        event_rx: mpsc::Receiver<DriverEvent>,
        options: DriverOptions,
    ) -> Self {
        Self {
            manager,
            event_rx,
            events_open: true,
            options,
        }
    }

    pub fn manager(&self) -> &TaskManager<D> {
        &self.manager
    }

    pub fn into_manager(self) -> TaskManager<D> {
        self.manager
    }

    /// Main loop.
    ///
    /// - Ticks the manager every `tick_interval`.
    /// - Applies events from `event_rx` between ticks.
    /// - Returns once an exit condition is met.
    pub async fn run(&mut self) -> DriveSummary {
        info!(
            tick_ms = self.options.tick_interval.as_millis() as u64,
            policy = ?self.options.failure_policy,
            limit = self.manager.concurrency_limit(),
            "launchdag driver started"
        );
        let started = Instant::now();

        let mut interval = time::interval(self.options.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            let wakeup = tokio::select! {
                _ = interval.tick() => Wakeup::Tick,
                event = self.event_rx.recv(), if self.events_open => Wakeup::Event(event),
            };

            match wakeup {
                Wakeup::Tick => {
                    let report = self.manager.tick();
                    if let Some(outcome) = self.after_tick(&report) {
                        break outcome;
                    }
                }
                Wakeup::Event(Some(event)) => {
                    if let Some(outcome) = self.handle_event(event) {
                        break outcome;
                    }
                }
                Wakeup::Event(None) => {
                    debug!("driver event channel closed");
                    self.events_open = false;
                }
            }
        };

        let summary = DriveSummary {
            outcome,
            ticks: self.manager.ticks(),
            failures: self.manager.failures(),
            stalled: self.manager.stalled(),
            elapsed: started.elapsed(),
        };
        info!(
            outcome = %summary.outcome,
            ticks = summary.ticks,
            failures = summary.failures.len(),
            "launchdag driver exiting"
        );
        summary
    }

    fn handle_event(&mut self, event: DriverEvent) -> Option<DriveOutcome> {
        debug!(?event, "driver received event");
        match event {
            DriverEvent::Submit(nodes) => {
                let ids = self.manager.submit_all(nodes);
                info!(count = ids.len(), "submitted nodes");
                None
            }
            DriverEvent::Cancel(id) => {
                self.manager.cancel(id);
                None
            }
            DriverEvent::ShutdownRequested => {
                info!("shutdown requested; cancelling live nodes");
                self.manager.cancel_all();
                Some(DriveOutcome::Interrupted)
            }
        }
    }

    fn after_tick(&mut self, report: &TickReport) -> Option<DriveOutcome> {
        if !report.is_quiet() {
            debug!(
                tick = report.tick,
                dispatched = report.dispatched.len(),
                finalized = report.finalized.len(),
                spawned = report.spawned.len(),
                failed = report.failed.len(),
                slots = report.slots_in_use,
                "tick"
            );
        }

        if self.options.report_every > 0 && report.tick % self.options.report_every == 0 {
            info!(
                tick = report.tick,
                progress = %format!("{:.0}%", self.manager.overall_progress() * 100.0),
                running = self.manager.running().count(),
                pending = self.manager.pending().len(),
                "progress"
            );
            for view in self.manager.live_views() {
                debug!(
                    node = %view.id,
                    label = %view.label,
                    state = ?view.state,
                    progress = %format!("{:.0}%", view.progress * 100.0),
                    elapsed = %view.elapsed,
                    "live node"
                );
            }
        }

        if !report.failed.is_empty() && self.options.failure_policy == FailurePolicy::Abort {
            error!(failed = ?report.failed, "node failed; aborting run");
            self.manager.cancel_all();
            return Some(DriveOutcome::Aborted);
        }

        let may_exit = self.options.exit_when_idle || !self.events_open;
        if !may_exit {
            return None;
        }

        if self.manager.is_complete() {
            return Some(DriveOutcome::Completed);
        }
        if self.manager.is_settled() {
            warn!(
                blocked = self.manager.stalled().len(),
                "no further progress possible; stopping"
            );
            return Some(DriveOutcome::Stalled);
        }
        None
    }
}
