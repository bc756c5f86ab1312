use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use launchdag::dag::{Step, StepContext, StepFuture, TaskNode};

/// Shared, ordered log of `start <label>` / `end <label>` entries.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Position of `entry`, if recorded.
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }
}

/// Counters a test keeps after handing the step to the manager.
#[derive(Debug, Clone, Default)]
pub struct StepProbe {
    bodies: Arc<AtomicUsize>,
    continuations: Arc<AtomicUsize>,
}

impl StepProbe {
    /// How many times `body()` was called (i.e. the node was dispatched).
    pub fn bodies(&self) -> usize {
        self.bodies.load(Ordering::SeqCst)
    }

    /// How many times `continuation()` was called.
    pub fn continuations(&self) -> usize {
        self.continuations.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Succeed,
    Fail(String),
    Panic,
    UntilCancelled,
}

type ChildFactory = Box<dyn FnMut(&StepContext) -> Vec<TaskNode> + Send>;

/// Step with a scripted outcome, for driving the manager in tests.
pub struct ScriptedStep {
    label: String,
    takes_slot: bool,
    outcome: Outcome,
    delay: Option<Duration>,
    children: Option<ChildFactory>,
    continuation_error: Option<String>,
    progress: Option<f64>,
    journal: Option<Journal>,
    probe: StepProbe,
}

impl ScriptedStep {
    fn with_outcome(label: &str, outcome: Outcome) -> Self {
        Self {
            label: label.to_string(),
            takes_slot: true,
            outcome,
            delay: None,
            children: None,
            continuation_error: None,
            progress: None,
            journal: None,
            probe: StepProbe::default(),
        }
    }

    /// Body succeeds.
    pub fn ok(label: &str) -> Self {
        Self::with_outcome(label, Outcome::Succeed)
    }

    /// Body returns an error with `message`.
    pub fn failing(label: &str, message: &str) -> Self {
        Self::with_outcome(label, Outcome::Fail(message.to_string()))
    }

    /// Body panics.
    pub fn panicking(label: &str) -> Self {
        Self::with_outcome(label, Outcome::Panic)
    }

    /// Body waits for cancellation, then fails.
    pub fn until_cancelled(label: &str) -> Self {
        Self::with_outcome(label, Outcome::UntilCancelled)
    }

    pub fn slot_free(mut self) -> Self {
        self.takes_slot = false;
        self
    }

    /// Sleep before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Children returned from the continuation.
    pub fn with_children<F>(mut self, factory: F) -> Self
    where
        F: FnMut(&StepContext) -> Vec<TaskNode> + Send + 'static,
    {
        self.children = Some(Box::new(factory));
        self
    }

    /// Continuation returns an error instead of children.
    pub fn with_continuation_error(mut self, message: &str) -> Self {
        self.continuation_error = Some(message.to_string());
        self
    }

    /// Fixed progress override.
    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    pub fn probe(&self) -> StepProbe {
        self.probe.clone()
    }

    pub fn node(self) -> TaskNode {
        TaskNode::new(self)
    }
}

impl Step for ScriptedStep {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn takes_slot(&self) -> bool {
        self.takes_slot
    }

    fn body(&mut self, ctx: StepContext) -> StepFuture {
        self.probe.bodies.fetch_add(1, Ordering::SeqCst);
        if let Some(journal) = &self.journal {
            journal.record(format!("start {}", self.label));
        }

        let label = self.label.clone();
        let outcome = self.outcome.clone();
        let delay = self.delay;
        let journal = self.journal.clone();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let result = match outcome {
                Outcome::Succeed => Ok(()),
                Outcome::Fail(message) => Err(anyhow::anyhow!(message)),
                Outcome::Panic => panic!("scripted panic in {label}"),
                Outcome::UntilCancelled => {
                    ctx.cancelled().await;
                    Err(anyhow::anyhow!("{label} cancelled"))
                }
            };
            if let Some(journal) = journal {
                journal.record(format!("end {label}"));
            }
            result
        })
    }

    fn continuation(&mut self, ctx: &StepContext) -> anyhow::Result<Vec<TaskNode>> {
        self.probe.continuations.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.continuation_error {
            anyhow::bail!("{message}");
        }
        match self.children.as_mut() {
            Some(factory) => Ok(factory(ctx)),
            None => Ok(Vec::new()),
        }
    }

    fn progress(&self) -> Option<f64> {
        self.progress
    }
}
