// src/dag/progress.rs

//! Timing and progress helpers shared between the manager and step bodies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Completed/total work counters for a single node.
///
/// Both counters start at 1, so a step that never reports anything is seen
/// as fully done. Bodies that know their size call [`WorkProgress::reset`]
/// first and then [`WorkProgress::advance`] as they go.
#[derive(Debug, Clone)]
pub struct WorkProgress {
    completed: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl WorkProgress {
    pub fn new() -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(1)),
            total: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Start counting from zero towards `total` units of work.
    pub fn reset(&self, total: u64) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn advance(&self, units: u64) {
        self.completed.fetch_add(units, Ordering::Relaxed);
    }

    pub fn set_completed(&self, completed: u64) {
        self.completed.store(completed, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// `completed / total`, clamped to `[0, 1]`. A zero total counts as done.
    pub fn ratio(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        clamp_progress(self.completed() as f64 / total as f64)
    }
}

impl Default for WorkProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp an arbitrary progress value into `[0, 1]`, mapping NaN to 0.
pub fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Cooperative cancellation flag.
///
/// Setting it never interrupts anything by itself: continuations check
/// [`CancelToken::is_cancelled`] before producing children, and bodies that
/// want to stop early can await [`CancelToken::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call cancelled the token.
    pub fn cancel(&self) -> bool {
        if self.inner.is_cancelled() {
            return false;
        }
        self.inner.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}

/// Render an elapsed duration for humans: `850ms`, `12.3s`, `2m 05s`, `1h 02m`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 1 {
        format!("{}ms", elapsed.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else if secs < 60 * 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Placeholder shown for nodes that have not started yet.
pub const NOT_STARTED: &str = "--";
