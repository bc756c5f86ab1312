#![allow(dead_code)]

pub use launchdag_test_utils::{init_tracing, with_timeout};

use launchdag::dag::{NodeId, NodeState, TaskManager};
use launchdag_test_utils::QueuedDispatcher;

/// Manager wired to a queued dispatcher, plus the test's handle to the queue.
pub fn queued_manager(limit: usize) -> (TaskManager<QueuedDispatcher>, QueuedDispatcher) {
    let dispatcher = QueuedDispatcher::new();
    let manager = TaskManager::with_dispatcher(limit, dispatcher.clone());
    (manager, dispatcher)
}

/// Alternate ticking and completing every queued body until nothing changes.
///
/// Returns the number of ticks taken. Panics after `max_ticks`.
pub async fn drive_to_rest(
    manager: &mut TaskManager<QueuedDispatcher>,
    dispatcher: &QueuedDispatcher,
    max_ticks: usize,
) -> usize {
    for n in 1..=max_ticks {
        let report = manager.tick();
        let ran = dispatcher.run_all().await;
        if report.is_quiet() && ran.is_empty() && report.spawned.is_empty() {
            return n;
        }
    }
    panic!("forest did not come to rest within {max_ticks} ticks");
}

pub fn state(manager: &TaskManager<QueuedDispatcher>, id: NodeId) -> NodeState {
    manager.state(id).expect("node was submitted")
}
