mod common;
use crate::common::{drive_to_rest, init_tracing, queued_manager, state, with_timeout};

use launchdag::dag::{NodeState, TaskNode};
use launchdag_test_utils::ScriptedStep;

#[tokio::test]
async fn cancelled_continuation_spawns_nothing() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let id = manager.submit(
        ScriptedStep::ok("sync")
            .with_children(|ctx| {
                if ctx.is_cancelled() {
                    Vec::new()
                } else {
                    vec![ScriptedStep::ok("deploy").node()]
                }
            })
            .node(),
    );

    manager.tick();
    assert_eq!(manager.cancel(id), 1);
    // Second request is a no-op.
    assert_eq!(manager.cancel(id), 0);

    drive_to_rest(&mut manager, &dispatcher, 10).await;
    assert_eq!(state(&manager, id), NodeState::Finalized);
    assert!(manager.forest().get(id).unwrap().children().is_empty());
    assert!(manager.view(id).unwrap().cancelled);
    assert!(manager.is_complete());
}

#[tokio::test]
async fn cancel_reaches_known_descendants() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(4);

    let root = manager.submit(
        ScriptedStep::ok("root")
            .with_children(|_| {
                vec![
                    ScriptedStep::until_cancelled("c1").node(),
                    ScriptedStep::until_cancelled("c2").node(),
                ]
            })
            .node(),
    );

    manager.tick();
    dispatcher.run_all().await;
    manager.tick(); // finalize root, spawn children
    manager.tick(); // dispatch children
    assert_eq!(dispatcher.len(), 2);

    assert_eq!(manager.cancel(root), 3);

    // Bodies honour the token and fail.
    with_timeout(dispatcher.run_all()).await;
    drive_to_rest(&mut manager, &dispatcher, 10).await;
    assert_eq!(manager.failures().len(), 2);
    assert!(manager.is_settled());
}

#[tokio::test]
async fn cancel_all_flags_pending_and_running() {
    init_tracing();
    let (mut manager, _dispatcher) = queued_manager(1);

    let running = manager.submit(ScriptedStep::ok("running").node());
    let pending = manager.submit(ScriptedStep::ok("pending").node());
    manager.tick();

    assert_eq!(manager.cancel_all(), 2);
    assert_eq!(manager.cancel_all(), 0);
    assert!(manager.forest().get(running).unwrap().is_cancelled());
    assert!(manager.forest().get(pending).unwrap().is_cancelled());

    // Cancellation is cooperative: nothing is pulled out of the loop.
    assert_eq!(state(&manager, running), NodeState::Started);
    assert_eq!(state(&manager, pending), NodeState::Pending);
}

#[tokio::test]
async fn unsubmitted_dependency_is_unsatisfied() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let ghost = TaskNode::new(ScriptedStep::ok("ghost"));
    let waiting = manager.submit(ScriptedStep::ok("waiting").node().after([ghost.id()]));

    drive_to_rest(&mut manager, &dispatcher, 5).await;
    assert_eq!(state(&manager, waiting), NodeState::Pending);
    assert!(!manager.is_settled());

    manager.submit(ghost);
    drive_to_rest(&mut manager, &dispatcher, 10).await;
    assert!(manager.is_complete());
}
