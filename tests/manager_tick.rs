mod common;
use crate::common::{drive_to_rest, init_tracing, queued_manager, state};

use launchdag::dag::{NodeState, TaskNode};
use launchdag_test_utils::{Journal, ScriptedStep};

#[tokio::test]
async fn root_runs_then_finalizes_with_children() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let step = ScriptedStep::ok("root").with_children(|_| {
        vec![ScriptedStep::ok("c1").node(), ScriptedStep::ok("c2").node()]
    });
    let probe = step.probe();
    let root = manager.submit(step.node());

    let report = manager.tick();
    assert_eq!(report.dispatched, vec![root]);
    assert_eq!(state(&manager, root), NodeState::Started);

    assert!(dispatcher.complete(root).await);
    assert_eq!(state(&manager, root), NodeState::Finished);

    let report = manager.tick();
    assert_eq!(probe.continuations(), 1);
    assert_eq!(report.finalized, vec![root]);
    assert_eq!(report.spawned.len(), 2);
    assert_eq!(state(&manager, root), NodeState::Finalized);

    let children = manager.forest().get(root).unwrap().children().to_vec();
    assert_eq!(children, report.spawned);
    for child in &children {
        assert_eq!(state(&manager, *child), NodeState::Pending);
        assert_eq!(manager.forest().get(*child).unwrap().parent(), Some(root));
        assert_eq!(manager.generation(*child), 1);
    }
    assert!(!manager.is_branch_finished(root));
    assert_eq!(manager.unfinished_roots(), &[root]);
}

#[tokio::test]
async fn single_slot_starts_only_the_first_submitted_root() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let r1 = manager.submit(ScriptedStep::ok("r1").node());
    let r2 = manager.submit(ScriptedStep::ok("r2").node());

    let report = manager.tick();
    assert_eq!(report.dispatched, vec![r1]);
    assert_eq!(state(&manager, r1), NodeState::Started);
    assert_eq!(state(&manager, r2), NodeState::Pending);
    assert_eq!(manager.slots_in_use(), 1);

    // Still blocked while r1 runs.
    let report = manager.tick();
    assert!(report.dispatched.is_empty());
    assert_eq!(state(&manager, r2), NodeState::Pending);
    assert_eq!(dispatcher.dispatched(), vec![r1]);
}

#[tokio::test]
async fn slot_bound_dispatches_in_fifo_order() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(2);

    let ids = manager.submit_all(vec![
        ScriptedStep::ok("a").node(),
        ScriptedStep::ok("b").node(),
        ScriptedStep::ok("c").node(),
    ]);
    let (a, b, c) = (ids[0], ids[1], ids[2]);

    let report = manager.tick();
    assert_eq!(report.dispatched, vec![a, b]);
    assert_eq!(report.slots_in_use, 2);
    assert_eq!(state(&manager, c), NodeState::Pending);

    assert!(dispatcher.complete(a).await);
    manager.tick();
    // `a` is pruned in the tick it finalizes; `c` waits one more tick.
    assert_eq!(state(&manager, c), NodeState::Pending);

    let report = manager.tick();
    assert_eq!(report.dispatched, vec![c]);
    assert_eq!(dispatcher.dispatched(), vec![a, b, c]);
}

#[tokio::test]
async fn slot_free_nodes_bypass_the_bound() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(0);

    let busy = manager.submit(ScriptedStep::ok("busy").node());
    let free = manager.submit(ScriptedStep::ok("free").slot_free().node());
    let forced = manager.submit(ScriptedStep::ok("forced").node().with_slot(false));

    let report = manager.tick();
    assert_eq!(report.dispatched, vec![free, forced]);
    assert_eq!(report.slots_in_use, 0);
    assert_eq!(state(&manager, busy), NodeState::Pending);

    drive_to_rest(&mut manager, &dispatcher, 10).await;
    assert_eq!(state(&manager, busy), NodeState::Pending);
    assert!(!manager.is_complete());
}

#[tokio::test]
async fn dependent_waits_for_whole_branch() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(4);
    let journal = Journal::new();

    let j = journal.clone();
    let a = ScriptedStep::ok("a")
        .with_journal(&journal)
        .with_children(move |_| vec![ScriptedStep::ok("a.child").with_journal(&j).node()])
        .node();
    let a_id = a.id();
    let b = ScriptedStep::ok("b").with_journal(&journal).node().after([a_id]);
    let b_id = b.id();

    // Dependent submitted first; still has to wait.
    manager.submit(b);
    manager.submit(a);

    manager.tick();
    assert_eq!(state(&manager, b_id), NodeState::Pending);
    assert!(!manager.can_run(b_id));

    drive_to_rest(&mut manager, &dispatcher, 20).await;

    assert!(manager.is_complete());
    let child_end = journal.position("end a.child").unwrap();
    let b_start = journal.position("start b").unwrap();
    assert!(child_end < b_start, "journal: {:?}", journal.entries());
}

#[tokio::test]
async fn extra_conditions_gate_readiness() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);
    let open = Arc::new(AtomicBool::new(false));

    let gate = Arc::clone(&open);
    let id = manager.submit(
        ScriptedStep::ok("gated")
            .node()
            .with_condition(move || gate.load(Ordering::SeqCst)),
    );

    manager.tick();
    assert_eq!(state(&manager, id), NodeState::Pending);

    open.store(true, Ordering::SeqCst);
    let report = manager.tick();
    assert_eq!(report.dispatched, vec![id]);
    assert!(dispatcher.complete(id).await);
}

#[tokio::test]
async fn self_dependency_is_ignored_and_nodes_stay_distinct() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let node = ScriptedStep::ok("solo").node();
    let id = node.id();
    let node = node.after([id]);
    assert!(node.required().is_empty());

    manager.submit(node);
    // A fresh node with the same label is a different node.
    let other = manager.submit(TaskNode::new(ScriptedStep::ok("solo")));
    assert_ne!(id, other);
    assert_eq!(manager.forest().len(), 2);
    assert_eq!(manager.pending(), &[id, other]);

    drive_to_rest(&mut manager, &dispatcher, 10).await;
    assert!(manager.is_complete());
    assert_eq!(manager.overall_progress(), 1.0);
}

#[tokio::test]
async fn continuation_runs_exactly_once() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let step = ScriptedStep::ok("once");
    let probe = step.probe();
    let id = manager.submit(step.node());

    drive_to_rest(&mut manager, &dispatcher, 10).await;
    for _ in 0..5 {
        manager.tick();
    }

    assert_eq!(probe.bodies(), 1);
    assert_eq!(probe.continuations(), 1);
    assert_eq!(state(&manager, id), NodeState::Finalized);
    assert!(manager.is_idle());
}

#[tokio::test]
async fn continuation_error_finalizes_without_children() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let id = manager.submit(
        ScriptedStep::ok("broken")
            .with_children(|_| vec![ScriptedStep::ok("never").node()])
            .with_continuation_error("listing failed")
            .node(),
    );

    drive_to_rest(&mut manager, &dispatcher, 10).await;

    assert_eq!(state(&manager, id), NodeState::Finalized);
    assert!(manager.forest().get(id).unwrap().children().is_empty());
    assert!(manager.is_complete());
}

#[tokio::test]
async fn progress_and_views() {
    init_tracing();
    let (mut manager, dispatcher) = queued_manager(1);

    let half = manager.submit(ScriptedStep::ok("half").with_progress(0.5).node());
    let over = manager.submit(ScriptedStep::ok("over").with_progress(7.0).node());

    let view = manager.view(half).unwrap();
    assert_eq!(view.elapsed, "--");
    assert_eq!(view.progress, 0.5);
    assert_eq!(manager.view(over).unwrap().progress, 1.0);
    assert_eq!(manager.overall_progress(), 0.75);

    manager.tick();
    let live = manager.live_views();
    assert_eq!(live.len(), 2);
    assert_eq!(live[0].state, NodeState::Started);
    assert_ne!(live[0].elapsed, "--");

    drive_to_rest(&mut manager, &dispatcher, 10).await;
    assert!(manager.live_views().is_empty());
}
