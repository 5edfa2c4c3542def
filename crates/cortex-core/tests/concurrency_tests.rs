//! Mutual exclusion under concurrent transition requests

use cortex_core::{TransitionCoordinator, TransitionError, TransitionOutcome};
use cortex_test_utils::{
    registry_of, started_coordinator, ConcurrencyProbe, RecordingSink, ScriptedMode,
};
use futures::future::join_all;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_second_request_is_rejected_not_queued() {
    let navigate = ScriptedMode::new("navigate")
        .with_delay(Duration::from_millis(50))
        .shared();
    let manipulate = ScriptedMode::new("manipulate").shared();
    let coordinator = started_coordinator(
        vec![ScriptedMode::new("idle").shared(), navigate, manipulate.clone()],
        "idle",
        RecordingSink::new(),
    )
    .await;

    let (first, second) = tokio::join!(
        coordinator.request_transition("navigate"),
        coordinator.request_transition("manipulate"),
    );

    assert_eq!(first.unwrap(), TransitionOutcome::Committed("navigate".into()));
    assert!(matches!(second, Err(TransitionError::TransitionInProgress)));
    // Rejected request never ran and never retried in the background
    assert_eq!(manipulate.activations(), 0);
    assert_eq!(coordinator.current_mode().unwrap().as_str(), "navigate");
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_requests_commits_exactly_one() {
    let probe = ConcurrencyProbe::new();
    let modes: Vec<_> = ["idle", "navigate", "manipulate", "inspect"]
        .into_iter()
        .map(|id| {
            ScriptedMode::new(id)
                .with_delay(Duration::from_millis(20))
                .with_probe(probe.clone())
                .shared()
        })
        .collect();
    let coordinator = started_coordinator(modes, "idle", RecordingSink::new()).await;

    let targets = ["navigate", "manipulate", "inspect", "idle"];
    let results = join_all(
        (0..32).map(|i| coordinator.request_transition(targets[i % targets.len()])),
    )
    .await;

    let committed = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(TransitionError::TransitionInProgress)))
        .count();
    assert_eq!(committed, 1);
    assert_eq!(rejected, 31);
    assert_eq!(probe.max_concurrent(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_callers_never_overlap_activations() {
    let probe = ConcurrencyProbe::new();
    let modes: Vec<_> = ["idle", "navigate", "manipulate"]
        .into_iter()
        .map(|id| {
            ScriptedMode::new(id)
                .with_delay(Duration::from_millis(1))
                .with_probe(probe.clone())
                .shared()
        })
        .collect();
    let coordinator = started_coordinator(modes, "idle", RecordingSink::new()).await;

    let mut handles = Vec::new();
    for worker in 0..8 {
        let coordinator = coordinator.clone();
        handles.push(tokio::spawn(async move {
            let targets = ["navigate", "manipulate", "idle"];
            let mut committed = 0usize;
            for round in 0..25 {
                match coordinator
                    .request_transition(targets[(worker + round) % targets.len()])
                    .await
                {
                    Ok(outcome) => {
                        assert!(outcome.is_committed());
                        committed += 1;
                    }
                    Err(TransitionError::TransitionInProgress) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
                tokio::task::yield_now().await;
            }
            committed
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }

    assert!(total >= 1);
    assert_eq!(probe.max_concurrent(), 1);
    assert!(!coordinator.is_transition_in_progress());
    // Startup plus every committed request, bounded by the history limit
    assert_eq!(coordinator.history().len(), (total + 1).min(64));
}

#[tokio::test(start_paused = true)]
async fn test_lock_is_held_until_recovery_settles() {
    let idle = ScriptedMode::new("idle")
        .with_delay(Duration::from_millis(100))
        .shared();
    let navigate = ScriptedMode::new("navigate").failing().shared();
    // Never started: no snapshot, so the failure escalates to the slow safe mode
    let coordinator = TransitionCoordinator::new(
        registry_of(vec![idle.clone(), navigate.clone()], "idle"),
        RecordingSink::new(),
    );

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_transition("navigate").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(coordinator.is_transition_in_progress());
    let second = coordinator.request_transition("navigate").await;
    let first = first.await.unwrap();

    assert_eq!(first.unwrap(), TransitionOutcome::SafeModeEngaged);
    assert!(matches!(second, Err(TransitionError::TransitionInProgress)));
    assert_eq!(navigate.activations(), 1);
    assert_eq!(idle.activations(), 1);
    assert_eq!(coordinator.current_mode().unwrap().as_str(), "idle");
    assert!(!coordinator.is_transition_in_progress());
}
