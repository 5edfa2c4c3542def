//! Retry, timeout and health behavior under a paused clock

use cortex_core::{
    ModeDescriptor, ModeRegistry, ModeState, NullSink, StaticMode, TransitionCoordinator,
    TransitionOutcome,
};
use cortex_upstream::{RetryPolicy, UpstreamCaller, UpstreamError, UpstreamMode};
use pretty_assertions::assert_eq;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn refused() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_after_max_attempts_with_backoff() {
    let caller = UpstreamCaller::new("llm", RetryPolicy::default());
    let calls = AtomicU32::new(0);
    let started = Instant::now();

    let err = caller
        .call(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(refused()) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 1s after the first failure, 2s after the second, none after the last
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert!(matches!(err, UpstreamError::Exhausted { attempts: 3, .. }));
    assert!(!err.is_timeout());

    let stats = caller.stats();
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.failed_calls, 1);
    assert_eq!(stats.successful_calls, 0);
    assert_eq!(caller.health().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_on_later_attempt() {
    let caller = UpstreamCaller::new("speech", RetryPolicy::default());
    let calls = AtomicU32::new(0);

    let value = caller
        .call(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(refused())
                } else {
                    Ok("online")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "online");
    let stats = caller.stats();
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.successful_calls, 1);
    assert!((stats.success_rate - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_grows_per_attempt() {
    let caller = UpstreamCaller::new("planner", RetryPolicy::default());
    let started = Instant::now();

    let err = caller
        .call(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, io::Error>(())
        })
        .await
        .unwrap_err();

    // Timeouts 10s + 12s + 14s, delays 1s + 2s
    assert_eq!(started.elapsed(), Duration::from_secs(39));
    match err {
        UpstreamError::Exhausted { last, .. } => {
            assert!(matches!(*last, UpstreamError::TimedOut(t) if t == Duration::from_secs(14)));
        }
        other => panic!("expected exhaustion, got {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_health_window_expires() {
    let caller = UpstreamCaller::new("llm", RetryPolicy::default())
        .with_health_window(Duration::from_secs(300));

    caller.call(|| async { Ok::<_, io::Error>(()) }).await.unwrap();
    assert!(caller.is_healthy());
    assert!(caller.health().last_success.is_some());

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(!caller.is_healthy());
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_consecutive_failures() {
    let caller = UpstreamCaller::new("llm", RetryPolicy::default().with_max_attempts(1));

    for _ in 0..2 {
        let _ = caller.call(|| async { Err::<(), _>(refused()) }).await;
    }
    assert_eq!(caller.health().consecutive_failures, 2);

    caller.call(|| async { Ok::<_, io::Error>(()) }).await.unwrap();
    let health = caller.health();
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.stats.failed_calls, 2);
    assert!(health.healthy);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_upstream_mode_rolls_back() {
    let caller = Arc::new(UpstreamCaller::new("llm", RetryPolicy::default()));
    let conversation = UpstreamMode::new(
        ModeDescriptor::new("conversation"),
        Arc::clone(&caller),
        |_ctx| async { Err::<ModeState, _>(refused()) },
    );
    let registry = ModeRegistry::builder()
        .with_mode(Arc::new(StaticMode::new(ModeDescriptor::new("idle"))))
        .unwrap()
        .with_mode(Arc::new(conversation))
        .unwrap()
        .safe_mode("idle")
        .build()
        .unwrap();
    let coordinator = TransitionCoordinator::new(registry, Arc::new(NullSink));
    coordinator.start().await.unwrap();

    let outcome = coordinator.request_transition("conversation").await.unwrap();

    assert_eq!(outcome, TransitionOutcome::RolledBack("idle".into()));
    assert_eq!(caller.stats().total_attempts, 3);
    assert!(!caller.is_healthy());
}

#[test]
fn test_upstream_mode_cannot_be_safe_mode() {
    let caller = Arc::new(UpstreamCaller::new("llm", RetryPolicy::default()));
    let conversation = UpstreamMode::new(ModeDescriptor::new("conversation"), caller, |_ctx| async {
        Ok::<_, io::Error>(ModeState::empty())
    });

    let err = ModeRegistry::builder()
        .with_mode(Arc::new(conversation))
        .unwrap()
        .safe_mode("conversation")
        .build()
        .unwrap_err();

    assert!(err.is_configuration());
}
