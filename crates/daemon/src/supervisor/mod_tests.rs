// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::timeout;

fn always_fails(runs: Arc<AtomicU32>) -> ComponentFn {
    Arc::new(move || {
        let runs = Arc::clone(&runs);
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Err(ComponentError("boom".to_string()))
        }) as ComponentFuture
    })
}

fn runs_forever() -> ComponentFn {
    Arc::new(|| {
        Box::pin(async {
            std::future::pending::<()>().await;
            Ok(())
        }) as ComponentFuture
    })
}

fn tight_limits(max_restarts: u32) -> RestartLimits {
    RestartLimits {
        max_restarts,
        backoff: BackoffPolicy::new(Duration::from_millis(10), 2.0, Duration::from_millis(40)),
    }
}

#[tokio::test(start_paused = true)]
async fn restart_budget_exhaustion_is_fatal() {
    let runs = Arc::new(AtomicU32::new(0));
    let component = Arc::new(SupervisedComponent::with_clock(
        "doomed".to_string(),
        always_fails(Arc::clone(&runs)),
        tight_limits(3),
        SystemClock,
    ));

    let (tx, mut rx) = mpsc::channel(1);
    component.start(tx);

    let outcome = timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("component never reached a terminal outcome")
        .expect("outcome channel closed");

    assert!(matches!(
        outcome,
        Err(SupervisorError::RestartsExhausted { ref name }) if name == "doomed"
    ));

    let stats = component.get_stats();
    assert_eq!(stats.crash_count, 4);
    assert_eq!(stats.restart_count, 3);
    assert_eq!(stats.state, ComponentState::Stopped);
    assert_eq!(runs.load(Ordering::SeqCst), 4);
    assert!(stats.last_crash_time.is_some());
}

#[tokio::test]
async fn clean_exit_is_permanent_success() {
    let runs = Arc::new(AtomicU32::new(0));
    let runs_in = Arc::clone(&runs);
    let run_fn: ComponentFn = Arc::new(move || {
        let runs = Arc::clone(&runs_in);
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }) as ComponentFuture
    });

    let component = Arc::new(SupervisedComponent::with_clock(
        "oneshot".to_string(),
        run_fn,
        tight_limits(5),
        SystemClock,
    ));
    let (tx, mut rx) = mpsc::channel(1);
    component.start(tx);

    let outcome = rx.recv().await.expect("outcome channel closed");
    assert!(matches!(outcome, Ok(ref name) if name == "oneshot"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(component.get_stats().crash_count, 0);
    assert_eq!(component.get_stats().state, ComponentState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_short_circuits_without_restart() {
    let runs = Arc::new(AtomicU32::new(0));
    let limits = RestartLimits {
        max_restarts: 5,
        backoff: BackoffPolicy::new(Duration::from_secs(3600), 2.0, Duration::from_secs(3600)),
    };
    let component = Arc::new(SupervisedComponent::with_clock(
        "slow-retry".to_string(),
        always_fails(Arc::clone(&runs)),
        limits,
        SystemClock,
    ));
    let (tx, _rx) = mpsc::channel(1);
    component.start(tx);

    // Let the first crash land and the backoff wait begin.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(component.get_stats().state, ComponentState::Restarting);

    timeout(Duration::from_secs(5), component.stop())
        .await
        .expect("stop did not return promptly");

    let stats = component.get_stats();
    assert_eq!(stats.state, ComponentState::Stopped);
    assert_eq!(stats.restart_count, 0);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_cancels_in_flight_run() {
    let component = Arc::new(SupervisedComponent::with_clock(
        "forever".to_string(),
        runs_forever(),
        tight_limits(1),
        SystemClock,
    ));
    let (tx, _rx) = mpsc::channel(1);
    component.start(tx);
    tokio::task::yield_now().await;

    timeout(Duration::from_secs(5), component.stop())
        .await
        .expect("stop did not return promptly");
    assert_eq!(component.get_stats().state, ComponentState::Stopped);
}

#[tokio::test]
async fn duplicate_component_names_are_rejected() {
    let mut supervisor = Supervisor::new();
    supervisor.add_component("agent", runs_forever(), tight_limits(1)).unwrap();
    let err = supervisor.add_component("agent", runs_forever(), tight_limits(1)).unwrap_err();
    assert!(matches!(err, SupervisorError::DuplicateName(ref name) if name == "agent"));
}

#[tokio::test(start_paused = true)]
async fn first_fatal_component_trips_process_shutdown() {
    let runs = Arc::new(AtomicU32::new(0));
    let mut supervisor = Supervisor::new();
    supervisor.add_component("healthy", runs_forever(), tight_limits(5)).unwrap();
    supervisor
        .add_component("doomed", always_fails(Arc::clone(&runs)), tight_limits(0))
        .unwrap();

    let shutdown = supervisor.shutdown_token();
    supervisor.start_all();

    timeout(Duration::from_secs(60), shutdown.cancelled())
        .await
        .expect("shutdown token was never tripped");

    supervisor.stop_all().await;

    let stats = supervisor.get_all_stats();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats["doomed"].crash_count, 1);
    assert_eq!(stats["doomed"].state, ComponentState::Stopped);
    assert_eq!(stats["healthy"].state, ComponentState::Stopped);
}

#[tokio::test]
async fn clean_exit_does_not_trip_shutdown() {
    let mut supervisor = Supervisor::new();
    let run_fn: ComponentFn = Arc::new(|| Box::pin(async { Ok(()) }) as ComponentFuture);
    supervisor.add_component("oneshot", run_fn, tight_limits(1)).unwrap();

    let shutdown = supervisor.shutdown_token();
    supervisor.start_all();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown.is_cancelled());
    supervisor.stop_all().await;
}
