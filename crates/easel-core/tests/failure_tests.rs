//! Failure containment: TTL timeouts, stale-result discard, circuit breaker,
//! backpressure, and error fan-out to joined callers.

use easel_core::{AdmissionError, CoordinatorConfig, CoordinatorError};
use easel_test_utils::{
    coordinator_with, small_request, RecordingSurface, ScriptedBuilder,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn ttl_expiry_rejects_and_discards_the_late_result() {
    let builder = Arc::new(ScriptedBuilder::new().with_default_delay(Duration::from_millis(500)));
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = coordinator_with(CoordinatorConfig::new(), &builder, &surface);

    let request = small_request("turnout").with_ttl(Duration::from_millis(100));
    let result = coordinator.submit(request).await;

    assert!(matches!(
        result,
        Err(CoordinatorError::Timeout { ttl_ms: 100, .. })
    ));

    // Let the detached build finish; its result must not reach the surface
    // or become the current artifact.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(surface.install_log().is_empty());
    assert!(coordinator.current_artifact().await.is_none());
    assert_eq!(builder.invocations(), 1);

    let snapshot = coordinator.metrics();
    assert_eq!(snapshot.total_operations, 1);
    assert_eq!(snapshot.timeout_errors, 1);
    assert_eq!(snapshot.active_operations, 0);
}

#[tokio::test(start_paused = true)]
async fn builder_failure_rejects_owner_and_joiner_identically() {
    let builder = Arc::new(
        ScriptedBuilder::new().then_fail_after(Duration::from_millis(100), "renderer crashed"),
    );
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(CoordinatorConfig::new(), &builder, &surface));

    let owner = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(small_request("turnout")).await })
    };
    tokio::task::yield_now().await;
    let joiner = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(small_request("turnout")).await })
    };

    let owner_err = owner.await.unwrap().unwrap_err();
    let joiner_err = joiner.await.unwrap().unwrap_err();

    assert!(matches!(&owner_err, CoordinatorError::Build(msg) if msg.contains("renderer crashed")));
    assert_eq!(owner_err.to_string(), joiner_err.to_string());
    assert_eq!(builder.invocations(), 1);
    assert!(surface.install_log().is_empty());
}

#[tokio::test(start_paused = true)]
async fn joined_wait_is_bounded_by_the_joiners_ttl() {
    let builder = Arc::new(ScriptedBuilder::new().with_default_delay(Duration::from_millis(400)));
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(CoordinatorConfig::new(), &builder, &surface));

    let owner = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .submit(small_request("turnout").with_ttl(Duration::from_millis(500)))
                .await
        })
    };
    tokio::task::yield_now().await;

    let impatient = coordinator
        .submit(small_request("turnout").with_ttl(Duration::from_millis(50)))
        .await;
    assert!(matches!(
        impatient,
        Err(CoordinatorError::JoinLapsed { waited_ms: 50 })
    ));

    // The owning operation is unaffected by the joiner giving up.
    assert!(owner.await.unwrap().is_ok());
    assert_eq!(builder.invocations(), 1);
}

#[tokio::test(start_paused = true)]
async fn circuit_opens_after_repeated_failures() {
    let mut config = CoordinatorConfig::new();
    config.different_signature_grace = Duration::ZERO;

    let mut builder = ScriptedBuilder::new().with_default_delay(Duration::from_millis(10));
    builder = builder.then_succeed_after(Duration::from_millis(10));
    for _ in 0..4 {
        builder = builder.then_fail_after(Duration::from_millis(10), "tile service down");
    }
    let builder = Arc::new(builder);
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(config, &builder, &surface));

    assert!(coordinator.submit(small_request("m0")).await.is_ok());

    // Four failing builds pass the breaker check before any of them has
    // recorded its failure.
    let mut handles = Vec::new();
    for metric in ["m1", "m2", "m3", "m4"] {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.submit(small_request(metric)).await
        }));
        tokio::task::yield_now().await;
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CoordinatorError::Build(_))));
    }

    // 4 failures over 5 operations: ratio 0.8 over the sample floor.
    let rejected = coordinator.submit(small_request("m5")).await;
    assert!(matches!(
        rejected,
        Err(CoordinatorError::CircuitOpen {
            timeout_errors: 4,
            total_operations: 5,
        })
    ));
    assert_eq!(builder.invocations(), 5);

    let err = rejected.unwrap_err();
    assert!(err.is_rejection());
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn open_circuit_does_not_shadow_the_fresh_cache() {
    let mut config = CoordinatorConfig::new();
    config.different_signature_grace = Duration::ZERO;

    let mut builder = ScriptedBuilder::new().with_default_delay(Duration::from_millis(10));
    builder = builder.then_succeed_after(Duration::from_millis(10));
    for _ in 0..4 {
        builder = builder.then_fail_after(Duration::from_millis(10), "tile service down");
    }
    let builder = Arc::new(builder);
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(config, &builder, &surface));

    let good = coordinator.submit(small_request("m0")).await.unwrap();

    let mut handles = Vec::new();
    for metric in ["m1", "m2", "m3", "m4"] {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.submit(small_request(metric)).await
        }));
        tokio::task::yield_now().await;
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_err());
    }
    assert!(coordinator.submit(small_request("m5")).await.is_err());

    // The freshness fast path serves before the breaker is consulted.
    let cached = coordinator.submit(small_request("m0")).await.unwrap();
    assert_eq!(cached.id, good.id);
    assert_eq!(builder.invocations(), 5);
}

#[tokio::test(start_paused = true)]
async fn overloaded_queue_rejects_new_requests() {
    let mut config = CoordinatorConfig::new()
        .with_max_concurrent(1)
        .with_max_pending(1);
    config.different_signature_grace = Duration::from_millis(10);

    let builder = Arc::new(ScriptedBuilder::new().with_default_delay(Duration::from_millis(500)));
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(config, &builder, &surface));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(small_request("m0")).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let queued = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(small_request("m1")).await })
    };
    // Let the second request clear its grace wait and occupy the backlog.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let overflow = coordinator.submit(small_request("m2")).await;
    assert!(matches!(
        overflow,
        Err(CoordinatorError::Admission(AdmissionError::QueueFull {
            max_pending: 1
        }))
    ));

    assert!(first.await.unwrap().is_ok());
    assert!(queued.await.unwrap().is_ok());
    assert_eq!(builder.invocations(), 2);
}
