//! Coordinator happy-path behavior: dedup, admission ordering, surface swaps.

use easel_core::{BuildRequest, CallerId, CoordinatorConfig, Surface};
use easel_test_utils::{
    coordinator_with, seeded_artifact, small_request, small_spec, RecordingSurface,
    ScriptedBuilder,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn identical_concurrent_requests_share_one_build() {
    let builder = Arc::new(ScriptedBuilder::new().with_default_delay(Duration::from_millis(200)));
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(CoordinatorConfig::new(), &builder, &surface));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(small_request("turnout")).await })
    };
    tokio::task::yield_now().await;
    let second = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(small_request("turnout")).await })
    };

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(builder.invocations(), 1);
    assert_eq!(surface.install_log(), vec![a.id]);
}

#[tokio::test(start_paused = true)]
async fn bounded_concurrency_preserves_submission_order() {
    let mut config = CoordinatorConfig::new().with_max_concurrent(2);
    config.different_signature_grace = Duration::from_millis(10);

    let builder = Arc::new(ScriptedBuilder::new().with_default_delay(Duration::from_millis(200)));
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(config, &builder, &surface));

    let metrics = ["m0", "m1", "m2", "m3", "m4"];
    let mut handles = Vec::new();
    for metric in metrics {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.submit(small_request(metric)).await
        }));
        // Stagger arrivals so admission order is well-defined
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(builder.invocations(), 5);
    assert!(builder.max_running_seen() <= 2);
    assert_eq!(
        builder.started_metrics(),
        metrics.iter().map(ToString::to_string).collect::<Vec<_>>()
    );
}

#[tokio::test(start_paused = true)]
async fn successful_swap_leaves_exactly_one_artifact() {
    let builder = Arc::new(ScriptedBuilder::new());
    let surface = Arc::new(RecordingSurface::new());
    surface.preinstall(seeded_artifact("old"));
    let coordinator = coordinator_with(CoordinatorConfig::new(), &builder, &surface);

    let new = coordinator.submit(small_request("turnout")).await.unwrap();

    let installed = surface.list().await;
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].id, new.id);
}

#[tokio::test(start_paused = true)]
async fn stale_cache_rebuilds_after_the_freshness_window() {
    let mut config = CoordinatorConfig::new();
    config.freshness_window = Duration::from_millis(100);

    let builder = Arc::new(ScriptedBuilder::new());
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = coordinator_with(config, &builder, &surface);

    let first = coordinator.submit(small_request("turnout")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = coordinator.submit(small_request("turnout")).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(builder.invocations(), 2);
}

#[tokio::test(start_paused = true)]
async fn different_signature_grace_defers_but_does_not_block() {
    let mut config = CoordinatorConfig::new();
    config.different_signature_grace = Duration::from_millis(50);

    let builder = Arc::new(ScriptedBuilder::new().with_default_delay(Duration::from_millis(500)));
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(config, &builder, &surface));

    let slow = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.submit(small_request("slow")).await })
    };
    tokio::task::yield_now().await;

    // The second request waits out the grace period, then builds
    // concurrently rather than waiting for the first to finish.
    let start = tokio::time::Instant::now();
    let other = coordinator.submit(small_request("other")).await.unwrap();
    let waited = start.elapsed();

    assert!(waited >= Duration::from_millis(50));
    assert!(waited < Duration::from_millis(1_000));
    assert_eq!(other.layer.name, "other");

    slow.await.unwrap().unwrap();
    assert_eq!(builder.invocations(), 2);
}

#[tokio::test(start_paused = true)]
async fn callers_do_not_change_the_dedup_key() {
    let builder = Arc::new(ScriptedBuilder::new().with_default_delay(Duration::from_millis(100)));
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = Arc::new(coordinator_with(CoordinatorConfig::new(), &builder, &surface));

    let ui = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator
                .submit(BuildRequest::new(small_spec("turnout"), CallerId::new("ui")))
                .await
        })
    };
    tokio::task::yield_now().await;

    let refresh = coordinator
        .submit(BuildRequest::new(
            small_spec("turnout"),
            CallerId::new("background-refresh"),
        ))
        .await
        .unwrap();

    let ui = ui.await.unwrap().unwrap();
    assert_eq!(ui.id, refresh.id);
    assert_eq!(builder.invocations(), 1);
}

#[tokio::test(start_paused = true)]
async fn current_artifact_tracks_the_latest_install() {
    let builder = Arc::new(ScriptedBuilder::new());
    let surface = Arc::new(RecordingSurface::new());
    let coordinator = coordinator_with(CoordinatorConfig::new(), &builder, &surface);

    assert!(coordinator.current_artifact().await.is_none());

    coordinator.submit(small_request("turnout")).await.unwrap();
    let margin = coordinator.submit(small_request("margin")).await.unwrap();

    let current = coordinator.current_artifact().await.unwrap();
    assert_eq!(current.id, margin.id);
    assert_eq!(surface.install_log().len(), 2);
}
