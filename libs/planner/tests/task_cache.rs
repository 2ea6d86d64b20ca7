//! Freshness, invalidation and ordering behavior of the task store

mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use common::ManualClock;
use planner::{AppEvent, EventBus, LoadOutcome, TaskStore};
use support::{FakeBackend, project_task, scheduled, unscheduled, wait_for};

fn store_with(backend: Arc<FakeBackend>) -> (Arc<TaskStore>, ManualClock) {
    let clock = ManualClock::default();
    let store = Arc::new(TaskStore::with_clock(backend, clock.shared()));
    (store, clock)
}

#[tokio::test]
async fn test_fresh_cache_serves_without_fetching() {
    let backend = Arc::new(FakeBackend::new().with_scheduled(vec![scheduled("s1", "Review", 0, 9)]));
    let (store, clock) = store_with(backend.clone());

    assert_eq!(store.load(false).await, LoadOutcome::Reloaded);
    assert_eq!(backend.fetch_count(), 1);

    clock.advance(Duration::minutes(5));
    assert_eq!(store.load(false).await, LoadOutcome::Cached);
    assert_eq!(backend.fetch_count(), 1);
    assert_eq!(store.snapshot().scheduled.len(), 1);

    assert_eq!(store.load(true).await, LoadOutcome::Reloaded);
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn test_stale_cache_reloads() {
    let backend = Arc::new(FakeBackend::new());
    let (store, clock) = store_with(backend.clone());

    store.load(false).await;
    clock.advance(Duration::minutes(16));

    assert_eq!(store.load(false).await, LoadOutcome::Reloaded);
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn test_reload_normalizes_colors_and_merges_project_tasks() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_scheduled(vec![scheduled("s1", "Inbox", 2, 10)])
            .with_unscheduled(vec![unscheduled("u1", "Write report", "deepwork", "1 hour")])
            .with_project(vec![project_task("g1", "st1", "Marathon: run 5k")]),
    );
    let (store, _clock) = store_with(backend);

    store.refresh().await;
    let snapshot = store.snapshot();

    assert!(!snapshot.loading);
    assert_eq!(snapshot.scheduled[0].color, "#F59E0B");

    let ids: Vec<&str> = snapshot.unscheduled.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "project-g1-ongoing-st1"]);
    assert_eq!(snapshot.unscheduled[0].color, "#3B82F6");
}

#[tokio::test]
async fn test_task_moved_triggers_exactly_one_reload() {
    let backend = Arc::new(FakeBackend::new());
    let (store, _clock) = store_with(backend.clone());
    let bus = EventBus::default();
    let listener = store.listen(&bus);

    store.load(false).await;
    assert_eq!(backend.fetch_count(), 1);

    bus.publish(AppEvent::TaskMoved);
    wait_for(|| backend.fetch_count() == 2).await;

    tokio::time::sleep(StdDuration::from_millis(50)).await;
    assert_eq!(backend.fetch_count(), 2);

    listener.abort();
}

#[tokio::test]
async fn test_focus_refreshes_only_stale_cache() {
    let backend = Arc::new(FakeBackend::new());
    let (store, clock) = store_with(backend.clone());
    let bus = EventBus::default();
    let listener = store.listen(&bus);

    store.load(false).await;

    bus.publish(AppEvent::WindowFocused);
    bus.publish(AppEvent::VisibilityChanged { visible: false });
    tokio::time::sleep(StdDuration::from_millis(50)).await;
    assert_eq!(backend.fetch_count(), 1);

    clock.advance(Duration::minutes(20));
    bus.publish(AppEvent::VisibilityChanged { visible: true });
    wait_for(|| backend.fetch_count() == 2).await;

    listener.abort();
}

#[tokio::test]
async fn test_background_failure_keeps_stale_data() {
    let backend = Arc::new(FakeBackend::new().with_scheduled(vec![scheduled("s1", "Review", 0, 9)]));
    let (store, clock) = store_with(backend.clone());

    store.load(false).await;
    backend
        .fail_fetches
        .store(true, std::sync::atomic::Ordering::SeqCst);
    clock.advance(Duration::minutes(30));

    assert_eq!(store.background_refresh().await, LoadOutcome::Failed);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.scheduled.len(), 1);
    assert_eq!(snapshot.error, None);
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn test_late_reload_does_not_overwrite_newer_result() {
    let backend = Arc::new(FakeBackend::new().with_scheduled(vec![scheduled("s1", "Old", 0, 9)]));
    backend
        .fetch_delays
        .lock()
        .unwrap()
        .extend([StdDuration::from_millis(200), StdDuration::ZERO]);
    let (store, _clock) = store_with(backend.clone());

    let slow = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.refresh().await })
    };
    wait_for(|| backend.fetch_count() == 1).await;

    backend
        .state
        .lock()
        .unwrap()
        .scheduled
        .push(scheduled("s2", "New", 1, 10));
    assert_eq!(store.refresh().await, LoadOutcome::Reloaded);

    assert_eq!(slow.await.unwrap(), LoadOutcome::Superseded);
    assert_eq!(store.snapshot().scheduled.len(), 2);
}

#[tokio::test]
async fn test_write_during_first_load_still_finishes_loading() {
    let backend = Arc::new(FakeBackend::new().with_scheduled(vec![scheduled("s1", "Review", 0, 9)]));
    backend
        .fetch_delays
        .lock()
        .unwrap()
        .push_back(StdDuration::from_millis(200));
    let (store, _clock) = store_with(backend.clone());

    let first = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.load(false).await })
    };
    wait_for(|| backend.fetch_count() == 1).await;

    store.update_unscheduled(Vec::new()).await;

    assert_eq!(first.await.unwrap(), LoadOutcome::Reloaded);
    assert_eq!(backend.fetch_count(), 2);

    let snapshot = store.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.scheduled.len(), 1);
    assert_eq!(snapshot.scheduled[0].id, "s1");
}

#[tokio::test]
async fn test_optimistic_update_extends_freshness() {
    let backend = Arc::new(FakeBackend::new().with_scheduled(vec![scheduled("s1", "Review", 0, 9)]));
    let (store, clock) = store_with(backend.clone());

    store.load(false).await;
    clock.advance(Duration::minutes(14));
    store.update_scheduled(Vec::new()).await;
    clock.advance(Duration::minutes(10));

    assert_eq!(store.load(false).await, LoadOutcome::Cached);
    assert_eq!(backend.fetch_count(), 1);
    assert!(store.snapshot().scheduled.is_empty());
}

#[tokio::test]
async fn test_mount_preloads_once() {
    let backend = Arc::new(FakeBackend::new());
    let (store, _clock) = store_with(backend.clone());

    assert_eq!(store.mount().await, LoadOutcome::Reloaded);
    tokio::time::sleep(StdDuration::from_millis(250)).await;
    assert_eq!(backend.fetch_count(), 1);

    assert_eq!(store.mount().await, LoadOutcome::Cached);
    assert_eq!(backend.fetch_count(), 1);
}
