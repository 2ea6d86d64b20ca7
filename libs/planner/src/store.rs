//! Time-boxed cache of the scheduled and unscheduled task collections
//!
//! A [`TaskStore`] is the single owner of the cached collections. Readers
//! take a [`TaskSnapshot`] or watch for changes; writers go through the
//! store's methods. Every reload and every optimistic write takes a sequence
//! number, and a reload that completes after a newer write has been applied
//! is discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use common::{SharedClock, SystemClock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::TaskBackend;
use crate::colors::ensure_task_color;
use crate::error::PlannerResult;
use crate::events::{AppEvent, EventBus};
use crate::models::{ScheduledTask, UnscheduledTask};

/// How long fetched collections are served without a reload
pub const FRESHNESS_WINDOW_MINUTES: i64 = 15;

/// Delay before the opportunistic preload after the first mount
pub const PRELOAD_DELAY: StdDuration = StdDuration::from_millis(100);

pub const LOAD_ERROR_MESSAGE: &str = "Failed to load tasks";

/// What consumers render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSnapshot {
    pub scheduled: Vec<ScheduledTask>,
    /// Plain unscheduled tasks followed by project-derived ones
    pub unscheduled: Vec<UnscheduledTask>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Fresh cached data was served, nothing was fetched
    Cached,
    Reloaded,
    /// The fetch finished after a newer write and was dropped
    Superseded,
    Failed,
}

#[derive(Debug)]
struct CacheEntry {
    scheduled: Vec<ScheduledTask>,
    unscheduled: Vec<UnscheduledTask>,
    last_fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StoreState {
    entry: Option<CacheEntry>,
    applied_seq: u64,
}

pub struct TaskStore {
    backend: Arc<dyn TaskBackend>,
    clock: SharedClock,
    freshness: Duration,
    state: Mutex<StoreState>,
    next_seq: AtomicU64,
    snapshot: watch::Sender<TaskSnapshot>,
}

impl TaskStore {
    pub fn new(backend: Arc<dyn TaskBackend>) -> Self {
        Self::with_clock(backend, SystemClock::shared())
    }

    pub fn with_clock(backend: Arc<dyn TaskBackend>, clock: SharedClock) -> Self {
        let (snapshot, _) = watch::channel(TaskSnapshot {
            loading: true,
            ..TaskSnapshot::default()
        });

        Self {
            backend,
            clock,
            freshness: Duration::minutes(FRESHNESS_WINDOW_MINUTES),
            state: Mutex::new(StoreState::default()),
            next_seq: AtomicU64::new(0),
            snapshot,
        }
    }

    /// Current published state
    pub fn snapshot(&self) -> TaskSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.snapshot.subscribe()
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.clock.now() - entry.last_fetched_at < self.freshness
    }

    /// Serve fresh cached data, reloading when stale, empty or forced
    pub async fn load(&self, force: bool) -> LoadOutcome {
        {
            let state = self.state.lock().await;

            match state.entry.as_ref() {
                Some(entry) if self.is_fresh(entry) => {
                    self.snapshot.send_modify(|snapshot| {
                        snapshot.scheduled = entry.scheduled.clone();
                        snapshot.unscheduled = entry.unscheduled.clone();
                        snapshot.loading = false;
                        snapshot.error = None;
                    });

                    if !force {
                        debug!("Serving cached tasks");
                        return LoadOutcome::Cached;
                    }
                }
                Some(_) => {}
                None => self.snapshot.send_modify(|snapshot| {
                    snapshot.loading = true;
                    snapshot.error = None;
                }),
            }
        }

        self.reload(true).await
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.load(true).await
    }

    /// Silent reload, skipped while the cache is fresh
    pub async fn background_refresh(&self) -> LoadOutcome {
        {
            let state = self.state.lock().await;
            if let Some(entry) = state.entry.as_ref() {
                if self.is_fresh(entry) {
                    return LoadOutcome::Cached;
                }
            }
        }

        self.reload(false).await
    }

    async fn reload(&self, report_errors: bool) -> LoadOutcome {
        loop {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let fetched = self.fetch_all().await;

            let mut state = self.state.lock().await;
            if seq < state.applied_seq && fetched.is_ok() {
                // Nothing cached yet: the result is still needed, fetch again
                // so the newer write is part of it
                if state.entry.is_none() {
                    debug!(
                        "Reload #{} superseded by #{} before the first load, fetching again",
                        seq, state.applied_seq
                    );
                    continue;
                }

                debug!(
                    "Discarding reload #{} superseded by #{}",
                    seq, state.applied_seq
                );
                self.snapshot.send_modify(|snapshot| snapshot.loading = false);
                return LoadOutcome::Superseded;
            }

            return self.apply_fetched(&mut state, seq, fetched, report_errors);
        }
    }

    fn apply_fetched(
        &self,
        state: &mut StoreState,
        seq: u64,
        fetched: PlannerResult<(Vec<ScheduledTask>, Vec<UnscheduledTask>)>,
        report_errors: bool,
    ) -> LoadOutcome {
        match fetched {
            Ok((scheduled, unscheduled)) => {
                info!(
                    "Loaded {} scheduled and {} unscheduled tasks",
                    scheduled.len(),
                    unscheduled.len()
                );

                state.applied_seq = seq;
                self.snapshot.send_modify(|snapshot| {
                    snapshot.scheduled = scheduled.clone();
                    snapshot.unscheduled = unscheduled.clone();
                    snapshot.loading = false;
                    snapshot.error = None;
                });
                state.entry = Some(CacheEntry {
                    scheduled,
                    unscheduled,
                    last_fetched_at: self.clock.now(),
                });

                LoadOutcome::Reloaded
            }
            Err(e) if report_errors => {
                error!("Failed to load tasks: {}", e);
                self.snapshot.send_modify(|snapshot| {
                    snapshot.loading = false;
                    snapshot.error = Some(LOAD_ERROR_MESSAGE.to_string());
                });
                LoadOutcome::Failed
            }
            Err(e) => {
                warn!("Background task refresh failed: {}", e);
                LoadOutcome::Failed
            }
        }
    }

    async fn fetch_all(&self) -> PlannerResult<(Vec<ScheduledTask>, Vec<UnscheduledTask>)> {
        let (scheduled, unscheduled, project) = tokio::try_join!(
            self.backend.scheduled_tasks(),
            self.backend.unscheduled_tasks(),
            self.backend.project_tasks(),
        )?;

        let scheduled = scheduled.into_iter().map(ensure_task_color).collect();
        let unscheduled = unscheduled
            .into_iter()
            .chain(project)
            .map(ensure_task_color)
            .collect();

        Ok((scheduled, unscheduled))
    }

    /// Optimistically rewrite both collections in one step
    pub async fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut Vec<ScheduledTask>, &mut Vec<UnscheduledTask>),
    {
        let mut state = self.state.lock().await;
        state.applied_seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let mut next = self.snapshot();
        f(&mut next.scheduled, &mut next.unscheduled);

        if let Some(entry) = state.entry.as_mut() {
            entry.scheduled = next.scheduled.clone();
            entry.unscheduled = next.unscheduled.clone();
            entry.last_fetched_at = self.clock.now();
        }

        self.snapshot.send_modify(|snapshot| {
            snapshot.scheduled = next.scheduled;
            snapshot.unscheduled = next.unscheduled;
        });
    }

    pub async fn update_scheduled(&self, tasks: Vec<ScheduledTask>) {
        self.modify(|scheduled, _| *scheduled = tasks).await;
    }

    pub async fn update_unscheduled(&self, tasks: Vec<UnscheduledTask>) {
        self.modify(|_, unscheduled| *unscheduled = tasks).await;
    }

    /// Initial load for a newly mounted consumer
    ///
    /// When nothing was cached yet, a silent preload is also scheduled
    /// shortly afterwards.
    pub async fn mount(self: &Arc<Self>) -> LoadOutcome {
        let had_entry = self.state.lock().await.entry.is_some();

        if !had_entry {
            let store = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(PRELOAD_DELAY).await;
                store.background_refresh().await;
            });
        }

        self.load(false).await
    }

    /// Reload on task and project events, refresh quietly on visibility and focus
    pub fn listen(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut events = bus.subscribe();
        let store = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.invalidates_tasks() => {
                        debug!("{} received, refreshing tasks", event.name());
                        store.refresh().await;
                    }
                    Ok(AppEvent::VisibilityChanged { visible: true }) | Ok(AppEvent::WindowFocused) => {
                        store.background_refresh().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Task store missed {} events, refreshing", skipped);
                        store.refresh().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
