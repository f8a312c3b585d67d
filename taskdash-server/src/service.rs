//! Task service: owns the cached task list and keeps it fresh.
//!
//! Readers take the shared lock just long enough to clone an `Arc` to the
//! current list. A refresh performs the network fetch with no lock held and
//! then swaps list and timestamps together under the write lock, so readers
//! never see a list paired with the wrong timestamp.
//!
//! The freshness check in [`TaskService::get_tasks`] is not atomic with the
//! refresh it may trigger. Two callers can both see a stale cache and both
//! fetch; the last one to finish wins, which is harmless.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use taskdash_core::{DashboardData, Task, resolve};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DashboardError, Result};
use crate::motion::TaskSource;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct CacheState {
    tasks: Arc<Vec<Task>>,
    /// Monotonic refresh time used for TTL checks.
    refreshed_at: Option<Instant>,
    /// Wall-clock refresh time, for display.
    last_update: Option<DateTime<Utc>>,
}

/// Snapshot of cache health for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub last_update: Option<DateTime<Utc>>,
    pub task_count: usize,
}

pub struct TaskService {
    source: Arc<dyn TaskSource>,
    cache: RwLock<CacheState>,
    ttl: Duration,
}

impl TaskService {
    pub fn new(source: Arc<dyn TaskSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(CacheState::default()),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cached tasks when fresh and non-empty, otherwise a refresh.
    ///
    /// If the refresh fails but an earlier one succeeded, the stale list is
    /// served. If nothing was ever fetched the caller gets
    /// [`DashboardError::NoDataAvailable`].
    pub async fn get_tasks(&self) -> Result<Arc<Vec<Task>>> {
        {
            let cache = self.cache.read().await;
            let fresh = cache
                .refreshed_at
                .is_some_and(|at| at.elapsed() < self.ttl);
            if fresh && !cache.tasks.is_empty() {
                return Ok(Arc::clone(&cache.tasks));
            }
        }

        match self.refresh().await {
            Ok(tasks) => Ok(tasks),
            Err(err) => {
                let cache = self.cache.read().await;
                if cache.refreshed_at.is_some() {
                    warn!(error = %err, "task refresh failed, serving stale cache");
                    Ok(Arc::clone(&cache.tasks))
                } else {
                    Err(DashboardError::NoDataAvailable(Box::new(err)))
                }
            }
        }
    }

    /// Fetch the full task list and replace the cache with it.
    ///
    /// On failure the cache is untouched.
    pub async fn refresh(&self) -> Result<Arc<Vec<Task>>> {
        let tasks = Arc::new(self.source.fetch_tasks().await?);

        *self.cache.write().await = CacheState {
            tasks: Arc::clone(&tasks),
            refreshed_at: Some(Instant::now()),
            last_update: Some(Utc::now()),
        };

        info!(count = tasks.len(), "tasks refreshed");
        Ok(tasks)
    }

    pub async fn dashboard_data(&self) -> Result<DashboardData> {
        self.dashboard_data_at(Utc::now()).await
    }

    pub async fn dashboard_data_at(&self, now: DateTime<Utc>) -> Result<DashboardData> {
        let tasks = self.get_tasks().await?;
        Ok(resolve(&tasks, now))
    }

    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.cache.read().await.last_update
    }

    pub async fn status(&self) -> CacheStatus {
        let cache = self.cache.read().await;
        CacheStatus {
            last_update: cache.last_update,
            task_count: cache.tasks.len(),
        }
    }

    /// Refresh every `every` until `cancel` fires. The first refresh happens
    /// one full interval after the call. Failures are logged, never returned.
    ///
    /// A refresh already in flight when `cancel` fires runs to completion (or
    /// to the client timeout) before the loop exits.
    pub async fn run_periodic_refresh(&self, cancel: CancellationToken, every: Duration) {
        let every = every.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?every, "periodic refresh started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("stopping periodic refresh");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "periodic task refresh failed");
                    }
                }
            }
        }
    }

    pub fn spawn_periodic_refresh(
        self: &Arc<Self>,
        cancel: CancellationToken,
        every: Duration,
    ) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move { service.run_periodic_refresh(cancel, every).await })
    }
}
