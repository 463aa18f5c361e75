//! # Background Refresh
//!
//! Four independent loops keep the cache current:
//!
//! | Task         | Default period | First run         |
//! |--------------|----------------|-------------------|
//! | full         | 1h             | immediately       |
//! | incremental  | 1m             | after one period  |
//! | promoted     | 1m             | immediately       |
//! | string-index | 30m            | immediately       |
//!
//! A failing cycle is logged and the loop waits for its next tick. Full and
//! incremental cycles share the cache's refresh lock and never overlap.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::cache::PathTypeCache;
use crate::config::RefreshConfig;
use crate::error::CatalogError;

/// Handles of the running refresh loops.
pub struct RefreshTasks {
    handles: Vec<JoinHandle<()>>,
}

impl RefreshTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every loop. An in-flight cycle is dropped mid-way; the cache
    /// keeps whatever it last committed.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

pub fn spawn_refresh_tasks(cache: Arc<PathTypeCache>, config: &RefreshConfig) -> RefreshTasks {
    let full = {
        let cache = cache.clone();
        spawn_every("full", Duration::ZERO, config.full_interval(), move || {
            let cache = cache.clone();
            async move { cache.refresh(true).await.map(|_| ()) }
        })
    };

    let incremental = {
        let cache = cache.clone();
        let period = config.incremental_interval();
        spawn_every("incremental", period, period, move || {
            let cache = cache.clone();
            async move { cache.refresh(false).await.map(|_| ()) }
        })
    };

    let promoted = {
        let cache = cache.clone();
        spawn_every("promoted", Duration::ZERO, config.promoted_interval(), move || {
            let cache = cache.clone();
            async move { cache.sync_promoted().await.map(|_| ()) }
        })
    };

    let string_index = spawn_every("string-index", Duration::ZERO, config.string_index_interval(), move || {
        let cache = cache.clone();
        async move { cache.sync_string_indexes().await.map(|_| ()) }
    });

    tracing::info!(
        "refresh tasks started: full every {:?}, incremental every {:?}, promoted every {:?}, string indexes every {:?}",
        config.full_interval(),
        config.incremental_interval(),
        config.promoted_interval(),
        config.string_index_interval()
    );

    RefreshTasks {
        handles: vec![full, incremental, promoted, string_index],
    }
}

fn spawn_every<F, Fut>(name: &'static str, delay: Duration, period: Duration, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), CatalogError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = job().await {
                tracing::error!("{} refresh failed: {}", name, e);
            }
        }
    })
}
