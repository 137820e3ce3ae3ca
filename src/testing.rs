//! Fakes with failure injection, shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use snafu::IntoError as _;
use url::Url;

use crate::database::{Database, DatabaseConfig, DatabaseError, Result as DatabaseResult, VideoStore};
use crate::database::{DatabaseQuerySnafu, VideoNotFoundSnafu};
use crate::model::{VideoId, ViewerId};
use crate::store::{CommandSnafu, CounterStore, Result};

pub async fn memory_database() -> Database {
    let config = DatabaseConfig {
        url: Url::parse("mem://").unwrap(),
        namespace: "test".to_string(),
        database: "test".to_string(),
        credentials: None,
    };

    Database::connect(&config).await.unwrap()
}

fn thrown(message: &str) -> DatabaseError {
    let source: surrealdb::Error = surrealdb::error::Db::Thrown(message.to_string()).into();
    DatabaseQuerySnafu.into_error(source)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outage {
    None,
    Gate,
    Restore,
    Everything,
}

/// Wraps a [CounterStore] and fails the operations selected by the current [Outage].
#[derive(Debug, Clone)]
pub struct FlakyStore<S> {
    inner: S,
    outage: Arc<Mutex<Outage>>,
}

impl<S: CounterStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            outage: Arc::new(Mutex::new(Outage::None)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn fail(&self, outage: Outage) {
        *self.outage.lock().unwrap() = outage;
    }

    /// Fails when everything is down, or when `affected` is the current outage.
    fn check(&self, affected: Outage) -> Result<()> {
        let current = *self.outage.lock().unwrap();
        if current == Outage::Everything || (current != Outage::None && current == affected) {
            let source = redis::RedisError::from((redis::ErrorKind::IoError, "connection refused"));
            return Err(CommandSnafu { command: "PING" }.into_error(source));
        }
        Ok(())
    }
}

impl<S: CounterStore> CounterStore for FlakyStore<S> {
    async fn mark_viewed(&self, video: &VideoId, viewer: &ViewerId, window: Duration) -> Result<bool> {
        self.check(Outage::Gate)?;
        self.inner.mark_viewed(video, viewer, window).await
    }

    async fn increment(&self, video: &VideoId) -> Result<u64> {
        self.check(Outage::Everything)?;
        self.inner.increment(video).await
    }

    async fn dirty_videos(&self) -> Result<Vec<VideoId>> {
        self.check(Outage::Everything)?;
        self.inner.dirty_videos().await
    }

    async fn scan_counters(&self) -> Result<Vec<VideoId>> {
        self.check(Outage::Everything)?;
        self.inner.scan_counters().await
    }

    async fn drain(&self, video: &VideoId) -> Result<u64> {
        self.check(Outage::Everything)?;
        self.inner.drain(video).await
    }

    async fn restore(&self, video: &VideoId, delta: u64) -> Result<()> {
        self.check(Outage::Restore)?;
        self.inner.restore(video, delta).await
    }
}

/// An in-memory [VideoStore] that counts calls and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryVideos {
    views: Arc<DashMap<VideoId, u64>>,
    failing: Arc<DashSet<VideoId>>,
    down: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MemoryVideos {
    pub fn with_videos<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let videos = Self::default();
        for id in ids {
            videos.views.insert(id.parse().unwrap(), 0);
        }
        videos
    }

    pub fn views(&self, id: &str) -> u64 {
        let video: VideoId = id.parse().unwrap();
        self.views.get(&video).map_or(0, |views| *views)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, id: &str) {
        self.failing.insert(id.parse().unwrap());
    }

    pub fn heal(&self, id: &str) {
        let video: VideoId = id.parse().unwrap();
        self.failing.remove(&video);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

impl VideoStore for MemoryVideos {
    async fn apply_view_delta(&self, video: &VideoId, delta: u64) -> DatabaseResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.down.load(Ordering::SeqCst) || self.failing.contains(video) {
            return Err(thrown("database unavailable"));
        }

        match self.views.get_mut(video) {
            Some(mut views) => {
                *views += delta;
                Ok(())
            }
            None => VideoNotFoundSnafu {
                video: video.clone(),
            }
            .fail(),
        }
    }
}
