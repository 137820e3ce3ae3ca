use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tokio::time::Instant;

use super::{CounterStore, Result};
use crate::keys;
use crate::model::{VideoId, ViewerId};

/// Expired markers are purged after this many new ones.
const PURGE_EVERY: usize = 1024;

/// A [CounterStore] living in the memory of a single process.
///
/// Useful for tests and for embedding in a single-node deployment. Atomicity comes from holding
/// the dashmap entry lock of the counter while the dirty set is updated; drains take the locks in
/// the same order. Expired markers are reclaimed every [PURGE_EVERY] created markers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    markers: Arc<DashMap<String, Instant>>,
    created: Arc<AtomicUsize>,
    counters: Arc<DashMap<String, u64>>,
    dirty: Arc<DashSet<VideoId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops markers whose window has elapsed, returning how many were removed.
    ///
    /// Expired markers are already treated as absent, this only reclaims their memory. It also
    /// runs on its own as markers are created.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.markers.len();
        self.markers.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.markers.len())
    }

    /// Current buffered count of `video`, without draining it.
    pub fn buffered(&self, video: &VideoId) -> u64 {
        self.counters
            .get(&keys::views(video))
            .map_or(0, |count| *count)
    }

    pub fn is_dirty(&self, video: &VideoId) -> bool {
        self.dirty.contains(video)
    }

    /// Writes a counter without touching the dirty index, as a store populated by an older
    /// writer would look.
    #[cfg(test)]
    pub(crate) fn insert_unmarked(&self, video: &VideoId, count: u64) {
        self.counters.insert(keys::views(video), count);
    }

    fn add(&self, video: &VideoId, delta: u64) -> u64 {
        let mut count = self.counters.entry(keys::views(video)).or_insert(0);
        *count += delta;
        self.dirty.insert(video.clone());
        *count
    }
}

impl CounterStore for MemoryStore {
    async fn mark_viewed(&self, video: &VideoId, viewer: &ViewerId, window: Duration) -> Result<bool> {
        let now = Instant::now();

        let created = match self.markers.entry(keys::viewed(video, viewer)) {
            Entry::Occupied(mut marker) if *marker.get() <= now => {
                marker.insert(now + window);
                true
            }
            Entry::Occupied(_) => false,
            Entry::Vacant(marker) => {
                marker.insert(now + window);
                true
            }
        };

        if created && (self.created.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            let purged = self.purge_expired();
            tracing::trace!(purged, "purged expired dedupe markers");
        }

        Ok(created)
    }

    async fn increment(&self, video: &VideoId) -> Result<u64> {
        Ok(self.add(video, 1))
    }

    async fn dirty_videos(&self) -> Result<Vec<VideoId>> {
        Ok(self.dirty.iter().map(|video| video.key().clone()).collect())
    }

    async fn scan_counters(&self) -> Result<Vec<VideoId>> {
        let videos = self
            .counters
            .iter()
            .filter_map(|counter| keys::parse_views(counter.key()))
            .collect();

        Ok(videos)
    }

    async fn drain(&self, video: &VideoId) -> Result<u64> {
        let mut count = self.counters.entry(keys::views(video)).or_insert(0);
        let delta = std::mem::take(&mut *count);
        self.dirty.remove(video);
        Ok(delta)
    }

    async fn restore(&self, video: &VideoId, delta: u64) -> Result<()> {
        self.add(video, delta);
        Ok(())
    }
}
