//! Redis backed [CounterStore].
//!
//! Each operation is one command, or one `MULTI`/`EXEC` block when the counter and the dirty index
//! change together, so no other client can observe the two halves apart.

use std::collections::HashSet;
use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::Client;
use snafu::ResultExt as _;
use tracing::instrument;
use url::Url;

use super::{CommandSnafu, ConnectionSnafu, CounterStore, MalformedMemberSnafu, Result};
use crate::keys;
use crate::model::{VideoId, ViewerId};

const SCAN_BATCH: usize = 1000;

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    #[instrument(skip_all, fields(host = ?url.host_str()))]
    pub async fn connect(url: &Url) -> Result<Self> {
        let client = Client::open(url.as_str()).context(ConnectionSnafu)?;
        let connection = client
            .get_connection_manager()
            .await
            .context(ConnectionSnafu)?;

        tracing::info!("connected to the counter store");
        Ok(Self { connection })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

impl CounterStore for RedisStore {
    async fn mark_viewed(&self, video: &VideoId, viewer: &ViewerId, window: Duration) -> Result<bool> {
        let ttl = u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1);

        let created: Option<String> = ::redis::cmd("SET")
            .arg(keys::viewed(video, viewer))
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl)
            .query_async(&mut self.connection())
            .await
            .context(CommandSnafu { command: "SET NX PX" })?;

        Ok(created.is_some())
    }

    async fn increment(&self, video: &VideoId) -> Result<u64> {
        let (count,): (u64,) = ::redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(keys::views(video))
            .cmd("SADD")
            .arg(keys::DIRTY_VIDEOS)
            .arg(video.as_str())
            .ignore()
            .query_async(&mut self.connection())
            .await
            .context(CommandSnafu { command: "INCR" })?;

        Ok(count)
    }

    async fn dirty_videos(&self) -> Result<Vec<VideoId>> {
        let members: Vec<String> = ::redis::cmd("SMEMBERS")
            .arg(keys::DIRTY_VIDEOS)
            .query_async(&mut self.connection())
            .await
            .context(CommandSnafu { command: "SMEMBERS" })?;

        let videos = members
            .into_iter()
            .filter_map(|member| {
                member
                    .parse::<VideoId>()
                    .context(MalformedMemberSnafu { key: keys::DIRTY_VIDEOS })
                    .inspect_err(|error| tracing::warn!(%error, "skipping dirty index member"))
                    .ok()
            })
            .collect();

        Ok(videos)
    }

    async fn scan_counters(&self) -> Result<Vec<VideoId>> {
        let mut connection = self.connection();
        let mut videos = HashSet::new();
        let mut cursor = 0u64;

        loop {
            let (next, batch): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(keys::VIEWS_PATTERN)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut connection)
                .await
                .context(CommandSnafu { command: "SCAN" })?;

            videos.extend(batch.iter().filter_map(|key| keys::parse_views(key)));

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(videos.into_iter().collect())
    }

    async fn drain(&self, video: &VideoId) -> Result<u64> {
        let (delta,): (Option<u64>,) = ::redis::pipe()
            .atomic()
            .cmd("GETSET")
            .arg(keys::views(video))
            .arg(0)
            .cmd("SREM")
            .arg(keys::DIRTY_VIDEOS)
            .arg(video.as_str())
            .ignore()
            .query_async(&mut self.connection())
            .await
            .context(CommandSnafu { command: "GETSET" })?;

        Ok(delta.unwrap_or(0))
    }

    async fn restore(&self, video: &VideoId, delta: u64) -> Result<()> {
        ::redis::pipe()
            .atomic()
            .cmd("INCRBY")
            .arg(keys::views(video))
            .arg(delta)
            .ignore()
            .cmd("SADD")
            .arg(keys::DIRTY_VIDEOS)
            .arg(video.as_str())
            .ignore()
            .query_async::<()>(&mut self.connection())
            .await
            .context(CommandSnafu { command: "INCRBY" })?;

        Ok(())
    }
}
