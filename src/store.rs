use std::future::Future;
use std::time::Duration;

use snafu::{Location, Snafu};

use crate::model::{ParseVideoId, VideoId, ViewerId};
use crate::Located;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

mod memory;
mod redis;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("redis `{command}` failed at {location}: {source}"))]
    Command {
        command: &'static str,
        source: ::redis::RedisError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("could not open a redis connection at {location}: {source}"))]
    Connection {
        source: ::redis::RedisError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("`{key}` holds a malformed video id at {location}: {source}"))]
    MalformedMember {
        key: String,
        source: ParseVideoId,
        #[snafu(implicit)]
        location: Location,
    },
}

impl Located for StoreError {
    fn location(&self) -> Location {
        match self {
            StoreError::Command { location, .. }
            | StoreError::Connection { location, .. }
            | StoreError::MalformedMember { location, .. } => *location,
        }
    }
}

/// The low-latency shared store behind the dedupe gate and the view counters.
///
/// Every method is a single atomic operation on the backing store. Implementations must never
/// emulate one with a read followed by a separate write, since callers run concurrently across
/// processes.
pub trait CounterStore: Clone + Send + Sync + 'static {
    /// Sets the `(video, viewer)` marker with a time-to-live of `window` unless it already exists.
    ///
    /// Returns `true` if this call created the marker. An existing marker keeps its original
    /// expiry.
    fn mark_viewed(
        &self, video: &VideoId, viewer: &ViewerId, window: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Adds one to the counter of `video` and marks it dirty, returning the new buffered count.
    fn increment(&self, video: &VideoId) -> impl Future<Output = Result<u64>> + Send;

    /// Videos marked dirty since their last drain.
    fn dirty_videos(&self) -> impl Future<Output = Result<Vec<VideoId>>> + Send;

    /// Videos that have a counter key at all, dirty or not.
    fn scan_counters(&self) -> impl Future<Output = Result<Vec<VideoId>>> + Send;

    /// Reads the counter of `video`, resets it to zero and clears its dirty mark, all at once.
    fn drain(&self, video: &VideoId) -> impl Future<Output = Result<u64>> + Send;

    /// Adds a previously drained `delta` back to the counter of `video` and marks it dirty.
    fn restore(&self, video: &VideoId, delta: u64) -> impl Future<Output = Result<()>> + Send;
}
