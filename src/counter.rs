use derive_new::new;
use tracing::instrument;

use crate::model::VideoId;
use crate::store::{CounterStore, Result};

/// Buffers accepted views until the sweeper flushes them.
#[derive(Debug, Clone, new)]
pub struct ViewCounter<S> {
    store: S,
}

impl<S: CounterStore> ViewCounter<S> {
    /// Adds one accepted view to the buffer of `video`. Only call this after the gate accepted.
    #[instrument(skip(self))]
    pub async fn increment(&self, video: &VideoId) -> Result<u64> {
        let buffered = self.store.increment(video).await?;
        tracing::trace!(buffered, "buffered view");
        Ok(buffered)
    }
}
