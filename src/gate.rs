use std::time::Duration;

use derive_new::new;
use tracing::instrument;

use crate::model::{VideoId, ViewerId};
use crate::store::{CounterStore, Result};

/// 24 hours, anchored to the first counted view.
pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Decides whether a view is countable: a viewer counts at most once per video per window.
#[derive(Debug, Clone, new)]
pub struct DedupGate<S> {
    store: S,
    window: Duration,
}

impl<S: CounterStore> DedupGate<S> {
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` when this view should be counted.
    ///
    /// The window starts with the first accepted view; duplicates inside it are rejected without
    /// extending it.
    #[instrument(skip(self))]
    pub async fn register_view(&self, video: &VideoId, viewer: &ViewerId) -> Result<bool> {
        let accepted = self.store.mark_viewed(video, viewer, self.window).await?;
        tracing::trace!(accepted, "checked dedupe marker");
        Ok(accepted)
    }
}
