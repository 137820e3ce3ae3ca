use tracing::instrument;

use crate::counter::ViewCounter;
use crate::gate::DedupGate;
use crate::model::{VideoId, ViewerId};
use crate::store::CounterStore;
use crate::Located as _;

/// What happened to a single playback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Buffered and will reach the durable count on a following sweep.
    Counted,
    /// Already counted for this viewer within the dedupe window.
    Duplicate,
    /// The counter store could not be reached; the view is lost.
    Unrecorded,
}

/// Entry point for request handlers: gate the view, then buffer it.
///
/// Store failures never reach the caller. A gate failure lets the view through, so an outage
/// can only over-count, and the playback response never waits on the outcome when
/// [ViewRecorder::spawn_record] is used.
#[derive(Debug, Clone)]
pub struct ViewRecorder<S> {
    gate: DedupGate<S>,
    counter: ViewCounter<S>,
}

impl<S: CounterStore> ViewRecorder<S> {
    pub fn new(store: S, window: std::time::Duration) -> Self {
        Self {
            gate: DedupGate::new(store.clone(), window),
            counter: ViewCounter::new(store),
        }
    }

    #[instrument(skip(self))]
    pub async fn record(&self, video: &VideoId, viewer: &ViewerId) -> View {
        let accepted = match self.gate.register_view(video, viewer).await {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!(%error, location = %error.location(), "dedupe check failed, counting the view anyway");
                true
            }
        };

        if !accepted {
            return View::Duplicate;
        }

        match self.counter.increment(video).await {
            Ok(_) => View::Counted,
            Err(error) => {
                tracing::warn!(%error, location = %error.location(), "could not buffer view");
                View::Unrecorded
            }
        }
    }

    /// Records the view on a background task.
    pub fn spawn_record(&self, video: VideoId, viewer: ViewerId) -> tokio::task::JoinHandle<View> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.record(&video, &viewer).await })
    }
}
