use std::future::Future;
use std::time::Duration;

use derive_new::new;
use futures::{stream, StreamExt as _};
use serde::Deserialize;
use snafu::{Location, ResultExt as _, Snafu};
use tracing::instrument;

use crate::database::VideoStore;
use crate::model::VideoId;
use crate::store::{CounterStore, StoreError};
use crate::{time, Located as _};

/// How a sweep finds the videos that may hold unflushed views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enumeration {
    /// Read the dirty index maintained by every increment. Proportional to recent activity.
    #[default]
    Dirty,
    /// Walk every counter key with a cursor. Proportional to every video ever viewed, only for
    /// recovering counters that were never marked dirty.
    Scan,
}

#[derive(Debug, Snafu)]
pub enum SweepError {
    /// Could not list the videos to reconcile
    Enumerate {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// What a single sweep did, summed over every visited video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Videos returned by the enumeration.
    pub visited: usize,
    /// Videos whose delta reached the durable store.
    pub applied: usize,
    /// Views added to durable counts.
    pub views: u64,
    /// Deltas put back into their counter after a failed durable write.
    pub restored: usize,
    /// Deltas dropped because their video no longer exists.
    pub discarded: usize,
    /// Videos whose counter could not be drained; they stay buffered.
    pub failed: usize,
    /// Views drained but neither applied nor restored.
    pub lost: u64,
}

/// Outcome of reconciling one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconciled {
    Idle,
    Applied(u64),
    Restored,
    Discarded,
    DrainFailed,
    Lost(u64),
}

impl SweepReport {
    fn add(mut self, outcome: Reconciled) -> Self {
        self.visited += 1;
        match outcome {
            Reconciled::Idle => {}
            Reconciled::Applied(delta) => {
                self.applied += 1;
                self.views += delta;
            }
            Reconciled::Restored => self.restored += 1,
            Reconciled::Discarded => self.discarded += 1,
            Reconciled::DrainFailed => self.failed += 1,
            Reconciled::Lost(delta) => self.lost += delta,
        }
        self
    }
}

/// Flushes buffered view counts into the durable store.
///
/// Each video is drained with one atomic read-and-reset, so views arriving mid-sweep land in the
/// next sweep. Running several sweepers at once is safe but wasteful.
#[derive(Debug, Clone, new)]
pub struct Sweeper<S, V> {
    store: S,
    videos: V,
    #[new(value = "Enumeration::Dirty")]
    enumeration: Enumeration,
    #[new(value = "16")]
    concurrency: usize,
}

impl<S: CounterStore, V: VideoStore> Sweeper<S, V> {
    pub fn with_enumeration(mut self, enumeration: Enumeration) -> Self {
        self.enumeration = enumeration;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs one reconciliation cycle over the videos enumerated at its start.
    ///
    /// Failures on one video never stop the others.
    #[instrument(skip(self), fields(enumeration = ?self.enumeration))]
    pub async fn sweep(&self) -> Result<SweepReport, SweepError> {
        let videos = match self.enumeration {
            Enumeration::Dirty => self.store.dirty_videos().await,
            Enumeration::Scan => self.store.scan_counters().await,
        }
        .context(EnumerateSnafu)?;

        let report = stream::iter(videos)
            .map(|video| self.reconcile(video))
            .buffer_unordered(self.concurrency)
            .fold(SweepReport::default(), |report, outcome| async move { report.add(outcome) })
            .await;

        if report.views > 0 || report.failed > 0 || report.lost > 0 {
            tracing::info!(?report, "view sweep completed");
        } else {
            tracing::debug!(?report, "view sweep completed");
        }

        Ok(report)
    }

    #[instrument(skip(self))]
    async fn reconcile(&self, video: VideoId) -> Reconciled {
        let delta = match self.store.drain(&video).await {
            Ok(delta) => delta,
            Err(error) => {
                tracing::error!(%error, location = %error.location(), "could not drain view counter");
                return Reconciled::DrainFailed;
            }
        };

        if delta == 0 {
            return Reconciled::Idle;
        }

        let error = match self.videos.apply_view_delta(&video, delta).await {
            Ok(()) => return Reconciled::Applied(delta),
            Err(error) => error,
        };

        if error.is_missing_record() {
            tracing::warn!(delta, %error, "discarding views of a video without a record");
            return Reconciled::Discarded;
        }

        tracing::warn!(delta, %error, location = %error.location(), "could not apply views, putting them back");

        match self.store.restore(&video, delta).await {
            Ok(()) => Reconciled::Restored,
            Err(error) => {
                tracing::error!(delta, %error, location = %error.location(), "could not restore drained views, they are lost");
                Reconciled::Lost(delta)
            }
        }
    }

    /// Runs a sweep on every tick of an aligned timer until [SweeperTask::shutdown] is called.
    pub fn spawn(self, period: Duration) -> SweeperTask {
        SweeperTask::spawn(|mut quit| async move {
            let mut timer = time::aligned_timer(period);
            tracing::info!(?period, enumeration = ?self.enumeration, "started view sweeper");

            loop {
                tokio::select! {
                    _ = &mut quit => break,
                    _ = timer.tick() => self.sweep_logged().await,
                }
            }

            tracing::info!("flushing buffered views before stopping");
            self.sweep_logged().await;
        })
    }

    async fn sweep_logged(&self) {
        if let Err(error) = self.sweep().await {
            tracing::error!(%error, location = %error.location(), "view sweep skipped");
        }
    }
}

impl crate::Located for SweepError {
    fn location(&self) -> Location {
        match self {
            SweepError::Enumerate { location, .. } => *location,
        }
    }
}

type QuitSignal = tokio::sync::oneshot::Receiver<Quit>;

#[derive(Debug, Clone, Copy)]
struct Quit;

/// Handle of a spawned [Sweeper].
#[derive(Debug)]
pub struct SweeperTask {
    tx: tokio::sync::oneshot::Sender<Quit>,
    handle: tokio::task::JoinHandle<()>,
}

impl SweeperTask {
    fn spawn<F>(f: impl FnOnce(QuitSignal) -> F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = tokio::task::spawn(f(rx));
        Self { tx, handle }
    }

    /// Stops the sweeper after its current sweep and waits for the final flush.
    pub async fn shutdown(self) {
        let _ = self.tx.send(Quit);
        if let Err(error) = self.handle.await {
            tracing::error!(%error, "view sweeper task failed");
        }
    }
}
