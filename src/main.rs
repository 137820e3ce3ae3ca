use std::time::Duration;

use dotenvy::dotenv;
use snafu::ResultExt;
use tokio::signal::ctrl_c;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{info, warn};

use view_tally::database::Database;
use view_tally::error::{
    ApplicationError, ConnectDatabaseSnafu, ConnectStoreSnafu, ShutdownSignalSnafu,
};
use view_tally::store::RedisStore;
use view_tally::sweeper::Sweeper;
use view_tally::{config, logger};

fn backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(5)
}

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = config::load()?;

    let _guard = logger::init(&config)?;

    let store = Retry::start(backoff(), || async {
        RedisStore::connect(&config.redis_url)
            .await
            .inspect_err(|error| warn!(%error, "counter store is not reachable yet"))
    })
    .await
    .context(ConnectStoreSnafu)?;

    let database = Retry::start(backoff(), || async {
        Database::connect(&config.database)
            .await
            .inspect_err(|error| warn!(%error, "video database is not reachable yet"))
    })
    .await
    .context(ConnectDatabaseSnafu)?;

    let task = Sweeper::new(store, database)
        .with_enumeration(config.sweep_enumeration)
        .with_concurrency(config.sweep_concurrency)
        .spawn(config.sweep_interval);

    let signal = shutdown_signal().await;

    task.shutdown().await;
    info!("sweeper stopped");

    signal
}

async fn shutdown_signal() -> Result<(), ApplicationError> {
    let ctrl_c = async {
        ctrl_c().await.context(ShutdownSignalSnafu)?;
        info!("received Ctrl+C, shutting down");
        Ok(())
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        signal(SignalKind::terminate())
            .context(ShutdownSignalSnafu)?
            .recv()
            .await;
        info!("received terminate signal, shutting down");
        Ok(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<(), ApplicationError>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
