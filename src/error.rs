use snafu::{Location, Snafu};

use crate::database::DatabaseError;
use crate::store::StoreError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApplicationError {
    /// could not parse the configuration from the environment
    ConfigLoad {
        source: envy::Error,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not reach the durable video database
    ConnectDatabase {
        source: DatabaseError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not reach the counter store
    ConnectStore {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not listen for the shutdown signal
    ShutdownSignal {
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}
