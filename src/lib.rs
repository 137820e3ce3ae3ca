pub mod config;
pub mod counter;
pub mod database;
pub mod error;
pub mod gate;
pub mod keys;
pub mod logger;
pub mod model;
pub mod recorder;
pub mod store;
pub mod sweeper;
pub mod time;

mod macros;

#[cfg(test)]
mod testing;

pub mod prelude {
    pub use derive_new::new;
    pub use serde::{Deserialize, Serialize};
    pub use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};

    pub use crate::database::{Database, DatabaseError, Record, VideoStore};
    pub use crate::model::{Video, VideoId, ViewerId};
    pub use crate::store::{CounterStore, StoreError};
    pub use crate::Located;
}

/// Errors that remember where they were raised.
pub trait Located {
    fn location(&self) -> snafu::Location;
}
