use std::future::Future;

use derive_new::new;
use serde::Deserialize;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{self, Credentials, Jwt, Signin};
use surrealdb::opt::{IntoQuery, QueryResult};
use surrealdb::Surreal;
use tracing::instrument;
use url::Url;

pub use surrealdb::sql::Thing;

use crate::model::{Video, VideoId};
use crate::Located;

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;

const SETUP: &str = include_str!("../schema.surrealql");

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseError {
    #[snafu(display("failed to query the database at {location}: {source}"))]
    DatabaseQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to deserialize the database response at {location}: {source}"))]
    DatabaseDeserialize {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("video `{video}` has no record in the database"))]
    VideoNotFound {
        video: VideoId,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("cannot connect to the database `{url}` at {location}: {source}"))]
    DatabaseConnection {
        url: Url,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl DatabaseError {
    /// Whether the failure means the record is gone, as opposed to the database being unhealthy.
    pub fn is_missing_record(&self) -> bool {
        matches!(self, DatabaseError::VideoNotFound { .. })
    }
}

impl Located for DatabaseError {
    fn location(&self) -> Location {
        match self {
            DatabaseError::DatabaseQuery { location, .. }
            | DatabaseError::DatabaseDeserialize { location, .. }
            | DatabaseError::VideoNotFound { location, .. }
            | DatabaseError::DatabaseConnection { location, .. } => *location,
        }
    }
}

/// Represents an identifier for a database record.
pub trait Id {
    /// Returns the ID of the record.
    fn id(&self) -> &Thing;

    /// Returns the name of the table associated with the record.
    fn table() -> &'static str;
}

/// The authoritative side of view counting.
///
/// Each call must correspond to exactly one drained delta. Calling it twice with the same delta
/// counts those views twice.
pub trait VideoStore: Clone + Send + Sync + 'static {
    /// Atomically adds `delta` to the cumulative view count of `video`.
    fn apply_view_delta(
        &self, video: &VideoId, delta: u64,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(rename = "surreal_url")]
    pub url: Url,
    #[serde(rename = "surreal_ns", default = "default_name")]
    pub namespace: String,
    #[serde(rename = "surreal_db", default = "default_name")]
    pub database: String,
    #[serde(flatten)]
    pub credentials: Option<DatabaseCredentials>,
}

fn default_name() -> String {
    "view_tally".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseCredentials {
    #[serde(rename = "surreal_user")]
    pub username: String,
    #[serde(rename = "surreal_pass")]
    pub password: String,
}

impl DatabaseConfig {
    fn auth<'a>(
        &'a self, credentials: &'a DatabaseCredentials,
    ) -> impl Credentials<Signin, Jwt> + 'a {
        auth::Database {
            namespace: &self.namespace,
            database: &self.database,
            username: &credentials.username,
            password: &credentials.password,
        }
    }
}

/// Represents a database wrapper.
///
/// This struct provides a wrapper around a database, allowing for easier interaction and abstraction.
#[derive(Debug, Clone, new)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    /// Connects, signs in when credentials are configured, selects the namespace and applies the schema.
    #[instrument(skip(config), fields(url = %config.url))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = &config.url;
        let database = surrealdb::engine::any::connect(url.as_str())
            .await
            .context(DatabaseConnectionSnafu { url: url.clone() })?;

        if let Some(credentials) = &config.credentials {
            database
                .signin(config.auth(credentials))
                .await
                .context(DatabaseConnectionSnafu { url: url.clone() })?;
        }

        database
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .context(DatabaseConnectionSnafu { url: url.clone() })?;

        database
            .query(SETUP)
            .await
            .and_then(|response| response.check())
            .context(DatabaseConnectionSnafu { url: url.clone() })?;

        tracing::info!(namespace = %config.namespace, database = %config.database, "connected to the video database");
        Ok(Database::new(database))
    }

    /// Create a builder to execute arbitrary SQL code on the database.
    ///
    /// The `fetch` method can deserialize the result into either a single value (`Option<T>`) or a collection of values (`Vec<T>`).
    pub fn sql(&self, query: impl IntoQuery) -> Query<'_> {
        let query = self.database.query(query);
        Query { query }
    }
}

impl VideoStore for Database {
    #[instrument(skip(self))]
    async fn apply_view_delta(&self, video: &VideoId, delta: u64) -> Result<()> {
        let updated = Video::add_views(Video::record(video), delta, self)
            .await?
            .context(VideoNotFoundSnafu {
                video: video.clone(),
            })?;

        tracing::debug!(%video, delta, views = updated.views, "applied view delta");
        Ok(())
    }
}

#[derive(Debug)]
pub struct Query<'a> {
    query: surrealdb::method::Query<'a, Any>,
}

impl Query<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    pub async fn fetch<T: serde::de::DeserializeOwned>(self) -> Result<T>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.query.await.context(DatabaseQuerySnafu)?;
        let result = statements.take::<T>(0).context(DatabaseDeserializeSnafu)?;
        Ok(result)
    }
}

/// A typed record id for a database record. type `T` must implement [Id] trait so that the table name can be inferred.
pub struct Record<T> {
    inner: Thing,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Id> Record<T> {
    /// Creates a new `Record` from the specified `id` and inferred the table's name from `T`.
    pub fn new(id: impl Into<surrealdb::sql::Id>) -> Self {
        let inner = Thing {
            tb: T::table().to_string(),
            id: id.into(),
        };

        Record {
            inner,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> AsRef<Thing> for Record<T> {
    fn as_ref(&self) -> &Thing {
        &self.inner
    }
}

impl<T> std::fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> std::clone::Clone for Record<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> serde::Serialize for Record<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de, T: Id> serde::Deserialize<'de> for Record<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let thing = Thing::deserialize(deserializer)?;

        let expected = T::table();
        let actual = &thing.tb;

        if expected != actual {
            return Err(serde::de::Error::custom(format!(
                "table name mismatch, expected '{expected}' but got '{actual}'"
            )));
        }

        Ok(Record {
            inner: thing,
            _marker: std::marker::PhantomData,
        })
    }
}

impl<T> std::cmp::PartialEq for Record<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> std::cmp::Eq for Record<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::memory_database as memory;

    fn video(id: &str) -> VideoId {
        id.parse().unwrap()
    }

    #[tokio::test]
    async fn published_video_starts_at_zero() {
        let db = memory().await;
        let published = Video::publish(Video::record(&video("v1")), "Intro".to_string(), &db)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(published.views, 0);
        assert_eq!(published.title, "Intro");
    }

    #[tokio::test]
    async fn view_deltas_accumulate() {
        let db = memory().await;
        Video::publish(Video::record(&video("v1")), "Intro".to_string(), &db)
            .await
            .unwrap();

        db.apply_view_delta(&video("v1"), 3).await.unwrap();
        db.apply_view_delta(&video("v1"), 4).await.unwrap();

        let stored = Video::get(Video::record(&video("v1")), &db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.views, 7);
    }

    #[tokio::test]
    async fn delta_for_unknown_video_is_reported_missing() {
        let db = memory().await;

        let err = db.apply_view_delta(&video("ghost"), 2).await.unwrap_err();
        assert!(err.is_missing_record(), "unexpected error: {err}");

        let stored = Video::get(Video::record(&video("ghost")), &db).await.unwrap();
        assert_eq!(stored, None, "applying a delta must not create the record");
    }

    #[tokio::test]
    async fn deltas_only_touch_their_own_video() {
        let db = memory().await;
        for id in ["v1", "v2"] {
            Video::publish(Video::record(&video(id)), id.to_string(), &db)
                .await
                .unwrap();
        }

        db.apply_view_delta(&video("v2"), 5).await.unwrap();

        let first = Video::get(Video::record(&video("v1")), &db).await.unwrap().unwrap();
        let second = Video::get(Video::record(&video("v2")), &db).await.unwrap().unwrap();
        assert_eq!((first.views, second.views), (0, 5));
    }

    #[tokio::test]
    async fn deleted_video_is_not_recreated() {
        let db = memory().await;
        let id = Video::record(&video("v1"));
        Video::publish(id.clone(), "Intro".to_string(), &db)
            .await
            .unwrap();
        db.sql("DELETE $id").bind(("id", id.clone())).fetch::<Vec<Video>>().await.unwrap();

        let err = db.apply_view_delta(&video("v1"), 3).await.unwrap_err();
        assert!(err.is_missing_record(), "unexpected error: {err}");
        assert_eq!(Video::get(id, &db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delta_keeps_the_rest_of_the_record() {
        let db = memory().await;
        Video::publish(Video::record(&video("v1")), "Intro".to_string(), &db)
            .await
            .unwrap();

        let updated = Video::add_views(Video::record(&video("v1")), 2, &db)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Intro");
        assert_eq!(updated.views, 2);
    }

    #[tokio::test]
    async fn record_from_another_table_is_rejected() {
        let db = memory().await;

        let own: Option<Record<Video>> = db.sql("RETURN videos:v1").fetch().await.unwrap();
        assert_eq!(own, Some(Video::record(&video("v1"))));

        let foreign = db.sql("RETURN clips:v1").fetch::<Option<Record<Video>>>().await;
        assert!(matches!(foreign, Err(DatabaseError::DatabaseDeserialize { .. })));
    }
}
