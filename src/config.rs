use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::ResultExt as _;
use url::Url;

use crate::database::DatabaseConfig;
use crate::error::{ApplicationError, ConfigLoadSnafu};
use crate::gate::DEFAULT_DEDUPE_WINDOW;
use crate::sweeper::Enumeration;

/// Settings of the sweep worker, read from the environment (and `.env`).
///
/// | variable            | default       |
/// |---------------------|---------------|
/// | `REDIS_URL`         | required      |
/// | `SURREAL_URL`       | required      |
/// | `SURREAL_NS`        | `view_tally`  |
/// | `SURREAL_DB`        | `view_tally`  |
/// | `SURREAL_USER`      | none          |
/// | `SURREAL_PASS`      | none          |
/// | `DEDUPE_WINDOW`     | `24h`         |
/// | `SWEEP_INTERVAL`    | `1m`          |
/// | `SWEEP_CONCURRENCY` | `16`          |
/// | `SWEEP_ENUMERATION` | `dirty`       |
/// | `LOG_DIR`           | `logs`        |
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub redis_url: Url,
    #[serde(flatten)]
    pub database: DatabaseConfig,
    #[serde(default = "default_dedupe_window", deserialize_with = "human_duration")]
    pub dedupe_window: Duration,
    #[serde(default = "default_sweep_interval", deserialize_with = "human_duration")]
    pub sweep_interval: Duration,
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
    #[serde(default)]
    pub sweep_enumeration: Enumeration,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

pub fn load() -> Result<Config, ApplicationError> {
    envy::from_env::<Config>().context(ConfigLoadSnafu)
}

fn default_dedupe_window() -> Duration {
    DEFAULT_DEDUPE_WINDOW
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_sweep_concurrency() -> usize {
    16
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// Parses durations like `90s`, `1m` or `24h`. Zero is rejected.
fn human_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let text = String::deserialize(deserializer)?;
    let duration = humantime::parse_duration(&text).map_err(serde::de::Error::custom)?;

    if duration.is_zero() {
        return Err(serde::de::Error::custom(format!("`{text}` must be longer than zero")));
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::from_iter(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("REDIS_URL", "redis://localhost:6379"),
        ("SURREAL_URL", "ws://localhost:8000"),
    ];

    #[test]
    fn defaults_follow_the_reference_cadence() {
        let config = from_pairs(&REQUIRED).unwrap();

        assert_eq!(config.dedupe_window, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.sweep_concurrency, 16);
        assert_eq!(config.sweep_enumeration, Enumeration::Dirty);
        assert_eq!(config.database.namespace, "view_tally");
        assert!(config.database.credentials.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("DEDUPE_WINDOW", "6h"),
            ("SWEEP_INTERVAL", "30s"),
            ("SWEEP_CONCURRENCY", "4"),
            ("SWEEP_ENUMERATION", "scan"),
            ("SURREAL_USER", "sweeper"),
            ("SURREAL_PASS", "hunter2"),
        ]);

        let config = from_pairs(&pairs).unwrap();

        assert_eq!(config.dedupe_window, Duration::from_secs(6 * 60 * 60));
        assert_eq!(config.sweep_interval, Duration::from_secs(30));
        assert_eq!(config.sweep_concurrency, 4);
        assert_eq!(config.sweep_enumeration, Enumeration::Scan);
        let credentials = config.database.credentials.unwrap();
        assert_eq!(credentials.username, "sweeper");
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SWEEP_INTERVAL", "0s"));

        assert!(from_pairs(&pairs).is_err());
    }

    #[test]
    fn missing_redis_url_is_rejected() {
        assert!(from_pairs(&[("SURREAL_URL", "ws://localhost:8000")]).is_err());
    }
}
