//! Configuration management
//!
//! Settings come from the process environment, optionally seeded from a
//! `.env` file in the working directory.

use crate::error::{Result, SyncError};
use crate::retry::{RetryPolicy, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database name.
pub const DEFAULT_DB_NAME: &str = "ransomware";

/// Default database user.
pub const DEFAULT_DB_USER: &str = "postgres";

/// Default database host.
pub const DEFAULT_DB_HOST: &str = "localhost";

/// Default database port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default pool size. Runs are sequential, so two connections are plenty.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 2;

/// Default feed base URL.
pub const DEFAULT_FEED_BASE_URL: &str = "https://api.ransomware.live/v1";

/// Default feed request timeout in seconds.
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

/// Default root directory for snapshots and logs.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default number of snapshot files kept per kind.
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 5;

/// Sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub snapshots: SnapshotConfig,
}

/// Database connection settings
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string; takes precedence over the individual parts
    pub url: Option<String>,
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
}

/// Remote feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

/// Snapshot export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub data_dir: PathBuf,
    pub retention: usize,
}

impl SyncConfig {
    /// Load configuration from `.env` and the environment
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = SyncConfig {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
                name: lookup("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
                user: lookup("DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                host: lookup("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
                port: parse_var(&lookup, "DB_PORT", DEFAULT_DB_PORT)?,
                max_connections: parse_var(
                    &lookup,
                    "DB_MAX_CONNECTIONS",
                    DEFAULT_DB_MAX_CONNECTIONS,
                )?,
            },
            feed: FeedConfig {
                base_url: lookup("FEED_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_FEED_BASE_URL.to_string()),
                timeout_secs: parse_var(&lookup, "FEED_TIMEOUT_SECS", DEFAULT_FEED_TIMEOUT_SECS)?,
                retry: RetryPolicy {
                    max_attempts: parse_var(&lookup, "FEED_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
                    initial_backoff_ms: parse_var(
                        &lookup,
                        "FEED_BACKOFF_MS",
                        DEFAULT_INITIAL_BACKOFF_MS,
                    )?,
                    ..RetryPolicy::default()
                },
            },
            snapshots: SnapshotConfig {
                data_dir: lookup("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
                retention: parse_var(&lookup, "SNAPSHOT_RETENTION", DEFAULT_SNAPSHOT_RETENTION)?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_none() {
            if self.database.host.is_empty() {
                return Err(SyncError::Config("DB_HOST cannot be empty".to_string()));
            }
            if self.database.port == 0 {
                return Err(SyncError::Config("DB_PORT must be greater than 0".to_string()));
            }
            if self.database.name.is_empty() {
                return Err(SyncError::Config("DB_NAME cannot be empty".to_string()));
            }
        }

        if self.database.max_connections == 0 {
            return Err(SyncError::Config(
                "DB_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }

        self.feed.validate()?;

        if self.snapshots.retention == 0 {
            return Err(SyncError::Config(
                "SNAPSHOT_RETENTION must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            feed: FeedConfig::default(),
            snapshots: SnapshotConfig::new(DEFAULT_DATA_DIR),
        }
    }
}

impl DatabaseConfig {
    /// Connection options for sqlx
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return Ok(PgConnectOptions::from_str(url)?);
        }

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            name: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

// Passwords stay out of logs.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl FeedConfig {
    /// URL for one year of incidents
    pub fn year_url(&self, year: i32) -> String {
        format!("{}/victims/{}", self.base_url.trim_end_matches('/'), year)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(SyncError::Config("FEED_BASE_URL cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(SyncError::Config(
                "FEED_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        self.retry.validate().map_err(SyncError::Config)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            timeout_secs: DEFAULT_FEED_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

impl SnapshotConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            retention: DEFAULT_SNAPSHOT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory for run logs; never pruned
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| SyncError::Config(format!("{} has an invalid value: {:?}", key, raw))),
        _ => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = SyncConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.feed.base_url, DEFAULT_FEED_BASE_URL);
        assert_eq!(config.feed.timeout_secs, 30);
        assert_eq!(config.feed.retry, RetryPolicy::default());
        assert_eq!(config.snapshots.retention, 5);
        assert_eq!(config.snapshots.logs_dir(), PathBuf::from("./data/logs"));
    }

    #[test]
    fn test_database_parts_from_environment() {
        let config = SyncConfig::from_lookup(lookup_from(&[
            ("DB_NAME", "intel"),
            ("DB_USER", "analyst"),
            ("DB_PASSWORD", "s3cret"),
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
        ]))
        .unwrap();

        assert_eq!(config.database.name, "intel");
        assert_eq!(config.database.user, "analyst");
        assert_eq!(config.database.port, 6543);

        let options = config.database.connect_options().unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("intel"));
    }

    #[test]
    fn test_invalid_number_is_a_config_error() {
        let err = SyncConfig::from_lookup(lookup_from(&[("DB_PORT", "five")])).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let err =
            SyncConfig::from_lookup(lookup_from(&[("SNAPSHOT_RETENTION", "0")])).unwrap_err();
        assert!(err.to_string().contains("SNAPSHOT_RETENTION"));
    }

    #[test]
    fn test_year_url_handles_trailing_slash() {
        let feed = FeedConfig {
            base_url: "https://feed.example/v1/".to_string(),
            ..FeedConfig::default()
        };
        assert_eq!(feed.year_url(2024), "https://feed.example/v1/victims/2024");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DatabaseConfig {
            password: "hunter2".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
