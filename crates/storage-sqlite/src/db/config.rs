//! Database configuration resolved from the environment.

use std::path::Path;

use promocode_core::errors::{Error, Result};

/// Environment variable overriding the database file location.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Environment variable for the maximum number of pooled read connections.
///
/// The pool holds one more connection, kept by the writer actor.
pub const POOL_SIZE_ENV: &str = "PROMOCODE_DB_POOL_SIZE";
/// Environment variable for SQLite's busy timeout, in milliseconds.
pub const BUSY_TIMEOUT_ENV: &str = "PROMOCODE_DB_BUSY_TIMEOUT_MS";

const DB_FILE_NAME: &str = "promocodes.db";
const DEFAULT_POOL_SIZE: u32 = 8;
const DEFAULT_BUSY_TIMEOUT_MS: u32 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub db_path: String,
    /// Connections available to readers, not counting the writer's.
    pub max_pool_size: u32,
    pub busy_timeout_ms: u32,
}

impl DbConfig {
    /// Configuration with default pool settings for the given database file.
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            max_pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Reads the configuration from process environment variables.
    pub fn from_env(app_data_dir: &str) -> Result<Self> {
        Self::from_lookup(app_data_dir, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(app_data_dir: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup(DATABASE_URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| default_db_path(app_data_dir));

        let max_pool_size = parse_u32(&lookup, POOL_SIZE_ENV)?.unwrap_or(DEFAULT_POOL_SIZE);
        if max_pool_size == 0 {
            return Err(Error::InvalidConfigValue(format!(
                "{} must be at least 1",
                POOL_SIZE_ENV
            )));
        }
        let busy_timeout_ms =
            parse_u32(&lookup, BUSY_TIMEOUT_ENV)?.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

        Ok(Self {
            db_path,
            max_pool_size,
            busy_timeout_ms,
        })
    }
}

fn default_db_path(app_data_dir: &str) -> String {
    Path::new(app_data_dir)
        .join(DB_FILE_NAME)
        .to_string_lossy()
        .to_string()
}

fn parse_u32<F>(lookup: &F, key: &str) -> Result<Option<u32>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<u32>().map_err(|_| {
                Error::InvalidConfigValue(format!("{}='{}' is not a valid number", key, raw))
            })
        })
        .transpose()
}
