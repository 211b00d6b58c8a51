#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Land value result cache stored in `SQLite`.
//!
//! Keys are WGS84 coordinates quantized to a fixed number of decimal
//! digits, so nearby queries share an entry; reference land values are
//! published per zone, not per point. Entries expire after a long TTL
//! that mirrors the yearly publication cadence and are only written for
//! strictly positive values.

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{TimeDelta, Utc};
use land_value_models::LandValueRecord;
use rusqlite::{Connection, OptionalExtension as _, params};
use serde::Serialize;

/// Environment variable overriding the TTL in days.
pub const TTL_DAYS_ENV: &str = "LAND_VALUE_CACHE_TTL_DAYS";

/// Environment variable overriding the key precision in decimal digits.
pub const PRECISION_ENV: &str = "LAND_VALUE_CACHE_PRECISION";

/// Default TTL. Bodenrichtwerte are republished every one or two years.
pub const DEFAULT_TTL_DAYS: i64 = 180;

/// Default key precision; four digits is roughly 11 m.
pub const DEFAULT_PRECISION: u8 = 4;

/// Highest supported key precision.
const MAX_PRECISION: u8 = 8;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// `SQLite` error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored record could not be (de)serialized.
    #[error("Record serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The cache directory could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cache location and policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// `SQLite` file, or `None` for an in-memory cache.
    pub path: Option<PathBuf>,
    /// Entries older than this are expired.
    pub ttl: TimeDelta,
    /// Decimal digits kept when quantizing coordinates.
    pub precision: u8,
}

impl CacheConfig {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for unset or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        let ttl = env_parse::<i64>(TTL_DAYS_ENV)
            .filter(|&d| d >= 0)
            .and_then(TimeDelta::try_days)
            .unwrap_or_else(|| TimeDelta::days(DEFAULT_TTL_DAYS));
        let precision = env_parse::<u8>(PRECISION_ENV).unwrap_or(DEFAULT_PRECISION);
        Self {
            path: Some(paths::cache_db_path()),
            ttl,
            precision: precision.min(MAX_PRECISION),
        }
    }

    /// Default policy for the given file.
    #[must_use]
    pub fn at(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            ttl: TimeDelta::days(DEFAULT_TTL_DAYS),
            precision: DEFAULT_PRECISION,
        }
    }

    /// Default policy without persistence.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            path: None,
            ttl: TimeDelta::days(DEFAULT_TTL_DAYS),
            precision: DEFAULT_PRECISION,
        }
    }

    /// Overrides the TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    /// Overrides the key precision.
    #[must_use]
    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision.min(MAX_PRECISION);
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        log::warn!("Ignoring invalid {name}={raw:?}");
    }
    parsed
}

/// Entry counts and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Stored entries, including expired ones not yet cleaned up.
    pub entries: u64,
    /// Stored entries older than the TTL.
    pub expired: u64,
    /// TTL in days.
    pub ttl_days: i64,
    /// Key precision in decimal digits.
    pub precision: u8,
    /// Cache file, or `":memory:"`.
    pub path: String,
}

/// Durable quantized-coordinate cache of land value records.
///
/// Safe to share across tasks: every operation takes the connection lock
/// for the duration of one statement.
pub struct LandValueCache {
    conn: Mutex<Connection>,
    config: CacheConfig,
}

impl LandValueCache {
    /// Opens (or creates) the cache described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the directory, connection or schema
    /// cannot be created.
    pub fn open(config: CacheConfig) -> Result<Self, CacheError> {
        let conn = match &config.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    paths::ensure_dir(parent)?;
                }
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        create_schema(&conn)?;
        log::debug!(
            "Opened land value cache at {} (ttl {} days, precision {})",
            describe_path(config.path.as_deref()),
            config.ttl.num_days(),
            config.precision
        );
        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// Opens the cache configured through the environment.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the cache cannot be opened.
    pub fn open_default() -> Result<Self, CacheError> {
        Self::open(CacheConfig::from_env())
    }

    /// Opens a non-persistent cache with the default policy.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::open(CacheConfig::in_memory())
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Quantized key for a WGS84 coordinate.
    #[must_use]
    pub fn key(&self, lat: f64, lon: f64) -> String {
        let digits = usize::from(self.config.precision);
        format!(
            "{:.digits$},{:.digits$}",
            quantize(lat, self.config.precision),
            quantize(lon, self.config.precision)
        )
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cutoff_millis(&self) -> i64 {
        Utc::now()
            .timestamp_millis()
            .saturating_sub(self.config.ttl.num_milliseconds())
    }

    /// Returns the unexpired record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the query fails or the stored record is
    /// unreadable.
    pub fn get(&self, key: &str) -> Result<Option<LandValueRecord>, CacheError> {
        let row: Option<(String, i64)> = self
            .lock()
            .query_row(
                "SELECT record, created_at FROM land_value_cache WHERE cache_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((json, created_at)) = row else {
            log::debug!("Cache miss for {key}");
            return Ok(None);
        };
        if created_at < self.cutoff_millis() {
            log::debug!("Cache entry for {key} expired");
            return Ok(None);
        }

        log::debug!("Cache hit for {key}");
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Stores `record` under `key`, replacing any previous entry.
    ///
    /// Returns `false` without writing when the record has no positive
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if serialization or the insert fails.
    pub fn set(&self, key: &str, record: &LandValueRecord) -> Result<bool, CacheError> {
        if !record.has_positive_value() {
            log::debug!("Not caching non-positive value for {key}");
            return Ok(false);
        }

        let json = serde_json::to_string(record)?;
        self.lock().execute(
            "INSERT INTO land_value_cache (cache_key, record, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (cache_key) DO UPDATE
             SET record = excluded.record, created_at = excluded.created_at",
            params![key, json, Utc::now().timestamp_millis()],
        )?;
        Ok(true)
    }

    /// Entry counts and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the count queries fail.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let cutoff = self.cutoff_millis();
        let (entries, expired): (i64, i64) = self.lock().query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN created_at <= ?1 THEN 1 ELSE 0 END), 0)
             FROM land_value_cache",
            params![cutoff],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(CacheStats {
            entries: u64::try_from(entries).unwrap_or_default(),
            expired: u64::try_from(expired).unwrap_or_default(),
            ttl_days: self.config.ttl.num_days(),
            precision: self.config.precision,
            path: describe_path(self.config.path.as_deref()),
        })
    }

    /// Removes expired entries and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the delete fails.
    pub fn cleanup(&self) -> Result<usize, CacheError> {
        let removed = self.lock().execute(
            "DELETE FROM land_value_cache WHERE created_at <= ?1",
            params![self.cutoff_millis()],
        )?;
        log::info!("Removed {removed} expired cache entries");
        Ok(removed)
    }

    /// Removes every entry and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the delete fails.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let removed = self.lock().execute("DELETE FROM land_value_cache", [])?;
        log::info!("Cleared {removed} cache entries");
        Ok(removed)
    }
}

fn create_schema(conn: &Connection) -> Result<(), CacheError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS land_value_cache (
            cache_key TEXT PRIMARY KEY NOT NULL,
            record TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS land_value_cache_created_at
            ON land_value_cache (created_at);",
    )?;
    Ok(())
}

/// Rounds to `precision` digits, normalizing negative zero.
fn quantize(value: f64, precision: u8) -> f64 {
    let scale = 10_f64.powi(i32::from(precision));
    (value * scale).round() / scale + 0.0
}

fn describe_path(path: Option<&Path>) -> String {
    path.map_or_else(|| ":memory:".to_string(), |p| p.display().to_string())
}
