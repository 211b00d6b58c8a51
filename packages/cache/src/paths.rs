//! Canonical file paths for the cache data directory.
//!
//! All defaults are relative to the project root's `data/` directory.

use std::path::{Path, PathBuf};

/// Environment variable overriding the cache file location.
pub const CACHE_PATH_ENV: &str = "LAND_VALUE_CACHE_PATH";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the cache file path, honouring [`CACHE_PATH_ENV`].
#[must_use]
pub fn cache_db_path() -> PathBuf {
    std::env::var_os(CACHE_PATH_ENV)
        .filter(|p| !p.is_empty())
        .map_or_else(
            || data_dir().join("land_value_cache.sqlite"),
            PathBuf::from,
        )
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
