//! Cache configuration.
//!
//! Read from a TOML file, every key optional:
//!
//! ```toml
//! cache_path = "/home/user/.cache/driveinspect/filedata.json"
//! drive_root_name = "My Drive"
//! use_cache = true
//! ```
//!
//! Two environment variables override the file:
//! `DRIVEINSPECT_CACHE_PATH` replaces `cache_path`, and a set
//! `DRIVEINSPECT_NO_CACHE` (any value except `0` or `false`) turns
//! `use_cache` off.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CACHE_PATH: &str = "./.filedata-cache.json";
pub const DEFAULT_DRIVE_ROOT_NAME: &str = "My Drive";

pub const ENV_CACHE_PATH: &str = "DRIVEINSPECT_CACHE_PATH";
pub const ENV_NO_CACHE: &str = "DRIVEINSPECT_NO_CACHE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Where the snapshot lives.
    pub cache_path: PathBuf,
    /// Name of the caller's top-level folder, which maps to `/`.
    pub drive_root_name: String,
    /// Load the snapshot on open. When off the cache starts empty.
    pub use_cache: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            drive_root_name: DEFAULT_DRIVE_ROOT_NAME.to_string(),
            use_cache: true,
        }
    }
}

impl CacheConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides looked up through `lookup` (usually the process
    /// environment).
    #[must_use]
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_CACHE_PATH).filter(|p| !p.is_empty()) {
            self.cache_path = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_NO_CACHE) {
            let value = value.trim().to_ascii_lowercase();
            if value != "0" && value != "false" {
                self.use_cache = false;
            }
        }
        self
    }

    /// [`apply_overrides`](Self::apply_overrides) with the process
    /// environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }
}
