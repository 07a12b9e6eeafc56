//! Cache Configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables: `VOID_CACHE_PATH`, `VOID_CACHE_MAX_AGE` (seconds)
//! 2. Config file (TOML)
//! 3. Defaults
//!
//! # Example Config File
//!
//! ```toml
//! [cache]
//! root_path = "/var/cache/void"
//! bin_id = "terrain"
//! max_age_secs = 86400
//! clone_lock_timeout_ms = 250
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bin::DEFAULT_CLONE_LOCK_TIMEOUT;
use crate::error::ConfigError;

/// Environment variable overriding [`CacheConfig::root_path`]
pub const ENV_CACHE_PATH: &str = "VOID_CACHE_PATH";

/// Environment variable overriding [`CacheConfig::max_age_secs`]
pub const ENV_CACHE_MAX_AGE: &str = "VOID_CACHE_MAX_AGE";

/// Cache bin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding all bins
    pub root_path: PathBuf,
    /// Bin identifier (subdirectory of `root_path`)
    pub bin_id: String,
    /// Records older than this read as expired; `None` never expires
    pub max_age_secs: Option<u64>,
    /// How long graph sanitizing waits for a texture another thread is writing
    pub clone_lock_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_path: std::env::temp_dir().join("void_cache"),
            bin_id: "default".to_string(),
            max_age_secs: None,
            clone_lock_timeout_ms: DEFAULT_CLONE_LOCK_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cache: CacheConfig,
}

impl CacheConfig {
    /// Parse a TOML document with a `[cache]` table
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.cache)
    }

    /// Load a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        log::info!("Loaded cache config from {:?}", path);
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override fields from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Override fields from any variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = lookup(ENV_CACHE_PATH).filter(|p| !p.is_empty()) {
            self.root_path = PathBuf::from(path);
            log::info!("Cache path from env: {:?}", self.root_path);
        }

        if let Some(value) = lookup(ENV_CACHE_MAX_AGE) {
            let secs = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_CACHE_MAX_AGE,
                value: value.clone(),
            })?;
            self.max_age_secs = Some(secs);
        }

        Ok(())
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }

    pub fn clone_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.clone_lock_timeout_ms)
    }
}
