//! Configuration Module
//!
//! Handles loading the cache configuration (backend selection plus one
//! sub-block per backend) and the server parameters around it.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

/// Name of the file backend, also the fallback for unknown names.
pub const DEFAULT_STORAGE: &str = "file";

// == Cache Config ==
/// Backend selection and per-backend settings consumed by [`crate::Cache`].
///
/// Top-level keys other than the built-in sub-blocks are kept in `extra` so
/// custom backends can read their own section via [`CacheConfig::section`].
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Registry name of the backend to use
    #[serde(default = "default_storage")]
    pub storage: String,
    /// File backend settings
    #[serde(default)]
    pub file: Option<FileConfig>,
    /// In-process memory backend settings
    #[serde(default)]
    pub memory: Option<MemoryConfig>,
    /// Network key-value backend settings
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Memcached backend settings
    #[serde(default)]
    pub memcache: Option<MemcacheConfig>,
    /// Any other top-level sections
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Settings for the file backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileConfig {
    /// Directory holding the record files
    #[serde(default = "default_file_path")]
    pub path: PathBuf,
    /// When set, file names are hashed from `key + secret`
    #[serde(default)]
    pub secret: Option<String>,
    /// Run the expiration sweep when the backend is opened
    #[serde(default)]
    pub remove_expired: bool,
}

/// Settings for the in-process memory backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MemoryConfig {
    /// Upper bound on live entries, None = unbounded
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Connection settings for the network key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: i64,
}

/// Connection settings for the memcached backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemcacheConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_memcache_port")]
    pub port: u16,
}

fn default_storage() -> String {
    DEFAULT_STORAGE.to_string()
}

fn default_file_path() -> PathBuf {
    env::temp_dir().join("mini_cache")
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_memcache_port() -> u16 {
    11211
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            file: None,
            memory: None,
            redis: None,
            memcache: None,
            extra: HashMap::new(),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: default_file_path(),
            secret: None,
            remove_expired: false,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            password: None,
            database: 0,
        }
    }
}

impl Default for MemcacheConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_memcache_port(),
        }
    }
}

impl CacheConfig {
    /// Creates a file-backed configuration rooted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(FileConfig {
                path: path.into(),
                ..FileConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Returns a copy selecting a different backend name.
    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = storage.into();
        self
    }

    /// Parses a JSON configuration object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            CacheError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Builds the configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STORAGE` - Backend name (default: file)
    /// - `CACHE_PATH` - File backend directory (default: `<tmp>/mini_cache`)
    /// - `CACHE_SECRET` - File name hashing secret (default: none)
    /// - `CACHE_REMOVE_EXPIRED` - Sweep on open, `true`/`1` (default: false)
    /// - `CACHE_MAX_ENTRIES` - Memory backend bound (default: unbounded)
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DATABASE`
    /// - `MEMCACHE_HOST`, `MEMCACHE_PORT`
    pub fn from_env() -> Self {
        let defaults = FileConfig::default();
        let file = FileConfig {
            path: env::var("CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            secret: env::var("CACHE_SECRET").ok().filter(|s| !s.is_empty()),
            remove_expired: env::var("CACHE_REMOVE_EXPIRED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let memory = MemoryConfig {
            max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok()),
        };

        let redis_defaults = RedisConfig::default();
        let redis = RedisConfig {
            host: env::var("REDIS_HOST").unwrap_or(redis_defaults.host),
            port: env::var("REDIS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(redis_defaults.port),
            password: env::var("REDIS_PASSWORD").ok(),
            database: env::var("REDIS_DATABASE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(redis_defaults.database),
        };

        let memcache_defaults = MemcacheConfig::default();
        let memcache = MemcacheConfig {
            host: env::var("MEMCACHE_HOST").unwrap_or(memcache_defaults.host),
            port: env::var("MEMCACHE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(memcache_defaults.port),
        };

        Self {
            storage: env::var("CACHE_STORAGE").unwrap_or_else(|_| default_storage()),
            file: Some(file),
            memory: Some(memory),
            redis: Some(redis),
            memcache: Some(memcache),
            extra: HashMap::new(),
        }
    }

    /// Returns the raw sub-block for a backend name, if present.
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Returns the file settings, or the defaults when none were supplied.
    pub fn file_or_default(&self) -> FileConfig {
        self.file.clone().unwrap_or_default()
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Expiration sweep interval in seconds, 0 disables the sweep
    pub sweep_interval: u64,
    /// Backend selection
    pub cache: CacheConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `CACHE_CONFIG_FILE` - JSON cache configuration, replaces the
    ///   `CACHE_*` / `REDIS_*` variables when set
    pub fn from_env() -> Result<Self> {
        let cache = match env::var("CACHE_CONFIG_FILE") {
            Ok(path) => CacheConfig::from_file(path)?,
            Err(_) => CacheConfig::from_env(),
        };

        Ok(Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            sweep_interval: env::var("SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            cache,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            sweep_interval: 60,
            cache: CacheConfig::default(),
        }
    }
}
