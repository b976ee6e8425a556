//! Backend Registry
//!
//! Maps configuration names to backend constructors.

use std::collections::HashMap;
use std::fmt;

use crate::config::{CacheConfig, DEFAULT_STORAGE};
use crate::error::Result;
use crate::storage::{FileStorage, MemoryStorage, Storage};

/// Builds a backend from the full cache configuration.
pub type BackendFactory = Box<dyn Fn(&CacheConfig) -> Result<Box<dyn Storage>> + Send + Sync>;

// == Backend Registry ==
/// Name to constructor table used by [`super::Cache`] to pick its backend.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// Creates a registry with no backends at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Adds a backend, replacing any existing one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&CacheConfig) -> Result<Box<dyn Storage>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    /// Builder form of [`BackendRegistry::register`].
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&CacheConfig) -> Result<Box<dyn Storage>> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Whether a backend is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the constructor registered under `name`, if any.
    pub fn build(&self, name: &str, config: &CacheConfig) -> Option<Result<Box<dyn Storage>>> {
        self.factories.get(name).map(|factory| factory(config))
    }
}

impl Default for BackendRegistry {
    /// The built-in backends: `file`, `memory`, and `redis` with the
    /// `redis` feature.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(DEFAULT_STORAGE, |config: &CacheConfig| {
                let storage = FileStorage::from_config(&config.file_or_default())?;
                Ok(Box::new(storage) as Box<dyn Storage>)
            })
            .register("memory", |config: &CacheConfig| {
                let storage = MemoryStorage::from_config(&config.memory.clone().unwrap_or_default());
                Ok(Box::new(storage) as Box<dyn Storage>)
            });

        #[cfg(feature = "redis")]
        registry.register("redis", |config: &CacheConfig| {
            let storage = crate::storage::RedisStorage::connect(&config.redis.clone().unwrap_or_default())?;
            Ok(Box::new(storage) as Box<dyn Storage>)
        });

        #[cfg(feature = "memcache")]
        registry.register("memcache", |config: &CacheConfig| {
            let storage =
                crate::storage::MemcacheStorage::connect(&config.memcache.clone().unwrap_or_default())?;
            Ok(Box::new(storage) as Box<dyn Storage>)
        });

        registry
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
