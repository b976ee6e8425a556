//! Cache Module
//!
//! The facade callers talk to. It picks one backend by name at construction
//! and forwards every operation to it.

mod registry;

pub use registry::{BackendFactory, BackendRegistry};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{CacheConfig, DEFAULT_STORAGE};
use crate::error::{CacheError, Result};
use crate::storage::{FileStorage, Storage};

// == Cache ==
/// A cache bound to a single backend for its whole lifetime.
pub struct Cache {
    /// The active backend
    backend: Box<dyn Storage>,
    /// Registry name the backend was built from
    backend_name: String,
}

impl Cache {
    // == Constructor ==
    /// Creates a cache using the built-in backends.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Self::with_registry(config, &BackendRegistry::default())
    }

    /// Creates a cache choosing among the backends in `registry`.
    ///
    /// An unknown `storage` name selects `file`. If the chosen backend fails
    /// to build, the built-in file backend is opened from `config.file` (or
    /// its defaults) instead.
    ///
    /// # Errors
    /// [`CacheError::Configuration`] when the fallback file backend cannot be
    /// opened either.
    pub fn with_registry(config: &CacheConfig, registry: &BackendRegistry) -> Result<Self> {
        let requested = config.storage.as_str();
        let name = if registry.contains(requested) {
            requested
        } else {
            debug!(storage = requested, "Unknown cache storage, using file");
            DEFAULT_STORAGE
        };

        let primary = match registry.build(name, config) {
            Some(result) => result,
            None => Err(CacheError::Configuration(format!(
                "no backend registered under \"{}\"",
                name
            ))),
        };

        match primary {
            Ok(backend) => {
                info!(backend = name, "Cache backend ready");
                Ok(Self::from_backend(name, backend))
            }
            Err(primary_err) => {
                warn!(backend = name, error = %primary_err, "Cache backend failed, falling back to file");
                let storage = FileStorage::from_config(&config.file_or_default()).map_err(|fallback_err| {
                    CacheError::Configuration(format!(
                        "backend \"{}\" failed ({}) and the file fallback failed ({})",
                        name, primary_err, fallback_err
                    ))
                })?;
                Ok(Self::from_backend(DEFAULT_STORAGE, Box::new(storage)))
            }
        }
    }

    /// Wraps an already constructed backend.
    pub fn from_backend(name: impl Into<String>, backend: Box<dyn Storage>) -> Self {
        Self {
            backend,
            backend_name: name.into(),
        }
    }

    /// Registry name of the active backend.
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    // == Forwarded Operations ==
    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.backend.exists(key)
    }

    pub fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        self.backend.set(key, value, ttl_seconds)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.backend.get(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.backend.delete(key)
    }

    pub fn flush(&self) -> bool {
        self.backend.flush()
    }

    /// Runs the backend's expiration sweep.
    pub fn remove_expired_keys(&self) {
        self.backend.remove_expired_keys()
    }

    // == Remember ==
    /// Returns the cached value for `key`, or stores `value` and returns it.
    ///
    /// The caller gets `value` back even if storing it failed.
    pub fn remember(&self, key: &str, value: Value, ttl_seconds: u64) -> Value {
        self.remember_with(key, ttl_seconds, || value)
    }

    /// Like [`Cache::remember`], computing the value only on a miss.
    pub fn remember_with<F>(&self, key: &str, ttl_seconds: u64, compute: F) -> Value
    where
        F: FnOnce() -> Value,
    {
        if self.exists(key) {
            // The record may expire between the two calls
            if let Some(cached) = self.get(key) {
                return cached;
            }
        }

        let value = compute();
        if !self.set(key, &value, ttl_seconds) {
            debug!(key, "Remembered value was not stored");
        }
        value
    }

    // == Typed Helpers ==
    /// Stores any serializable value.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, &value, ttl_seconds),
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value");
                false
            }
        }
    }

    /// Reads a value back into `T`; a value of another shape is a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| serde_json::from_value(value).ok())
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend_name)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;
    use crate::storage::MemoryStorage;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::Cell;

    fn failing(_: &CacheConfig) -> Result<Box<dyn Storage>> {
        Err(CacheError::StorageUnavailable("server unreachable".into()))
    }

    #[test]
    fn test_file_backend_selected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(&CacheConfig::file(dir.path())).unwrap();

        assert_eq!(cache.backend_name(), "file");
        assert!(cache.is_connected());
    }

    #[test]
    fn test_memory_backend_selected() {
        let config = CacheConfig::default().with_storage("memory");
        let cache = Cache::new(&config).unwrap();

        assert_eq!(cache.backend_name(), "memory");
        assert!(cache.set("k", &json!(1), 0));
        assert_eq!(cache.get("k"), Some(json!(1)));
    }

    #[test]
    fn test_unknown_storage_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig::file(dir.path()).with_storage("unknown");
        let cache = Cache::new(&config).unwrap();

        assert_eq!(cache.backend_name(), "file");
        cache.set("k", &json!("v"), 0);
        assert!(dir.path().join("k.cache").exists());
    }

    #[test]
    fn test_failing_backend_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig::file(dir.path()).with_storage("flaky");
        let registry = BackendRegistry::default().with("flaky", failing);

        let cache = Cache::with_registry(&config, &registry).unwrap();
        assert_eq!(cache.backend_name(), "file");
        assert!(cache.set("k", &json!(true), 0));
    }

    #[test]
    fn test_fallback_failure_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let config = CacheConfig {
            storage: "flaky".into(),
            file: Some(FileConfig {
                path: blocker.join("cache"),
                ..FileConfig::default()
            }),
            ..CacheConfig::default()
        };
        let registry = BackendRegistry::default().with("flaky", failing);

        let result = Cache::with_registry(&config, &registry);
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[test]
    fn test_custom_backend_receives_its_section() {
        let config = CacheConfig::from_json_str(r#"{"storage": "bounded", "bounded": {"max": 1}}"#).unwrap();
        let registry = BackendRegistry::default().with("bounded", |config: &CacheConfig| {
            let max = config
                .section("bounded")
                .and_then(|s| s["max"].as_u64())
                .unwrap_or(0) as usize;
            Ok(Box::new(MemoryStorage::with_capacity_limit(max)) as Box<dyn Storage>)
        });

        let cache = Cache::with_registry(&config, &registry).unwrap();
        assert_eq!(cache.backend_name(), "bounded");
        assert!(cache.set("a", &json!(1), 0));
        assert!(!cache.set("b", &json!(2), 0));
    }

    #[test]
    fn test_remember_stores_on_miss() {
        let cache = Cache::from_backend("memory", Box::new(MemoryStorage::new()));

        assert_eq!(cache.remember("k", json!("first"), 0), json!("first"));
        assert_eq!(cache.remember("k", json!("second"), 0), json!("first"));
        assert_eq!(cache.get("k"), Some(json!("first")));
    }

    #[test]
    fn test_remember_with_computes_once() {
        let cache = Cache::from_backend("memory", Box::new(MemoryStorage::new()));
        let calls = Cell::new(0);

        for _ in 0..3 {
            let value = cache.remember_with("k", 0, || {
                calls.set(calls.get() + 1);
                json!(42)
            });
            assert_eq!(value, json!(42));
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_remember_returns_value_when_write_fails() {
        let cache = Cache::from_backend("memory", Box::new(MemoryStorage::with_capacity_limit(0)));

        assert_eq!(cache.remember("k", json!("v"), 0), json!("v"));
        assert!(!cache.exists("k"));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
    }

    #[test]
    fn test_typed_helpers() {
        let cache = Cache::from_backend("memory", Box::new(MemoryStorage::new()));
        let profile = Profile {
            name: "ada".into(),
            age: 36,
        };

        assert!(cache.set_as("p", &profile, 0));
        assert_eq!(cache.get_as::<Profile>("p"), Some(profile));
        assert_eq!(cache.get_as::<Vec<u8>>("p"), None);
    }
}
