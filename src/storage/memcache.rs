//! Memcache Storage Module
//!
//! Adapter over a memcached client. Values travel as JSON text and the
//! server handles expiration.

use memcache::Client;
use serde_json::Value;
use tracing::warn;

use super::codec::current_timestamp;
use super::Storage;
use crate::config::MemcacheConfig;
use crate::error::{CacheError, Result};

/// Longest relative expiration memcached accepts; larger values are read as
/// absolute Unix timestamps.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Read/write timeout, seconds
const IO_TIMEOUT_SECS: u64 = 5;

// == Memcache Storage ==
/// Storage backed by a memcached server.
pub struct MemcacheStorage {
    client: Client,
}

impl MemcacheStorage {
    // == Constructor ==
    /// Connects and checks the server answers.
    ///
    /// # Errors
    /// [`CacheError::StorageUnavailable`] if the server cannot be reached.
    pub fn connect(config: &MemcacheConfig) -> Result<Self> {
        let server = format!("{}:{}", config.host, config.port);
        let url = format!("memcache://{}?timeout={}", server, IO_TIMEOUT_SECS);

        let client = Client::connect(url.as_str()).map_err(|e| {
            CacheError::StorageUnavailable(format!(
                "failed to connect to memcached server ({}): {}",
                server, e
            ))
        })?;

        client.version().map_err(|e| {
            CacheError::StorageUnavailable(format!(
                "memcached server ({}) did not answer: {}",
                server, e
            ))
        })?;

        Ok(Self { client })
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.client.get::<String>(key) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "Memcached read failed");
                None
            }
        }
    }
}

/// Converts a TTL into memcached's expiration field.
///
/// Zero means never expire. TTLs beyond thirty days must be sent as an
/// absolute timestamp.
fn expiration(ttl_seconds: u64, now: i64) -> u32 {
    if ttl_seconds <= MAX_RELATIVE_EXPIRATION {
        return ttl_seconds as u32;
    }

    let deadline = u64::try_from(now).unwrap_or(0).saturating_add(ttl_seconds);
    u32::try_from(deadline).unwrap_or(u32::MAX)
}

impl Storage for MemcacheStorage {
    fn is_connected(&self) -> bool {
        self.client.version().is_ok()
    }

    fn exists(&self, key: &str) -> bool {
        self.read(key).is_some()
    }

    fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value");
                return false;
            }
        };

        let expires = expiration(ttl_seconds, current_timestamp());
        match self.client.set(key, data.as_str(), expires) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Memcached write failed");
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        serde_json::from_str(&self.read(key)?).ok()
    }

    fn delete(&self, key: &str) -> bool {
        self.client.delete(key).unwrap_or(false)
    }

    fn flush(&self) -> bool {
        self.client.flush().is_ok()
    }
}
