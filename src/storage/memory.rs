//! Memory Storage Module
//!
//! In-process backend: a HashMap of serialized values with TTL expiration.
//! Values are kept as JSON text, the same way the out-of-process backends
//! hand bytes to their clients.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, warn};

use super::codec::current_timestamp;
use super::Storage;
use crate::config::MemoryConfig;

// == Memory Entry ==
/// A single stored value with its expiration metadata.
#[derive(Debug, Clone)]
struct MemoryEntry {
    /// The value as JSON text
    data: String,
    /// Write timestamp (Unix seconds)
    written_at: i64,
    /// Lifetime in seconds, 0 = never expires
    ttl_seconds: u64,
}

impl MemoryEntry {
    fn new(data: String, ttl_seconds: u64) -> Self {
        Self {
            data,
            written_at: current_timestamp(),
            ttl_seconds,
        }
    }

    /// Same strict boundary as file records: live while `age <= ttl`.
    fn is_expired_at(&self, now: i64) -> bool {
        self.ttl_seconds != 0
            && now.saturating_sub(self.written_at) > i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX)
    }
}

// == Memory Storage ==
/// Thread-safe in-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// Key-value storage
    entries: RwLock<HashMap<String, MemoryEntry>>,
    /// Maximum number of entries allowed, None = unbounded
    max_entries: Option<usize>,
}

impl MemoryStorage {
    // == Constructor ==
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding at most `max_entries` live entries.
    pub fn with_capacity_limit(max_entries: usize) -> Self {
        Self {
            entries: RwLock::default(),
            max_entries: Some(max_entries),
        }
    }

    /// Creates a store from its configuration block.
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            entries: RwLock::default(),
            max_entries: config.max_entries,
        }
    }

    // == Length ==
    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Returns the live entry for `key`, dropping it if it has expired.
    fn live_data(&self, key: &str) -> Option<String> {
        let now = current_timestamp();
        {
            let entries = self.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.data.clone()),
                Some(_) => {}
            }
        }

        debug!(key, "Memory entry expired");
        let mut entries = self.write();
        // Re-check under the write lock, a fresh value may have landed meanwhile
        if entries.get(key).is_some_and(|entry| entry.is_expired_at(now)) {
            entries.remove(key);
        }
        None
    }

    // Poisoning is ignored: no operation leaves the map half-updated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, MemoryEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn is_connected(&self) -> bool {
        true
    }

    fn exists(&self, key: &str) -> bool {
        self.live_data(key).is_some()
    }

    fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value");
                return false;
            }
        };

        let mut entries = self.write();

        if let Some(max) = self.max_entries {
            if !entries.contains_key(key) && entries.len() >= max {
                let now = current_timestamp();
                entries.retain(|_, entry| !entry.is_expired_at(now));
                if entries.len() >= max {
                    warn!(key, max_entries = max, "Memory cache is full");
                    return false;
                }
            }
        }

        entries.insert(key.to_string(), MemoryEntry::new(data, ttl_seconds));
        true
    }

    fn get(&self, key: &str) -> Option<Value> {
        let data = self.live_data(key)?;
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Failed to deserialize value");
                None
            }
        }
    }

    fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    fn flush(&self) -> bool {
        self.write().clear();
        true
    }

    fn remove_expired_keys(&self) {
        let removed = self.cleanup_expired();
        if removed > 0 {
            debug!(removed, "Removed expired memory entries");
        }
    }
}
