//! Storage Module
//!
//! The storage capability contract and its backends: the file-backed engine,
//! an in-process memory store, and network clients behind the `redis` and
//! `memcache` features.

mod codec;
mod file;
mod key;
#[cfg(feature = "memcache")]
mod memcache;
mod memory;
#[cfg(feature = "redis")]
mod redis;


use serde_json::Value;

// Re-export public types
pub use codec::{current_timestamp, decode, encode, CacheRecord};
pub use file::{FileStorage, Keys};
pub use key::map_key;
#[cfg(feature = "memcache")]
pub use self::memcache::MemcacheStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "redis")]
pub use self::redis::RedisStorage;

// == Public Constants ==
/// Extension carried by every record file
pub const RECORD_EXTENSION: &str = "cache";

// == Storage Contract ==
/// The operation set every backend provides.
///
/// Failures never surface as errors here: writes report `false`, reads
/// report `None`, so a broken cache degrades to a cache miss.
pub trait Storage: Send + Sync {
    /// Whether the backend can currently accept writes.
    fn is_connected(&self) -> bool;

    /// Whether a live (present and not expired) value is stored under `key`.
    fn exists(&self, key: &str) -> bool;

    /// Stores `value` under `key`; `ttl_seconds == 0` never expires.
    fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool;

    /// Returns the stored value, or `None` when absent, expired or unreadable.
    fn get(&self, key: &str) -> Option<Value>;

    /// Removes `key`; `true` only if something was actually removed.
    fn delete(&self, key: &str) -> bool;

    /// Removes every stored value; `true` only if all removals succeeded.
    fn flush(&self) -> bool;

    /// Proactively drops expired values. Backends whose server expires
    /// values on its own keep the default no-op.
    fn remove_expired_keys(&self) {}
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn exists(&self, key: &str) -> bool {
        (**self).exists(key)
    }

    fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        (**self).set(key, value, ttl_seconds)
    }

    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> bool {
        (**self).delete(key)
    }

    fn flush(&self) -> bool {
        (**self).flush()
    }

    fn remove_expired_keys(&self) {
        (**self).remove_expired_keys()
    }
}
