//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for `PUT /cache/:key` and `POST /cache/:key/remember`
///
/// # Fields
/// - `value`: Any JSON value to store
/// - `ttl`: Optional TTL in seconds, omitted or 0 = never expires
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRequest {
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl StoreRequest {
    /// TTL to pass to the cache, 0 when none was given.
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.unwrap_or(0)
    }
}

/// Checks a key taken from the request path.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
