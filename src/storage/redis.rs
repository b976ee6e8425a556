//! Redis Storage Module
//!
//! Thin adapter over a synchronous Redis connection. Values travel as JSON
//! text; expiration is left to the server (SETEX).

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use redis::{Client, Commands, Connection};
use serde_json::Value;
use tracing::warn;

use super::Storage;
use crate::config::RedisConfig;
use crate::error::{CacheError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// == Redis Storage ==
/// Storage backed by a Redis server.
pub struct RedisStorage {
    conn: Mutex<Connection>,
}

impl RedisStorage {
    // == Constructor ==
    /// Connects, authenticates and selects the configured database.
    ///
    /// # Errors
    /// [`CacheError::StorageUnavailable`] naming the step that failed.
    pub fn connect(config: &RedisConfig) -> Result<Self> {
        let server = format!("{}:{}", config.host, config.port);

        let mut conn = Client::open(format!("redis://{}/", server))
            .and_then(|client| client.get_connection_with_timeout(CONNECT_TIMEOUT))
            .map_err(|e| {
                CacheError::StorageUnavailable(format!(
                    "failed to connect to Redis server ({}): {}",
                    server, e
                ))
            })?;

        if let Some(password) = &config.password {
            redis::cmd("AUTH")
                .arg(password)
                .query::<()>(&mut conn)
                .map_err(|e| {
                    CacheError::StorageUnavailable(format!(
                        "could not authenticate with Redis server ({}): {}",
                        server, e
                    ))
                })?;
        }

        redis::cmd("SELECT")
            .arg(config.database)
            .query::<()>(&mut conn)
            .map_err(|e| {
                CacheError::StorageUnavailable(format!(
                    "could not select Redis database {} ({}): {}",
                    config.database, server, e
                ))
            })?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for RedisStorage {
    fn is_connected(&self) -> bool {
        redis::cmd("PING").query::<String>(&mut *self.conn()).is_ok()
    }

    fn exists(&self, key: &str) -> bool {
        self.conn().exists::<_, bool>(key).unwrap_or(false)
    }

    fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value");
                return false;
            }
        };

        let result = if ttl_seconds > 0 {
            self.conn().set_ex::<_, _, ()>(key, data, ttl_seconds)
        } else {
            self.conn().set::<_, _, ()>(key, data)
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Redis write failed");
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        let data = match self.conn().get::<_, Option<String>>(key) {
            Ok(data) => data?,
            Err(e) => {
                warn!(key, error = %e, "Redis read failed");
                return None;
            }
        };
        serde_json::from_str(&data).ok()
    }

    fn delete(&self, key: &str) -> bool {
        self.conn().del::<_, i64>(key).map(|n| n > 0).unwrap_or(false)
    }

    fn flush(&self) -> bool {
        redis::cmd("FLUSHDB").query::<()>(&mut *self.conn()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_server_is_unavailable() {
        let config = RedisConfig {
            host: "127.0.0.1".into(),
            // Port 1 is never a Redis server
            port: 1,
            ..RedisConfig::default()
        };

        match RedisStorage::connect(&config) {
            Err(CacheError::StorageUnavailable(msg)) => assert!(msg.contains("127.0.0.1:1")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
