//! Mini Cache - A key-value cache with interchangeable storage backends
//!
//! Callers store, read, expire and flush values through [`Cache`], which
//! forwards to one backend chosen by name at construction: a file-backed
//! engine (the default), an in-process memory store, or a Redis or memcached
//! client.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{BackendRegistry, Cache};
pub use config::{CacheConfig, Config, FileConfig};
pub use error::{CacheError, Result};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use tasks::spawn_sweep_task;
