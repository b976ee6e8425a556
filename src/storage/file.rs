//! File Storage Engine
//!
//! Stores one record file per key inside a root directory, so several
//! processes can share the same cache by pointing at the same path.
//!
//! Expiration is lazy: a read that finds an expired record deletes it and
//! reports a miss. The read-compare-delete sequence takes no lock, so two
//! processes may both observe and delete the same expired file; the loser
//! simply finds nothing to remove.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the record, so readers only ever see complete records. A `flush`
//! racing with a concurrent `set` may or may not remove the freshly written
//! record.

use std::fs::{self, ReadDir};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::codec::{self, CacheRecord};
use super::key::{is_single_component, map_key};
use super::{Storage, RECORD_EXTENSION};
use crate::config::FileConfig;
use crate::error::{CacheError, Result};

// == File Storage ==
/// File-backed storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Directory holding the record files
    root: PathBuf,
    /// Optional secret mixed into hashed file names
    secret: Option<String>,
}

impl FileStorage {
    // == Constructor ==
    /// Opens (creating if needed) a storage directory.
    ///
    /// # Arguments
    /// * `root` - Directory for record files, created recursively if absent
    /// * `secret` - When set, file names are hashed from `key + secret`
    /// * `remove_expired` - Run [`FileStorage::remove_expired_keys`] right away
    ///
    /// # Errors
    /// [`CacheError::StorageUnavailable`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>, secret: Option<String>, remove_expired: bool) -> Result<Self> {
        let root = root.into();

        if let Err(e) = fs::create_dir_all(&root) {
            // Another process may have created it in the meantime
            if !root.is_dir() {
                return Err(CacheError::StorageUnavailable(format!(
                    "unable to create the \"{}\" directory: {}",
                    root.display(),
                    e
                )));
            }
        }

        let storage = Self {
            root,
            secret: secret.filter(|s| !s.is_empty()),
        };

        if remove_expired {
            storage.remove_expired_keys();
        }

        Ok(storage)
    }

    /// Opens the storage described by a file configuration block.
    pub fn from_config(config: &FileConfig) -> Result<Self> {
        Self::open(&config.path, config.secret.clone(), config.remove_expired)
    }

    /// Returns the storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the record file for `key`.
    ///
    /// `None` when no secret is configured and the raw key is not usable as
    /// a single file name.
    pub fn path_for(&self, key: &str) -> Option<PathBuf> {
        let name = map_key(key, self.secret.as_deref());
        if is_single_component(&name) {
            Some(self.root.join(name))
        } else {
            warn!(key, "Cache key is not a valid file name");
            None
        }
    }

    // == Time To Live ==
    /// Returns the seconds remaining before `key` expires.
    ///
    /// Check [`Storage::exists`] first: the result is only meaningful for a
    /// live key.
    ///
    /// # Returns
    /// - `Some(0)` if the record never expires
    /// - `Some(remaining)` if the record has a TTL and is live
    /// - `None` if the key is absent, expired (and now deleted) or corrupt
    pub fn ttl(&self, key: &str) -> Option<i64> {
        let path = self.path_for(key)?;
        self.live_record(&path).map(|record| record.ttl_remaining())
    }

    // == Keys ==
    /// Lists the identifiers of all record files, extension stripped.
    ///
    /// With a secret configured these are the hashed names, not the original
    /// keys. Call again to restart the listing.
    pub fn keys(&self) -> Keys {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "Failed to list cache directory");
                None
            }
        };
        Keys { entries }
    }

    // == Remove Expired ==
    /// Deletes every expired record. Failures are skipped.
    pub fn remove_expired_keys(&self) {
        let mut removed = 0usize;
        for name in self.keys() {
            let path = self.record_path(&name);
            if let Some(record) = read_record(&path) {
                if record.is_expired() && remove_record(&path) {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!(removed, path = %self.root.display(), "Removed expired cache records");
        }
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, RECORD_EXTENSION))
    }

    /// Reads the record at `path`, deleting it if it has expired.
    fn live_record(&self, path: &Path) -> Option<CacheRecord> {
        let record = read_record(path)?;
        if record.is_expired() {
            debug!(path = %path.display(), "Cache record expired");
            remove_record(path);
            return None;
        }
        Some(record)
    }

    fn write_record(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".mini_cache-")
            .suffix(".tmp")
            .tempfile_in(&self.root)?;
        tmp.write_all(bytes)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
        }

        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn is_connected(&self) -> bool {
        fs::metadata(&self.root)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false)
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key)
            .and_then(|path| self.live_record(&path))
            .is_some()
    }

    fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        let Some(path) = self.path_for(key) else {
            return false;
        };

        let bytes = match codec::encode(value, ttl_seconds) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache record");
                return false;
            }
        };

        match self.write_record(&path, &bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "Failed to write cache record");
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key)?;
        self.live_record(&path).map(|record| record.payload)
    }

    fn delete(&self, key: &str) -> bool {
        self.path_for(key)
            .map(|path| remove_record(&path))
            .unwrap_or(false)
    }

    fn flush(&self) -> bool {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "Failed to list cache directory");
                return false;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Failed to read cache directory entry");
                    return false;
                }
            };

            let file_name = entry.file_name();
            let is_record = file_name.to_str().and_then(record_stem).is_some();
            let path = entry.path();
            if !is_record || !path.is_file() {
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => {}
                // Removed by someone else in the meantime
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to flush cache record");
                    return false;
                }
            }
        }

        true
    }

    fn remove_expired_keys(&self) {
        FileStorage::remove_expired_keys(self)
    }
}

// == Keys Iterator ==
/// Lazy listing of record identifiers, see [`FileStorage::keys`].
#[derive(Debug)]
pub struct Keys {
    entries: Option<ReadDir>,
}

impl Iterator for Keys {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let entries = self.entries.as_mut()?;

        for entry in entries.by_ref() {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            if name == "." || name == ".." {
                continue;
            }

            if let Some(stem) = record_stem(name) {
                return Some(stem.to_string());
            }
        }

        self.entries = None;
        None
    }
}

/// Strips the record suffix from a file name.
///
/// `.cache` alone is a record too: it is what the empty key maps to.
fn record_stem(name: &str) -> Option<&str> {
    name.strip_suffix(RECORD_EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
}

/// Reads and decodes a record; missing and corrupt files are both `None`.
fn read_record(path: &Path) -> Option<CacheRecord> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read cache record");
            return None;
        }
    };

    match codec::decode(&bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Ignoring unreadable cache record");
            None
        }
    }
}

/// Removes a record file, reporting whether it was actually removed.
fn remove_record(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to delete cache record");
            false
        }
    }
}
