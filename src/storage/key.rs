//! Key Mapper
//!
//! Turns a cache key into the file name of its record.

use sha2::{Digest, Sha256};

use super::RECORD_EXTENSION;

/// Maps `key` to a record file name.
///
/// Without a secret the key is used verbatim; with one, the name is the
/// hex SHA-256 of `key + secret`. Either way the record extension is
/// appended. Same inputs always give the same name.
pub fn map_key(key: &str, secret: Option<&str>) -> String {
    match secret.filter(|s| !s.is_empty()) {
        Some(secret) => {
            let mut hasher = Sha256::new();
            hasher.update(key.as_bytes());
            hasher.update(secret.as_bytes());
            format!("{:x}.{}", hasher.finalize(), RECORD_EXTENSION)
        }
        None => format!("{}.{}", key, RECORD_EXTENSION),
    }
}

/// Whether `name` can be joined onto a directory without leaving it.
pub(crate) fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
