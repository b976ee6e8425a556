//! Record Codec
//!
//! Wraps a cached value and its write time / TTL into the JSON envelope
//! stored in each record file:
//!
//! ```text
//! {"time": 1700000000, "expire": 60, "data": "{\"user\":\"ada\"}"}
//! ```
//!
//! `data` holds the value's own JSON text, so the envelope can be read
//! without decoding the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Result};

/// On-disk shape of a record.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    time: i64,
    expire: u64,
    data: String,
}

// == Cache Record ==
/// A decoded record: the value plus the metadata needed for expiration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    /// Write timestamp (Unix seconds)
    pub write_time: i64,
    /// Lifetime in seconds, 0 = never expires
    pub ttl_seconds: u64,
    /// The cached value
    pub payload: Value,
}

impl CacheRecord {
    // == Constructor ==
    /// Creates a record stamped with the current time.
    pub fn new(payload: Value, ttl_seconds: u64) -> Self {
        Self {
            write_time: current_timestamp(),
            ttl_seconds,
            payload,
        }
    }

    // == Is Expired ==
    /// Checks whether the record has outlived its TTL at time `now`.
    ///
    /// A record expires once it has lived strictly longer than its TTL:
    /// at `now - write_time == ttl_seconds` it is still live.
    pub fn is_expired_at(&self, now: i64) -> bool {
        if self.ttl_seconds == 0 {
            return false;
        }
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        now.saturating_sub(self.write_time) > ttl
    }

    /// Checks whether the record has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp())
    }

    // == Time To Live ==
    /// Returns the seconds left before expiration at time `now`.
    ///
    /// # Returns
    /// - `0` for records that never expire
    /// - `write_time + ttl_seconds - now`, clamped at 0, otherwise
    pub fn ttl_remaining_at(&self, now: i64) -> i64 {
        if self.ttl_seconds == 0 {
            return 0;
        }
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        self.write_time
            .saturating_add(ttl)
            .saturating_sub(now)
            .max(0)
    }

    /// Returns the seconds left before expiration as of now.
    pub fn ttl_remaining(&self) -> i64 {
        self.ttl_remaining_at(current_timestamp())
    }

    /// Serializes the record into its envelope bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let envelope = Envelope {
            time: self.write_time,
            expire: self.ttl_seconds,
            data: serde_json::to_string(&self.payload)?,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }
}

// == Encode ==
/// Encodes `value` with a fresh write time and the given TTL.
pub fn encode(value: &Value, ttl_seconds: u64) -> Result<Vec<u8>> {
    CacheRecord::new(value.clone(), ttl_seconds).to_bytes()
}

// == Decode ==
/// Decodes envelope bytes back into a record.
///
/// Fails with [`CacheError::CorruptRecord`] if either the envelope or the
/// inner payload does not parse.
pub fn decode(bytes: &[u8]) -> Result<CacheRecord> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| CacheError::CorruptRecord(format!("envelope: {}", e)))?;
    let payload: Value = serde_json::from_str(&envelope.data)
        .map_err(|e| CacheError::CorruptRecord(format!("payload: {}", e)))?;

    Ok(CacheRecord {
        write_time: envelope.time,
        ttl_seconds: envelope.expire,
        payload,
    })
}

// == Utility Functions ==
/// Returns current Unix timestamp in seconds.
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_decode_nested_value() {
        let value = json!({"name": "ada", "tags": ["a", "b"], "score": 23.99, "ok": true, "none": null});
        let bytes = encode(&value, 30).unwrap();
        let record = decode(&bytes).unwrap();

        assert_eq!(record.payload, value);
        assert_eq!(record.ttl_seconds, 30);
        assert!((record.write_time - current_timestamp()).abs() <= 1);
    }

    #[test]
    fn test_floats_keep_every_bit() {
        for f in [1.0715660391465826e-75, 0.1 + 0.2, f64::MIN_POSITIVE, 5e-324, f64::MAX, -2.2250738585072014e-308] {
            let bytes = encode(&json!(f), 0).unwrap();
            let decoded = decode(&bytes).unwrap().payload.as_f64().unwrap();
            assert_eq!(decoded.to_bits(), f.to_bits(), "{:e} should round-trip", f);
        }
    }

    #[test]
    fn test_envelope_field_names() {
        let bytes = encode(&json!("hello"), 5).unwrap();
        let raw: Value = serde_json::from_slice(&bytes).unwrap();

        assert!(raw["time"].is_i64());
        assert_eq!(raw["expire"], 5);
        assert_eq!(raw["data"], "\"hello\"");
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        assert!(matches!(
            decode(b"not a record"),
            Err(CacheError::CorruptRecord(_))
        ));
    }

    #[test]
    fn test_decode_bad_payload_is_corrupt() {
        let bytes = br#"{"time": 1, "expire": 0, "data": "{unterminated"}"#;
        assert!(matches!(decode(bytes), Err(CacheError::CorruptRecord(_))));
    }

    #[test]
    fn test_decode_missing_field_is_corrupt() {
        let bytes = br#"{"time": 1, "data": "1"}"#;
        assert!(matches!(decode(bytes), Err(CacheError::CorruptRecord(_))));
    }

    #[test]
    fn test_never_expires_with_zero_ttl() {
        let record = CacheRecord {
            write_time: 0,
            ttl_seconds: 0,
            payload: Value::Null,
        };

        assert!(!record.is_expired_at(i64::MAX));
        assert_eq!(record.ttl_remaining_at(1_000_000), 0);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let record = CacheRecord {
            write_time: 1_000,
            ttl_seconds: 10,
            payload: json!(1),
        };

        // Exactly TTL seconds old is still live; one second more is expired
        assert!(!record.is_expired_at(1_010));
        assert!(record.is_expired_at(1_011));
    }

    #[test]
    fn test_ttl_remaining() {
        let record = CacheRecord {
            write_time: 1_000,
            ttl_seconds: 10,
            payload: json!(1),
        };

        assert_eq!(record.ttl_remaining_at(1_000), 10);
        assert_eq!(record.ttl_remaining_at(1_007), 3);
        assert_eq!(record.ttl_remaining_at(1_020), 0);
    }
}
