//! Small deterministic helpers for timestamps, ids, and content hashing.

pub mod timestamps;
mod uuid_utils;

pub use timestamps::{iso_timestamp, now_utc, parse_timestamp, Timestamp};
pub use uuid_utils::generate_uuid;

use sha2::{Digest, Sha256};

/// Hashes a JSON value to a stable hex digest.
///
/// Used to fingerprint stage inputs for idempotency checks and to build
/// content-addressed snapshot file names.
#[must_use]
pub fn content_hash(value: &serde_json::Value) -> String {
    let serialized = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_valid() {
        let id = generate_uuid();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_content_hash_stable() {
        let a = serde_json::json!({"x": 1, "y": 2});
        let b = serde_json::json!({"x": 1, "y": 2});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_content_hash_differs() {
        let a = serde_json::json!({"x": 1});
        let b = serde_json::json!({"x": 2});
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
