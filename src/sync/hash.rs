//! Content hashing for exported records.
//!
//! SHA256 over the compact JSON form of a payload. Lets a consumer of an
//! export tell whether two dead letters carry the same record snapshot.

use sha2::{Digest, Sha256};

/// Hex SHA256 of the compact JSON serialization of `value`.
#[must_use]
pub fn content_hash(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
