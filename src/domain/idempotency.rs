//! Value types for the idempotency protocol: the request fingerprint that
//! pins a key to one request body, and the stored response replayed verbatim
//! on retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex SHA-256 over `method|path|body-json`. A retried request must carry
/// the same key *and* the same fingerprint to be treated as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    pub fn new(method: &str, path: &str, body: &serde_json::Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b"|");
        hasher.update(path.as_bytes());
        hasher.update(b"|");
        hasher.update(body.to_string().as_bytes());
        let digest = hasher.finalize();
        use std::fmt::Write;
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            // Writing to a String cannot fail.
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Response captured on first successful execution and replayed for every
/// later duplicate of the same `(key, fingerprint)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

/// Outcome of a lock acquisition attempt on the idempotency store.
#[derive(Debug, Clone, PartialEq)]
pub enum LockAttempt {
    /// Lock acquired; the caller must execute the wrapped operation.
    Acquired,
    /// The operation already completed between the replay lookup and the
    /// lock attempt; its stored response wins.
    Completed(StoredResponse),
    /// Actively locked by a concurrent in-flight attempt.
    Busy,
}

/// Persisted record for one `(key, fingerprint)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub request_hash: String,
    pub locked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub response: Option<StoredResponse>,
}
