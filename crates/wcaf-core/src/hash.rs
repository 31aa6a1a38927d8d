//! SHA-256 hashing over canonical JSON.
//!
//! Hashes travel as lowercase hex strings: that is the form stored in
//! `prev_hash`/`event_hash`, signed by attestations, and compared during
//! verification.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::{canonical_json, to_canonical_string};
use crate::error::Result;

/// Sentinel `prev_hash` of the first event in a chain.
pub const GENESIS: &str = "GENESIS";

/// SHA-256 of the given bytes as lowercase hex.
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    hex::encode(hasher.finalize())
}

/// Hash of a JSON value's canonical form.
pub fn hash_value(value: &Value) -> String {
    sha256_hex(canonical_json(value))
}

/// Hash of any serializable value's canonical form.
pub fn hash_canonical<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(sha256_hex(to_canonical_string(value)?))
}
