//! Institutional attestations over a chain head.
//!
//! An attestation says "as of `attested_at`, the chain of `document_id`
//! ends at `head_event_hash`", signed with an institution's key. It sits
//! beside the chain, never inside it.
//!
//! The signed message is the lowercase hex SHA-256 of the canonical
//! statement `{attested_at, document_id, head_event_hash, schema_version}`,
//! taken as UTF-8 bytes (the hex string itself, not the raw digest).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::crypto::{
    decode_signature, encode_signature, PrivateKey, PublicKey, SignatureAlgorithm,
};
use crate::error::{CoreError, Result};
use crate::event::iso8601_millis;
use crate::hash::hash_value;

/// Schema tag of attestation statements.
pub const ATTESTATION_SCHEMA_VERSION: &str = "wcaf-attestation-1.0";

/// A signed statement about a document's chain head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub document_id: String,
    pub head_event_hash: String,
    pub attested_at: String,
    /// `RSA-SHA256` or `Ed25519`.
    pub signature_alg: String,
    /// Base64 signature over the statement hash.
    pub signature: String,
    pub key_id: String,
    pub schema_version: String,
}

impl Attestation {
    /// Hash of the signed statement, rebuilt from this attestation's fields.
    pub fn statement_hash(&self) -> String {
        statement_hash(
            &self.document_id,
            &self.head_event_hash,
            &self.attested_at,
            &self.schema_version,
        )
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::from_name(&self.signature_alg)
    }
}

fn statement_hash(
    document_id: &str,
    head_event_hash: &str,
    attested_at: &str,
    schema_version: &str,
) -> String {
    hash_value(&json!({
        "document_id": document_id,
        "head_event_hash": head_event_hash,
        "attested_at": attested_at,
        "schema_version": schema_version,
    }))
}

/// Attest to `head_event_hash` as the current head of `document_id`.
pub fn attest(
    document_id: &str,
    head_event_hash: &str,
    key_id: &str,
    private_key: &PrivateKey,
    algorithm: SignatureAlgorithm,
) -> Result<Attestation> {
    attest_at(
        document_id,
        head_event_hash,
        key_id,
        private_key,
        algorithm,
        Utc::now(),
    )
}

/// Like [`attest`], with an explicit attestation time.
pub fn attest_at(
    document_id: &str,
    head_event_hash: &str,
    key_id: &str,
    private_key: &PrivateKey,
    algorithm: SignatureAlgorithm,
    at: DateTime<Utc>,
) -> Result<Attestation> {
    if head_event_hash.is_empty() {
        return Err(CoreError::MissingHead(document_id.to_string()));
    }

    let attested_at = iso8601_millis(at);
    let hash = statement_hash(
        document_id,
        head_event_hash,
        &attested_at,
        ATTESTATION_SCHEMA_VERSION,
    );
    let signature = private_key.sign_with(algorithm, hash.as_bytes())?;

    Ok(Attestation {
        document_id: document_id.to_string(),
        head_event_hash: head_event_hash.to_string(),
        attested_at,
        signature_alg: algorithm.as_str().to_string(),
        signature: encode_signature(&signature),
        key_id: key_id.to_string(),
        schema_version: ATTESTATION_SCHEMA_VERSION.to_string(),
    })
}

/// Check an attestation's signature against `public_key`.
///
/// Never errors: a bad signature, a malformed one or a key of the wrong
/// type all return `false`.
pub fn verify_attestation(attestation: &Attestation, public_key: &PublicKey) -> bool {
    let Some(signature) = decode_signature(&attestation.signature) else {
        return false;
    };
    public_key.verify(
        attestation.algorithm(),
        attestation.statement_hash().as_bytes(),
        &signature,
    )
}
