//! Portable audit bundles.
//!
//! A bundle carries a document's full timeline, the chain check computed at
//! packaging time, an optional attestation and an optional signature over
//! everything else. Whoever receives one can re-verify it with nothing but
//! the bundle and (for the signature) the institution's public key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attestation::{verify_attestation, Attestation};
use crate::chain::{verify_chain, verify_chain_values, Problem};
use crate::crypto::{decode_signature, encode_signature, Institution, PublicKey, SignatureAlgorithm};
use crate::error::{CoreError, Result};
use crate::event::{iso8601_millis, Event};
use crate::hash::hash_value;

/// Version tag of the bundle format.
pub const BUNDLE_VERSION: &str = "wcaf-bundle-1.0";

const SIGNATURE_KEY: &str = "bundle_signature";

/// Chain check recorded at packaging time.
///
/// `problems` is left out when the chain was sound. A received `[]` stays
/// `Some(vec![])` so the bundle re-serializes as it was signed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problems: Option<Vec<Problem>>,
    pub head_event_hash: String,
    pub event_count: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attestation as embedded in a bundle (the document id lives on the bundle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedAttestation {
    pub attested_at: String,
    pub head_event_hash: String,
    pub signature_alg: String,
    pub signature: String,
    pub key_id: String,
    pub schema_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmbeddedAttestation {
    /// Rebuild the full attestation for a document.
    pub fn to_attestation(&self, document_id: &str) -> Attestation {
        Attestation {
            document_id: document_id.to_string(),
            head_event_hash: self.head_event_hash.clone(),
            attested_at: self.attested_at.clone(),
            signature_alg: self.signature_alg.clone(),
            signature: self.signature.clone(),
            key_id: self.key_id.clone(),
            schema_version: self.schema_version.clone(),
        }
    }
}

impl From<&Attestation> for EmbeddedAttestation {
    fn from(att: &Attestation) -> Self {
        Self {
            attested_at: att.attested_at.clone(),
            head_event_hash: att.head_event_hash.clone(),
            signature_alg: att.signature_alg.clone(),
            signature: att.signature.clone(),
            key_id: att.key_id.clone(),
            schema_version: att.schema_version.clone(),
            extra: Map::new(),
        }
    }
}

/// Signature over the canonical bundle minus this field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSignature {
    pub alg: String,
    pub key_id: String,
    /// Base64 signature over `signed_hash` (as UTF-8 hex).
    pub signature: String,
    pub signed_hash: String,
}

/// A self-contained audit export.
///
/// Fields missing from an imported document fall back to empty values so
/// that a damaged bundle still verifies to a negative report instead of
/// failing to load. Unknown keys are kept in `extra` and stay covered by the
/// bundle signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub bundle_version: String,
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub timeline: Vec<Event>,
    #[serde(default)]
    pub chain_verification: ChainVerification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<EmbeddedAttestation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_signature: Option<BundleSignature>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bundle {
    /// Canonical hash of every field except `bundle_signature`.
    pub fn signing_hash(&self) -> Result<String> {
        let value = serde_json::to_value(self).map_err(|e| CoreError::Encoding(e.to_string()))?;
        Ok(signing_hash_of(&value))
    }

    /// Head hash of the bundled timeline, if any.
    pub fn head_event_hash(&self) -> Option<&str> {
        self.timeline.last().map(|e| e.event_hash.as_str())
    }
}

/// Package a timeline into a bundle.
///
/// With a signer, the finished bundle is hashed and signed; the signature is
/// attached last and is not part of what it signs.
pub fn create_bundle(
    timeline: &[Event],
    attestation: Option<&Attestation>,
    signer: Option<&Institution>,
) -> Result<Bundle> {
    create_bundle_at(timeline, attestation, signer, Utc::now())
}

/// Like [`create_bundle`], with an explicit creation time.
pub fn create_bundle_at(
    timeline: &[Event],
    attestation: Option<&Attestation>,
    signer: Option<&Institution>,
    at: DateTime<Utc>,
) -> Result<Bundle> {
    let (first, last) = match (timeline.first(), timeline.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(CoreError::EmptyTimeline),
    };

    let check = verify_chain(timeline);

    let mut bundle = Bundle {
        bundle_version: BUNDLE_VERSION.to_string(),
        document_id: first.document_id.clone(),
        created_at: iso8601_millis(at),
        timeline: timeline.to_vec(),
        chain_verification: ChainVerification {
            verified: check.ok,
            problems: (!check.problems.is_empty()).then_some(check.problems),
            head_event_hash: last.event_hash.clone(),
            event_count: timeline.len(),
            extra: Map::new(),
        },
        attestation: attestation.map(EmbeddedAttestation::from),
        bundle_signature: None,
        extra: Map::new(),
    };

    if let Some(signer) = signer {
        let signed_hash = bundle.signing_hash()?;
        let signature = signer.private_key.sign(signed_hash.as_bytes())?;
        bundle.bundle_signature = Some(BundleSignature {
            alg: signer.algorithm().as_str().to_string(),
            key_id: signer.key_id.clone(),
            signature: encode_signature(&signature),
            signed_hash,
        });
    }

    Ok(bundle)
}

/// Outcome of re-verifying a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleVerification {
    pub bundle_version_ok: bool,
    pub chain_verified: bool,
    /// `None` when the bundle is unsigned or no key was supplied.
    pub bundle_signature_verified: Option<bool>,
    pub attestation_present: bool,
    /// Embedded attestation checked against the same key; informational.
    pub attestation_verified: Option<bool>,
    pub problems: Vec<Problem>,
    pub ok: bool,
}

/// Re-verify a bundle from its own contents.
///
/// The bundle is checked in its serialized form, see [`verify_bundle_value`].
pub fn verify_bundle(bundle: &Bundle, public_key: Option<&PublicKey>) -> BundleVerification {
    let document = serde_json::to_value(bundle).unwrap_or(Value::Null);
    verify_bundle_value(&document, public_key)
}

/// Parse and verify a bundle document without going through [`Bundle`].
pub fn verify_bundle_json(
    json: &str,
    public_key: Option<&PublicKey>,
) -> Result<BundleVerification> {
    let document: Value =
        serde_json::from_str(json).map_err(|e| CoreError::Decoding(e.to_string()))?;
    Ok(verify_bundle_value(&document, public_key))
}

/// Re-verify a bundle document exactly as received.
///
/// The recorded `chain_verification` is ignored; the timeline is replayed
/// over the events as they appear in the document, and the signature is
/// checked against the hash of every key except `bundle_signature`. `ok`
/// requires a known version, a sound non-empty chain, and no failed
/// signature check. An unchecked signature does not count against it.
pub fn verify_bundle_value(
    document: &Value,
    public_key: Option<&PublicKey>,
) -> BundleVerification {
    let mut problems = Vec::new();

    let bundle_version_ok =
        document.get("bundle_version").and_then(Value::as_str) == Some(BUNDLE_VERSION);

    let chain_verified = match document.get("timeline").and_then(Value::as_array) {
        Some(timeline) if !timeline.is_empty() => {
            let check = verify_chain_values(timeline);
            problems.extend(check.problems);
            check.ok
        }
        _ => false,
    };

    let signature = present(document, SIGNATURE_KEY);
    let bundle_signature_verified = match (signature, public_key) {
        (Some(sig), Some(key)) => Some(check_bundle_signature(document, sig, key, &mut problems)),
        _ => None,
    };

    let attestation = present(document, "attestation");
    let attestation_verified = match (attestation, public_key) {
        (Some(att), Some(key)) => {
            let document_id = document
                .get("document_id")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(
                serde_json::from_value::<EmbeddedAttestation>(att.clone())
                    .map(|att| verify_attestation(&att.to_attestation(document_id), key))
                    .unwrap_or(false),
            )
        }
        _ => None,
    };

    let ok = bundle_version_ok && chain_verified && bundle_signature_verified != Some(false);

    BundleVerification {
        bundle_version_ok,
        chain_verified,
        bundle_signature_verified,
        attestation_present: attestation.is_some(),
        attestation_verified,
        problems,
        ok,
    }
}

/// A member that is present and not `null`.
fn present<'a>(document: &'a Value, key: &str) -> Option<&'a Value> {
    document.get(key).filter(|v| !v.is_null())
}

fn signing_hash_of(document: &Value) -> String {
    let mut unsigned = document.clone();
    if let Value::Object(map) = &mut unsigned {
        map.remove(SIGNATURE_KEY);
    }
    hash_value(&unsigned)
}

fn check_bundle_signature(
    document: &Value,
    sig: &Value,
    key: &PublicKey,
    problems: &mut Vec<Problem>,
) -> bool {
    let sig: BundleSignature = match serde_json::from_value(sig.clone()) {
        Ok(sig) => sig,
        Err(e) => {
            problems.push(Problem::SignatureError {
                message: format!("malformed bundle_signature: {}", e),
            });
            return false;
        }
    };

    let hash = signing_hash_of(document);
    if hash != sig.signed_hash {
        problems.push(Problem::BundleHashMismatch);
        return false;
    }

    let Some(signature) = decode_signature(&sig.signature) else {
        problems.push(Problem::SignatureError {
            message: "signature is not valid base64".to_string(),
        });
        return false;
    };

    key.verify(
        SignatureAlgorithm::from_name(&sig.alg),
        hash.as_bytes(),
        &signature,
    )
}

/// Pretty-printed JSON for handing a bundle to an auditor.
pub fn export_bundle_json(bundle: &Bundle) -> Result<String> {
    serde_json::to_string_pretty(bundle).map_err(|e| CoreError::Encoding(e.to_string()))
}

/// Parse a bundle from JSON. Does not verify it.
pub fn import_bundle_json(json: &str) -> Result<Bundle> {
    serde_json::from_str(json).map_err(|e| CoreError::Decoding(e.to_string()))
}
