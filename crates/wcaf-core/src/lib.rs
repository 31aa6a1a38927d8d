//! # WCAF Core
//!
//! Pure primitives for the WCAF chain audit format: canonical JSON, hash-chained
//! events, chain verification, attestations and bundles.
//!
//! This crate contains no I/O and no storage. Every hash and signature is
//! computed over the output of the [`canonical`] module.
//!
//! ## Key Types
//!
//! - [`Event`] - One immutable link in a document's hash chain
//! - [`EventBuilder`] - Seals new events (id, timestamp, hash)
//! - [`ChainCheck`] / [`Problem`] - Result of replaying a timeline
//! - [`Attestation`] - Institutional signature over a chain head
//! - [`Bundle`] - Portable, independently verifiable export
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use wcaf_core::{verify_chain, EventBuilder, EventType, GENESIS};
//!
//! let first = EventBuilder::new("INV-1", EventType::VerifyResult)
//!     .payload(json!({"verdict": "VALID"}))
//!     .seal();
//! let second = EventBuilder::new("INV-1", EventType::PolicyDecision)
//!     .payload(json!({"decision": "ALLOW"}))
//!     .prev_hash(first.event_hash.clone())
//!     .seal();
//!
//! assert_eq!(first.prev_hash, GENESIS);
//! assert!(verify_chain(&[first, second]).ok);
//! ```

pub mod attestation;
pub mod bundle;
pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod event;
pub mod hash;

pub use attestation::{attest, attest_at, verify_attestation, Attestation, ATTESTATION_SCHEMA_VERSION};
pub use bundle::{
    create_bundle, create_bundle_at, export_bundle_json, import_bundle_json, verify_bundle,
    verify_bundle_json, verify_bundle_value, Bundle, BundleSignature, BundleVerification,
    ChainVerification, EmbeddedAttestation, BUNDLE_VERSION,
};
pub use canonical::{canonical_json, to_canonical_string};
pub use chain::{verify_chain, verify_chain_values, ChainCheck, Problem};
pub use crypto::{Institution, PrivateKey, PublicKey, SignatureAlgorithm};
pub use error::{CoreError, Result};
pub use event::{
    iso8601_millis, Actor, Event, EventBuilder, EventType, DEFAULT_SCHEMA_VERSION, UNKNOWN_SYSTEM,
};
pub use hash::{hash_canonical, hash_value, sha256_hex, GENESIS};
