//! # WCAF
//!
//! Tamper-evident audit log for documents moving through verification,
//! policy and payment systems.
//!
//! ## Overview
//!
//! Every fact about a document is recorded as an event. Each event carries
//! the SHA-256 hash of its own canonical JSON and the hash of the event
//! before it, so the document's history forms a chain:
//!
//! - **Events**: Immutable. Never edited. Corrections are new events.
//! - **Verification**: Replaying a chain reports every broken link and every
//!   altered event, by index.
//! - **Attestations**: An institutional key signs the current chain head.
//! - **Bundles**: A timeline plus its verification and attestation, signed
//!   and portable, checkable offline with `wcaf-verify`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use wcaf::{Actor, AuditLog, AuditLogConfig, EventType, Institution, PrivateKey};
//! use wcaf::store::SqliteStore;
//!
//! async fn example() {
//!     let key = PrivateKey::generate(Default::default()).unwrap();
//!     let config = AuditLogConfig::default().with_institution(Institution::new("inst-1", key));
//!
//!     let log = AuditLog::new(SqliteStore::open("audit.db").unwrap(), config);
//!
//!     log.append(
//!         "INV-1",
//!         EventType::VerifyResult,
//!         json!({"verdict": "VALID"}),
//!         Actor::new("verifier"),
//!     )
//!     .await
//!     .unwrap();
//!
//!     let bundle = log.export_audit_bundle("INV-1").await.unwrap();
//!     assert!(log.verify_bundle(&bundle, None).ok);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `wcaf::core` - Canonical JSON, events, chain verification, signatures
//! - `wcaf::store` - Storage abstraction, SQLite and in-memory backends

pub mod append;
pub mod audit_log;
pub mod config;
pub mod error;
pub mod replay;

// Re-export component crates
pub use wcaf_core as core;
pub use wcaf_store as store;

pub use append::append_event;
pub use audit_log::AuditLog;
pub use config::AuditLogConfig;
pub use error::{AuditError, Result};
pub use replay::{replay, ReplayState};

// Re-export commonly used core types
pub use wcaf_core::{
    export_bundle_json, import_bundle_json, verify_bundle, verify_bundle_json, verify_bundle_value,
    verify_chain, Actor, Attestation, Bundle, BundleVerification, ChainCheck, Event, EventBuilder,
    EventType, Institution, PrivateKey, Problem, PublicKey, SignatureAlgorithm, GENESIS,
};
pub use wcaf_store::{AuditStore, MemoryStore, SqliteStore};
