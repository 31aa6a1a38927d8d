//! Error types for the audit log.

use thiserror::Error;
use wcaf_core::CoreError;
use wcaf_store::StoreError;

/// Errors that can occur during audit log operations.
///
/// Integrity findings are not errors; they come back as
/// [`Problem`](wcaf_core::Problem) lists from verification.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Core error (precondition, key or encoding failure).
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Another writer moved the chain head between read and append.
    #[error("conflict on document {document_id}: expected head {expected_prev}, found {current}")]
    Conflict {
        document_id: String,
        expected_prev: String,
        current: String,
    },

    /// Event type outside the known vocabulary while strict types are on.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// Document has no events.
    #[error("no events found for document {0}")]
    NoEvents(String),

    /// Operation needs an institutional key and none is configured.
    #[error("no institution key configured")]
    NoInstitution,

    /// Verification needs a public key and none was supplied or configured.
    #[error("no verification key available")]
    NoPublicKey,
}

/// Result type for audit log operations.
pub type Result<T> = std::result::Result<T, AuditError>;
