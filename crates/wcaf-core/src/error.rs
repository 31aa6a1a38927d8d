//! Error types for WCAF core.
//!
//! Only caller mistakes surface here. Integrity findings (broken links,
//! altered content, tampered bundles) are reported as
//! [`Problem`](crate::chain::Problem) values, never as errors.

use thiserror::Error;

/// Errors from core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("timeline is empty")]
    EmptyTimeline,

    #[error("no chain head to attest for document {0}")]
    MissingHead(String),

    #[error("key does not match signature algorithm {0}")]
    KeyAlgorithmMismatch(&'static str),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
