//! Store traits: the abstract interface for audit chain persistence.
//!
//! These traits keep the audit log storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use wcaf_core::{Attestation, Event};

use crate::error::Result;

/// Result of appending an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResult {
    /// Event was persisted as the new chain head.
    Appended,
    /// The chain head is no longer the event's `prev_hash`; nothing was written.
    HeadMoved {
        /// The document's current head (`GENESIS` for an empty chain).
        current: String,
    },
}

/// Summary of a document's chain tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub head_event_hash: String,
    pub head_ts: String,
    pub head_event_id: String,
    pub event_count: u64,
}

/// The AuditStore trait: async interface for event persistence.
///
/// # Design Notes
///
/// - **Compare-and-append**: `append` persists an event only if its
///   `prev_hash` still names the document's head, as one atomic step. Two
///   writers racing on the same head cannot both succeed.
/// - **Insertion order**: `events_for_document` returns events in the order
///   they were appended, oldest first.
/// - **No verification**: the store keeps whatever it is given. Integrity is
///   checked by replaying the chain, not by trusting the backend.
#[async_trait]
pub trait AuditStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Event Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Hash of the newest event of a document, if any.
    async fn last_hash(&self, document_id: &str) -> Result<Option<String>>;

    /// Append an event if its `prev_hash` matches the current head.
    ///
    /// # Returns
    /// - `Appended` if the event became the new head.
    /// - `HeadMoved` if another event got there first.
    async fn append(&self, event: &Event) -> Result<AppendResult>;

    /// All events of a document, oldest first.
    async fn events_for_document(&self, document_id: &str) -> Result<Vec<Event>>;

    /// Tip of a document's chain, if it has any events.
    async fn chain_head(&self, document_id: &str) -> Result<Option<ChainHead>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Capabilities
    // ─────────────────────────────────────────────────────────────────────────

    /// Attestation persistence, when the backend supports it.
    fn attestations(&self) -> Option<&dyn AttestationStore> {
        None
    }
}

/// Optional persistence for attestations.
#[async_trait]
pub trait AttestationStore: Send + Sync {
    /// Record an attestation.
    async fn save_attestation(&self, attestation: &Attestation) -> Result<()>;

    /// Most recently saved attestation for a document.
    async fn latest_attestation(&self, document_id: &str) -> Result<Option<Attestation>>;

    /// Every saved attestation for a document, oldest first.
    async fn attestations_for_document(&self, document_id: &str) -> Result<Vec<Attestation>>;
}
