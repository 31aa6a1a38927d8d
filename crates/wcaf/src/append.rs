//! Hash-chain appender.

use wcaf_core::{Event, EventBuilder, GENESIS};
use wcaf_store::{AppendResult, AuditStore};

use crate::error::{AuditError, Result};

/// Link a new event to the document's head, seal it and persist it.
///
/// Reads the head once, then issues exactly one compare-and-append. If
/// another writer moved the head in between, nothing is written and
/// [`AuditError::Conflict`] is returned; the caller decides whether to retry.
pub async fn append_event<S>(store: &S, builder: EventBuilder) -> Result<Event>
where
    S: AuditStore + ?Sized,
{
    let document_id = builder.document_id().to_string();
    let prev_hash = store
        .last_hash(&document_id)
        .await?
        .unwrap_or_else(|| GENESIS.to_string());

    let event = builder.prev_hash(prev_hash).seal();

    match store.append(&event).await? {
        AppendResult::Appended => {
            tracing::debug!(
                "Appended {} to {} ({})",
                event.event_type,
                document_id,
                event.event_hash.get(..16).unwrap_or(&event.event_hash)
            );
            Ok(event)
        }
        AppendResult::HeadMoved { current } => {
            tracing::warn!(
                "Append to {} lost race: expected head {}, found {}",
                document_id,
                event.prev_hash,
                current
            );
            Err(AuditError::Conflict {
                document_id,
                expected_prev: event.prev_hash,
                current,
            })
        }
    }
}
