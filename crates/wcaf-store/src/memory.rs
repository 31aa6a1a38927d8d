//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use wcaf_core::{Attestation, Event, GENESIS};

use crate::error::{Result, StoreError};
use crate::traits::{AppendResult, AttestationStore, AuditStore, ChainHead};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Events per document, in append order.
    events: HashMap<String, Vec<Event>>,

    /// Attestations per document, in save order.
    attestations: HashMap<String, Vec<Attestation>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of documents with at least one event.
    pub fn document_count(&self) -> Result<usize> {
        Ok(self.read()?.events.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn last_hash(&self, document_id: &str) -> Result<Option<String>> {
        let inner = self.read()?;
        Ok(inner
            .events
            .get(document_id)
            .and_then(|events| events.last())
            .map(|e| e.event_hash.clone()))
    }

    async fn append(&self, event: &Event) -> Result<AppendResult> {
        let mut inner = self.write()?;

        let current = inner
            .events
            .get(&event.document_id)
            .and_then(|events| events.last())
            .map(|e| e.event_hash.as_str())
            .unwrap_or(GENESIS);
        if event.prev_hash != current {
            return Ok(AppendResult::HeadMoved {
                current: current.to_string(),
            });
        }

        inner
            .events
            .entry(event.document_id.clone())
            .or_default()
            .push(event.clone());
        Ok(AppendResult::Appended)
    }

    async fn events_for_document(&self, document_id: &str) -> Result<Vec<Event>> {
        let inner = self.read()?;
        Ok(inner.events.get(document_id).cloned().unwrap_or_default())
    }

    async fn chain_head(&self, document_id: &str) -> Result<Option<ChainHead>> {
        let inner = self.read()?;
        Ok(inner.events.get(document_id).and_then(|events| {
            events.last().map(|head| ChainHead {
                head_event_hash: head.event_hash.clone(),
                head_ts: head.ts.clone(),
                head_event_id: head.event_id.clone(),
                event_count: events.len() as u64,
            })
        }))
    }

    fn attestations(&self) -> Option<&dyn AttestationStore> {
        Some(self)
    }
}

#[async_trait]
impl AttestationStore for MemoryStore {
    async fn save_attestation(&self, attestation: &Attestation) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .attestations
            .entry(attestation.document_id.clone())
            .or_default()
            .push(attestation.clone());
        Ok(())
    }

    async fn latest_attestation(&self, document_id: &str) -> Result<Option<Attestation>> {
        let inner = self.read()?;
        Ok(inner
            .attestations
            .get(document_id)
            .and_then(|list| list.last())
            .cloned())
    }

    async fn attestations_for_document(&self, document_id: &str) -> Result<Vec<Attestation>> {
        let inner = self.read()?;
        Ok(inner
            .attestations
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }
}
