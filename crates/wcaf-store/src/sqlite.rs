//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend for WCAF. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::{Map, Value};

use wcaf_core::{Actor, Attestation, Event, EventType, GENESIS};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AppendResult, AttestationStore, AuditStore, ChainHead};

const EVENT_COLUMNS: &str =
    "event_id, ts, document_id, type, actor, payload, prev_hash, event_hash, schema_version, extra";

const ATTESTATION_COLUMNS: &str =
    "document_id, head_event_hash, attested_at, signature_alg, signature, key_id, schema_version";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Poisoned(format!("connection mutex poisoned: {}", e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, text: &str) -> rusqlite::Result<T> {
    serde_json::from_str(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Helper to convert a row to Event
fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let event_type: String = row.get(3)?;
    let actor: String = row.get(4)?;
    let payload: String = row.get(5)?;
    let extra: String = row.get(9)?;

    Ok(Event {
        event_id: row.get(0)?,
        ts: row.get(1)?,
        document_id: row.get(2)?,
        event_type: EventType::parse(&event_type),
        actor: parse_json::<Actor>(4, &actor)?,
        payload: parse_json::<Value>(5, &payload)?,
        prev_hash: row.get(6)?,
        event_hash: row.get(7)?,
        schema_version: row.get(8)?,
        extra: parse_json::<Map<String, Value>>(9, &extra)?,
    })
}

// Helper to convert a row to Attestation
fn row_to_attestation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attestation> {
    Ok(Attestation {
        document_id: row.get(0)?,
        head_event_hash: row.get(1)?,
        attested_at: row.get(2)?,
        signature_alg: row.get(3)?,
        signature: row.get(4)?,
        key_id: row.get(5)?,
        schema_version: row.get(6)?,
    })
}

/// `payload.policy_version` of policy decisions, kept in its own column.
fn policy_version(event: &Event) -> Option<String> {
    if event.event_type != EventType::PolicyDecision {
        return None;
    }
    event
        .payload
        .get("policy_version")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn head_hash(conn: &Connection, document_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT event_hash FROM wcaf_events WHERE document_id = ?1 ORDER BY id DESC LIMIT 1",
        params![document_id],
        |row| row.get(0),
    )
    .optional()
}

#[async_trait]
impl AuditStore for SqliteStore {
    async fn last_hash(&self, document_id: &str) -> Result<Option<String>> {
        let document_id = document_id.to_string();
        self.blocking(move |conn| Ok(head_hash(conn, &document_id)?))
            .await
    }

    async fn append(&self, event: &Event) -> Result<AppendResult> {
        let event = event.clone();
        let actor = serde_json::to_string(&event.actor)?;
        let payload = serde_json::to_string(&event.payload)?;
        let extra = serde_json::to_string(&event.extra)?;

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current = head_hash(&tx, &event.document_id)?.unwrap_or_else(|| GENESIS.to_string());
            if event.prev_hash != current {
                return Ok(AppendResult::HeadMoved { current });
            }

            tx.execute(
                "INSERT INTO wcaf_events (
                    event_id, ts, document_id, type, actor, payload, prev_hash,
                    event_hash, schema_version, extra, actor_system, actor_instance,
                    policy_version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    event.event_id,
                    event.ts,
                    event.document_id,
                    event.event_type.as_str(),
                    actor,
                    payload,
                    event.prev_hash,
                    event.event_hash,
                    event.schema_version,
                    extra,
                    event.actor.system,
                    event.actor.instance_id,
                    policy_version(&event),
                ],
            )?;

            tx.commit()?;
            Ok(AppendResult::Appended)
        })
        .await
    }

    async fn events_for_document(&self, document_id: &str) -> Result<Vec<Event>> {
        let document_id = document_id.to_string();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM wcaf_events WHERE document_id = ?1 ORDER BY id ASC",
                EVENT_COLUMNS
            ))?;

            let events = stmt
                .query_map(params![document_id], row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(events)
        })
        .await
    }

    async fn chain_head(&self, document_id: &str) -> Result<Option<ChainHead>> {
        let document_id = document_id.to_string();
        self.blocking(move |conn| {
            let head = conn
                .query_row(
                    "SELECT event_hash, ts, event_id,
                            (SELECT COUNT(*) FROM wcaf_events WHERE document_id = ?1)
                     FROM wcaf_events WHERE document_id = ?1
                     ORDER BY id DESC LIMIT 1",
                    params![document_id],
                    |row| {
                        Ok(ChainHead {
                            head_event_hash: row.get(0)?,
                            head_ts: row.get(1)?,
                            head_event_id: row.get(2)?,
                            event_count: row.get::<_, i64>(3)? as u64,
                        })
                    },
                )
                .optional()?;

            Ok(head)
        })
        .await
    }

    fn attestations(&self) -> Option<&dyn AttestationStore> {
        Some(self)
    }
}

#[async_trait]
impl AttestationStore for SqliteStore {
    async fn save_attestation(&self, attestation: &Attestation) -> Result<()> {
        let att = attestation.clone();
        self.blocking(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO wcaf_attestations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    ATTESTATION_COLUMNS
                ),
                params![
                    att.document_id,
                    att.head_event_hash,
                    att.attested_at,
                    att.signature_alg,
                    att.signature,
                    att.key_id,
                    att.schema_version,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_attestation(&self, document_id: &str) -> Result<Option<Attestation>> {
        let document_id = document_id.to_string();
        self.blocking(move |conn| {
            let att = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM wcaf_attestations WHERE document_id = ?1
                         ORDER BY id DESC LIMIT 1",
                        ATTESTATION_COLUMNS
                    ),
                    params![document_id],
                    row_to_attestation,
                )
                .optional()?;
            Ok(att)
        })
        .await
    }

    async fn attestations_for_document(&self, document_id: &str) -> Result<Vec<Attestation>> {
        let document_id = document_id.to_string();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM wcaf_attestations WHERE document_id = ?1 ORDER BY id ASC",
                ATTESTATION_COLUMNS
            ))?;

            let list = stmt
                .query_map(params![document_id], row_to_attestation)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(list)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wcaf_core::{verify_chain, EventBuilder};

    fn event(document_id: &str, prev: &str, payload: Value) -> Event {
        EventBuilder::new(document_id, EventType::PolicyDecision)
            .actor(Actor::new("policy-engine").with_instance("pe-1"))
            .payload(payload)
            .prev_hash(prev)
            .seal()
    }

    fn attestation(head: &str) -> Attestation {
        Attestation {
            document_id: "doc".into(),
            head_event_hash: head.into(),
            attested_at: "2026-01-01T00:00:00.000Z".into(),
            signature_alg: "RSA-SHA256".into(),
            signature: "c2ln".into(),
            key_id: "k1".into(),
            schema_version: "wcaf-attestation-1.0".into(),
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = SqliteStore::open_memory().unwrap();

        let e1 = event("doc", GENESIS, json!({"decision": "ALLOW", "amount": 10.25}));
        let e2 = event("doc", &e1.event_hash, json!({"decision": "HOLD", "codes": [1, 2]}));
        assert_eq!(store.append(&e1).await.unwrap(), AppendResult::Appended);
        assert_eq!(store.append(&e2).await.unwrap(), AppendResult::Appended);

        let events = store.events_for_document("doc").await.unwrap();
        assert_eq!(events, vec![e1, e2.clone()]);
        assert!(verify_chain(&events).ok);
        assert_eq!(store.last_hash("doc").await.unwrap(), Some(e2.event_hash));
    }

    #[tokio::test]
    async fn test_head_moved_detection() {
        let store = SqliteStore::open_memory().unwrap();
        let e1 = event("doc", GENESIS, json!({}));
        store.append(&e1).await.unwrap();

        let stale = event("doc", GENESIS, json!({"late": true}));
        assert_eq!(
            store.append(&stale).await.unwrap(),
            AppendResult::HeadMoved {
                current: e1.event_hash.clone()
            }
        );
        assert_eq!(store.events_for_document("doc").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_actor_extras_preserved() {
        let store = SqliteStore::open_memory().unwrap();
        let e = EventBuilder::new("doc", "CUSTOM_KIND")
            .actor(Actor::new("bank-core").with_field("ip", json!("10.0.0.7")))
            .seal();
        store.append(&e).await.unwrap();

        let back = store.events_for_document("doc").await.unwrap();
        assert_eq!(back[0].actor, e.actor);
        assert_eq!(back[0].event_type, EventType::Other("CUSTOM_KIND".into()));
        assert!(back[0].has_valid_hash());
    }

    #[tokio::test]
    async fn test_event_extras_and_null_instance_preserved() {
        let store = SqliteStore::open_memory().unwrap();
        let received: Event = serde_json::from_value(json!({
            "event_id": "e-1",
            "ts": "2026-01-01T00:00:00.000Z",
            "document_id": "doc",
            "type": "NOTE",
            "actor": {"system": "partner", "instance_id": null},
            "payload": {},
            "prev_hash": GENESIS,
            "event_hash": "",
            "schema_version": "wcaf-1.0",
            "channel": "sftp"
        }))
        .unwrap();
        let mut e = received;
        e.event_hash = e.compute_hash();
        store.append(&e).await.unwrap();

        let back = store.events_for_document("doc").await.unwrap();
        assert_eq!(back, vec![e]);
        assert_eq!(back[0].extra.get("channel"), Some(&json!("sftp")));
        assert_eq!(back[0].actor.extra.get("instance_id"), Some(&Value::Null));
        assert!(back[0].has_valid_hash());
    }

    #[tokio::test]
    async fn test_policy_version_column() {
        let store = SqliteStore::open_memory().unwrap();
        let e = event("doc", GENESIS, json!({"decision": "ALLOW", "policy_version": "bank-v1"}));
        store.append(&e).await.unwrap();

        let conn = store.conn.clone();
        let stored: Option<String> = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row("SELECT policy_version FROM wcaf_events", [], |row| row.get(0))
                .unwrap()
        })
        .await
        .unwrap();
        assert_eq!(stored.as_deref(), Some("bank-v1"));
    }

    #[tokio::test]
    async fn test_chain_head() {
        let store = SqliteStore::open_memory().unwrap();
        assert_eq!(store.chain_head("doc").await.unwrap(), None);

        let e1 = event("doc", GENESIS, json!({}));
        let e2 = event("doc", &e1.event_hash, json!({}));
        store.append(&e1).await.unwrap();
        store.append(&e2).await.unwrap();

        let head = store.chain_head("doc").await.unwrap().unwrap();
        assert_eq!(head.head_event_hash, e2.event_hash);
        assert_eq!(head.head_event_id, e2.event_id);
        assert_eq!(head.event_count, 2);
    }

    #[tokio::test]
    async fn test_attestations() {
        let store = SqliteStore::open_memory().unwrap();
        let attestations = store.attestations().unwrap();

        assert_eq!(attestations.latest_attestation("doc").await.unwrap(), None);
        attestations.save_attestation(&attestation("h1")).await.unwrap();
        attestations.save_attestation(&attestation("h2")).await.unwrap();

        let latest = attestations.latest_attestation("doc").await.unwrap().unwrap();
        assert_eq!(latest, attestation("h2"));
        assert_eq!(attestations.attestations_for_document("doc").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");

        let e1 = event("doc", GENESIS, json!({"n": 1}));
        {
            let store = SqliteStore::open(&path).unwrap();
            store.append(&e1).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let events = store.events_for_document("doc").await.unwrap();
        assert_eq!(events, vec![e1]);
    }
}
