//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at)
                 VALUES (?1, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
                rusqlite::params![version],
            )?;
        }

        tx.commit()?;
        tracing::debug!("Migrated audit store schema from v{} to v{}", current, CURRENT_VERSION);
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Events: one row per chain link, rowid order is append order
        CREATE TABLE wcaf_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            event_id TEXT NOT NULL UNIQUE,
            ts TEXT NOT NULL,                 -- ISO-8601 UTC, milliseconds
            type TEXT NOT NULL,
            actor TEXT NOT NULL,              -- JSON object, exactly as hashed
            payload TEXT NOT NULL,            -- JSON value, exactly as hashed
            prev_hash TEXT NOT NULL,          -- previous event_hash or 'GENESIS'
            event_hash TEXT NOT NULL,         -- lowercase hex SHA-256
            schema_version TEXT NOT NULL,
            extra TEXT NOT NULL DEFAULT '{}', -- JSON object of non-standard fields, hashed
            actor_system TEXT NOT NULL,       -- denormalized for queries
            actor_instance TEXT,
            policy_version TEXT,              -- payload.policy_version of POLICY_DECISION events

            UNIQUE(document_id, prev_hash)
        );

        -- Attestations: signed statements about chain heads
        CREATE TABLE wcaf_attestations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            head_event_hash TEXT NOT NULL,
            attested_at TEXT NOT NULL,
            signature_alg TEXT NOT NULL,
            signature TEXT NOT NULL,          -- base64
            key_id TEXT NOT NULL,
            schema_version TEXT NOT NULL
        );

        -- Indexes for common queries
        CREATE INDEX idx_events_document ON wcaf_events(document_id, id);
        CREATE INDEX idx_events_type ON wcaf_events(type);
        CREATE INDEX idx_events_hash ON wcaf_events(event_hash);
        CREATE INDEX idx_attestations_document ON wcaf_attestations(document_id, id);
        "#,
    )?;

    Ok(())
}
