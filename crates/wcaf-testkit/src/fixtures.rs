//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::Path;
use std::sync::OnceLock;

use serde_json::json;
use wcaf::{AuditLog, AuditLogConfig};
use wcaf_core::{
    Actor, Event, EventBuilder, EventType, Institution, PrivateKey, PublicKey, GENESIS,
};
use wcaf_store::{AuditStore, MemoryStore, SqliteStore};

/// A test fixture: an institution and an audit log, over a memory store
/// unless built with [`TestFixture::sqlite`].
pub struct TestFixture<S: AuditStore = MemoryStore> {
    pub institution: Institution,
    pub log: AuditLog<S>,
}

impl TestFixture {
    /// Create a new test fixture with a random Ed25519 key.
    pub fn new() -> Self {
        let key = PrivateKey::generate(wcaf_core::SignatureAlgorithm::Ed25519)
            .expect("Ed25519 key generation");
        Self::with_institution(Institution::new("test-institution", key))
    }

    /// Create with a deterministic Ed25519 key from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_institution(Institution::new(
            format!("test-institution-{:02x}", seed[0]),
            PrivateKey::ed25519_from_seed(&seed),
        ))
    }

    /// Create with a shared RSA key.
    ///
    /// The key is 1024 bits and generated once per process; it is only fit
    /// for tests.
    pub fn rsa() -> Self {
        Self::with_institution(Institution::new("test-institution-rsa", rsa_test_key().clone()))
    }

    pub fn with_institution(institution: Institution) -> Self {
        Self::over(MemoryStore::new(), institution)
    }
}

impl TestFixture<SqliteStore> {
    /// Fixture backed by a SQLite file, with a deterministic Ed25519 key.
    pub fn sqlite(path: impl AsRef<Path>, seed: [u8; 32]) -> Self {
        let store = SqliteStore::open(path).expect("open SQLite store");
        Self::over(
            store,
            Institution::new("test-institution-sqlite", PrivateKey::ed25519_from_seed(&seed)),
        )
    }
}

impl<S: AuditStore> TestFixture<S> {
    /// Fixture over any store.
    pub fn over(store: S, institution: Institution) -> Self {
        let config = AuditLogConfig::default().with_institution(institution.clone());
        Self {
            institution,
            log: AuditLog::new(store, config),
        }
    }

    /// Get the institution's public key.
    pub fn public_key(&self) -> PublicKey {
        self.institution.public_key()
    }

    /// Append the usual verify / policy / payment sequence to a document.
    pub async fn record_invoice_flow(&self, document_id: &str) -> Vec<Event> {
        let steps = [
            (EventType::VerifyCalled, "erp", json!({"requested_by": "ap-clerk"})),
            (EventType::VerifyResult, "verifier", json!({"verdict": "VALID"})),
            (EventType::PolicyDecision, "policy-engine", json!({"decision": "ALLOW"})),
            (EventType::PaymentAction, "payments", json!({"action": "RELEASE"})),
        ];

        let mut events = Vec::with_capacity(steps.len());
        for (event_type, system, payload) in steps {
            let event = self
                .log
                .append(document_id, event_type, payload, Actor::new(system))
                .await
                .expect("append to memory store");
            events.push(event);
        }
        events
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// Build a linked chain of `len` notes without touching a store.
pub fn make_chain(document_id: &str, len: usize) -> Vec<Event> {
    let mut chain: Vec<Event> = Vec::with_capacity(len);
    for n in 0..len {
        let prev = chain
            .last()
            .map(|e| e.event_hash.clone())
            .unwrap_or_else(|| GENESIS.to_string());
        chain.push(
            EventBuilder::new(document_id, EventType::Note)
                .payload(json!({"n": n}))
                .prev_hash(prev)
                .seal(),
        );
    }
    chain
}

/// 1024-bit RSA key shared by every test in the process.
pub fn rsa_test_key() -> &'static PrivateKey {
    static KEY: OnceLock<PrivateKey> = OnceLock::new();
    KEY.get_or_init(|| PrivateKey::generate_rsa(1024).expect("RSA key generation"))
}
