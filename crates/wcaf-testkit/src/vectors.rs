//! Golden test vectors for deterministic verification.
//!
//! Each vector pins the canonical encoding of an event's hashed content and
//! the resulting SHA-256. Any implementation that hashes these inputs to
//! different values cannot verify chains written by this one.

use serde_json::{Map, Value};
use wcaf_core::{canonical_json, Actor, Event, EventType, DEFAULT_SCHEMA_VERSION, GENESIS};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub event_id: &'static str,
    pub ts: &'static str,
    pub document_id: &'static str,
    pub event_type: &'static str,
    /// Actor as JSON.
    pub actor: &'static str,
    /// Payload as JSON.
    pub payload: &'static str,
    pub prev_hash: &'static str,
    /// Expected canonical encoding of the hashed content.
    pub expected_canonical: &'static str,
    /// Expected event hash (hex).
    pub expected_hash: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis verify result",
            event_id: "00000000-0000-4000-8000-000000000001",
            ts: "2024-01-15T10:30:00.000Z",
            document_id: "INV-2024-001",
            event_type: "VERIFY_RESULT",
            actor: r#"{"system":"verifier"}"#,
            payload: r#"{"verdict":"VALID"}"#,
            prev_hash: GENESIS,
            expected_canonical: r#"{"actor":{"system":"verifier"},"document_id":"INV-2024-001","event_id":"00000000-0000-4000-8000-000000000001","payload":{"verdict":"VALID"},"prev_hash":"GENESIS","schema_version":"wcaf-1.0","ts":"2024-01-15T10:30:00.000Z","type":"VERIFY_RESULT"}"#,
            expected_hash: "e494d5306707cc4768518ba3b1eb0d50db715297bf1ecfd08f217501cda1d74d",
        },
        GoldenVector {
            name: "linked policy decision with actor instance",
            event_id: "00000000-0000-4000-8000-000000000002",
            ts: "2024-01-15T10:30:05.250Z",
            document_id: "INV-2024-001",
            event_type: "POLICY_DECISION",
            actor: r#"{"system":"policy-engine","instance_id":"pe-7"}"#,
            payload: r#"{"rule":"R-12","decision":"ALLOW"}"#,
            prev_hash: "e494d5306707cc4768518ba3b1eb0d50db715297bf1ecfd08f217501cda1d74d",
            expected_canonical: r#"{"actor":{"instance_id":"pe-7","system":"policy-engine"},"document_id":"INV-2024-001","event_id":"00000000-0000-4000-8000-000000000002","payload":{"decision":"ALLOW","rule":"R-12"},"prev_hash":"e494d5306707cc4768518ba3b1eb0d50db715297bf1ecfd08f217501cda1d74d","schema_version":"wcaf-1.0","ts":"2024-01-15T10:30:05.250Z","type":"POLICY_DECISION"}"#,
            expected_hash: "eecc845dbbe4d7d529beaf00c733124a5d80238d2a04ea12f2fe3aae392c7a5a",
        },
        GoldenVector {
            name: "number formatting",
            event_id: "00000000-0000-4000-8000-000000000003",
            ts: "2024-02-01T00:00:00.000Z",
            document_id: "INV-NUM",
            event_type: "PAYMENT_ACTION",
            actor: r#"{"system":"payments"}"#,
            payload: r#"{"amount":1500,"ratio":0.1,"big":1e21,"neg_zero":-0.0,"small":1e-7}"#,
            prev_hash: GENESIS,
            expected_canonical: r#"{"actor":{"system":"payments"},"document_id":"INV-NUM","event_id":"00000000-0000-4000-8000-000000000003","payload":{"amount":1500,"big":1e+21,"neg_zero":0,"ratio":0.1,"small":1e-7},"prev_hash":"GENESIS","schema_version":"wcaf-1.0","ts":"2024-02-01T00:00:00.000Z","type":"PAYMENT_ACTION"}"#,
            expected_hash: "ca2f34aaaed53c37d9bcdfb3bc36ac912db7be25209dfd6cabf4b548da2f84f5",
        },
        GoldenVector {
            name: "string escapes, null and actor extras",
            event_id: "00000000-0000-4000-8000-000000000004",
            ts: "2024-03-10T08:00:00.001Z",
            document_id: "INV-TEXT",
            event_type: "NOTE",
            actor: r#"{"system":"clerk","region":"eu"}"#,
            payload: r#"{"text":"café \"quoted\"\nline\u0001","tags":["b","a"],"empty":null}"#,
            prev_hash: GENESIS,
            expected_canonical: r#"{"actor":{"region":"eu","system":"clerk"},"document_id":"INV-TEXT","event_id":"00000000-0000-4000-8000-000000000004","payload":{"empty":null,"tags":["b","a"],"text":"café \"quoted\"\nline\u0001"},"prev_hash":"GENESIS","schema_version":"wcaf-1.0","ts":"2024-03-10T08:00:00.001Z","type":"NOTE"}"#,
            expected_hash: "9a862f8d8c7d52902918220acc5fcd6281e2cb2067272160ab0930b62a5b1a5f",
        },
        GoldenVector {
            name: "empty payload, default actor",
            event_id: "00000000-0000-4000-8000-000000000005",
            ts: "2024-03-10T08:00:00.000Z",
            document_id: "INV-EMPTY",
            event_type: "VERIFY_CALLED",
            actor: r#"{"system":"unknown"}"#,
            payload: "{}",
            prev_hash: GENESIS,
            expected_canonical: r#"{"actor":{"system":"unknown"},"document_id":"INV-EMPTY","event_id":"00000000-0000-4000-8000-000000000005","payload":{},"prev_hash":"GENESIS","schema_version":"wcaf-1.0","ts":"2024-03-10T08:00:00.000Z","type":"VERIFY_CALLED"}"#,
            expected_hash: "eaa3c226b3e255326526929435cb1390de6c159ec9cc36186304ac78a7c03cf0",
        },
    ]
}

/// Build the event a golden vector describes, with its hash computed.
///
/// Panics if the vector's JSON fragments do not parse.
pub fn event_from_vector(vector: &GoldenVector) -> Event {
    let actor: Actor = serde_json::from_str(vector.actor).expect("vector actor is valid JSON");
    let payload: Value =
        serde_json::from_str(vector.payload).expect("vector payload is valid JSON");

    let mut event = Event {
        event_id: vector.event_id.to_string(),
        ts: vector.ts.to_string(),
        document_id: vector.document_id.to_string(),
        event_type: EventType::parse(vector.event_type),
        actor,
        payload,
        prev_hash: vector.prev_hash.to_string(),
        event_hash: String::new(),
        schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
        extra: Map::new(),
    };
    event.event_hash = event.compute_hash();
    event
}

/// Check every golden vector against this implementation.
///
/// Returns `(name, matches, computed_hash)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let event = event_from_vector(v);
            let matches = canonical_json(&event.core_value()) == v.expected_canonical
                && event.event_hash == v.expected_hash;
            (v.name.to_string(), matches, event.event_hash)
        })
        .collect()
}
