//! Chain verification.
//!
//! Replays a timeline and reports every link that does not point at its
//! predecessor and every event whose content no longer matches its hash.
//! Findings are data, not errors: an altered chain still verifies to a
//! complete, indexed list of problems.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonical_json;
use crate::event::Event;
use crate::hash::{hash_value, GENESIS};

/// An integrity finding.
///
/// Serialized with a `code` tag (`CHAIN_BREAK`, `HASH_MISMATCH`, ...) so that
/// problem lists read the same inside bundles and verification reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Problem {
    /// `prev_hash` does not match the previous event's `event_hash`.
    ChainBreak {
        index: usize,
        expected_prev: String,
        got_prev: String,
    },
    /// Stored `event_hash` does not match the recomputed content hash.
    HashMismatch {
        index: usize,
        expected_hash: String,
        got_hash: String,
    },
    /// A bundle's content no longer hashes to its signed hash.
    BundleHashMismatch,
    /// The bundle signature could not be evaluated.
    SignatureError { message: String },
}

impl Problem {
    /// Timeline index the problem refers to, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Problem::ChainBreak { index, .. } | Problem::HashMismatch { index, .. } => Some(*index),
            Problem::BundleHashMismatch | Problem::SignatureError { .. } => None,
        }
    }
}

/// Result of verifying a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCheck {
    pub ok: bool,
    pub problems: Vec<Problem>,
}

/// Verify linkage and content hashes of a timeline, oldest event first.
///
/// The expected predecessor advances to each event's *stored* hash, so a
/// single altered event yields one `HASH_MISMATCH` at its own index and no
/// cascade of breaks behind it. An empty timeline is trivially sound.
pub fn verify_chain(timeline: &[Event]) -> ChainCheck {
    let mut problems = Vec::new();
    let mut expected_prev: &str = GENESIS;

    for (index, event) in timeline.iter().enumerate() {
        if event.prev_hash != expected_prev {
            problems.push(Problem::ChainBreak {
                index,
                expected_prev: expected_prev.to_string(),
                got_prev: event.prev_hash.clone(),
            });
        }

        let recomputed = event.compute_hash();
        if recomputed != event.event_hash {
            problems.push(Problem::HashMismatch {
                index,
                expected_hash: recomputed,
                got_hash: event.event_hash.clone(),
            });
        }

        expected_prev = event.event_hash.as_str();
    }

    ChainCheck {
        ok: problems.is_empty(),
        problems,
    }
}

/// Verify a timeline exactly as it was received, one JSON object per event.
///
/// Each event is hashed over every key it carries except `event_hash`, so
/// nothing a typed [`Event`] would normalize away escapes the check. A
/// missing, `null` or empty `prev_hash` reads as `GENESIS`.
pub fn verify_chain_values(timeline: &[Value]) -> ChainCheck {
    let mut problems = Vec::new();
    let mut expected_prev = GENESIS.to_string();

    for (index, event) in timeline.iter().enumerate() {
        let got_prev = match event.get("prev_hash") {
            None | Some(Value::Null) => GENESIS.to_string(),
            Some(Value::String(prev)) if prev.is_empty() => GENESIS.to_string(),
            Some(Value::String(prev)) => prev.clone(),
            Some(other) => canonical_json(other),
        };
        if got_prev != expected_prev {
            problems.push(Problem::ChainBreak {
                index,
                expected_prev: expected_prev.clone(),
                got_prev,
            });
        }

        let got_hash = event
            .get("event_hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut core = event.clone();
        if let Value::Object(map) = &mut core {
            map.remove("event_hash");
        }
        let recomputed = hash_value(&core);
        if recomputed != got_hash {
            problems.push(Problem::HashMismatch {
                index,
                expected_hash: recomputed,
                got_hash: got_hash.clone(),
            });
        }

        expected_prev = got_hash;
    }

    ChainCheck {
        ok: problems.is_empty(),
        problems,
    }
}
