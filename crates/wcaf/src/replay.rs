//! Folding a timeline into the document's current business state.
//!
//! Replay is a convenience view over events that have already been stored.
//! It does not check hashes; run [`verify_chain`](wcaf_core::verify_chain)
//! first when the state has to be trusted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wcaf_core::{Event, EventType};

/// State reconstructed from a timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayState {
    pub document_id: Option<String>,
    /// Payload of the last `VERIFY_RESULT`.
    pub verify: Option<Value>,
    /// Payload of the last `POLICY_DECISION`.
    pub policy: Option<Value>,
    /// Payload of the last `PAYMENT_ACTION`.
    pub payment: Option<Value>,
    /// Payloads of every `NOTE`, oldest first.
    pub notes: Vec<Value>,
}

/// Replay a timeline, oldest first.
///
/// Later events of the same kind replace earlier ones. Kinds that carry no
/// state (`VERIFY_CALLED`, unknown tags) are skipped.
pub fn replay(timeline: &[Event]) -> ReplayState {
    let mut state = ReplayState {
        document_id: timeline.first().map(|e| e.document_id.clone()),
        ..ReplayState::default()
    };

    for event in timeline {
        match event.event_type {
            EventType::VerifyResult => state.verify = Some(event.payload.clone()),
            EventType::PolicyDecision => state.policy = Some(event.payload.clone()),
            EventType::PaymentAction => state.payment = Some(event.payload.clone()),
            EventType::Note => state.notes.push(event.payload.clone()),
            EventType::VerifyCalled | EventType::Other(_) => {}
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wcaf_core::EventBuilder;

    fn chain(steps: Vec<(EventType, Value)>) -> Vec<Event> {
        let mut out: Vec<Event> = Vec::new();
        for (event_type, payload) in steps {
            let mut builder = EventBuilder::new("INV-9", event_type).payload(payload);
            if let Some(prev) = out.last() {
                builder = builder.prev_hash(prev.event_hash.clone());
            }
            out.push(builder.seal());
        }
        out
    }

    #[test]
    fn test_empty_timeline() {
        let state = replay(&[]);
        assert_eq!(state, ReplayState::default());
        assert!(state.document_id.is_none());
    }

    #[test]
    fn test_last_value_wins() {
        let timeline = chain(vec![
            (EventType::VerifyCalled, json!({"by": "erp"})),
            (EventType::VerifyResult, json!({"verdict": "INVALID"})),
            (EventType::VerifyResult, json!({"verdict": "VALID"})),
            (EventType::PolicyDecision, json!({"decision": "ALLOW"})),
            (EventType::PaymentAction, json!({"action": "RELEASE"})),
        ]);

        let state = replay(&timeline);
        assert_eq!(state.document_id.as_deref(), Some("INV-9"));
        assert_eq!(state.verify, Some(json!({"verdict": "VALID"})));
        assert_eq!(state.policy, Some(json!({"decision": "ALLOW"})));
        assert_eq!(state.payment, Some(json!({"action": "RELEASE"})));
        assert!(state.notes.is_empty());
    }

    #[test]
    fn test_notes_accumulate_and_unknown_ignored() {
        let timeline = chain(vec![
            (EventType::Note, json!({"text": "first"})),
            (EventType::parse("CUSTOM_THING"), json!({"x": 1})),
            (EventType::Note, json!({"text": "second"})),
        ]);

        let state = replay(&timeline);
        assert_eq!(
            state.notes,
            vec![json!({"text": "first"}), json!({"text": "second"})]
        );
        assert!(state.verify.is_none());
        assert!(state.policy.is_none());
    }
}
