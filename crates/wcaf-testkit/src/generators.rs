//! Proptest generators for property-based testing.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{Map, Value};

use wcaf_core::{Actor, Event, EventBuilder, EventType, GENESIS};

/// Generate an arbitrary JSON value, nested up to a few levels.
///
/// Floats are finite; NaN and infinities cannot be represented in JSON.
pub fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Value::from),
        ".{0,16}".prop_map(Value::String),
    ];

    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(".{0,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Generate a JSON object, as event payloads are.
pub fn payload() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z_]{1,10}", json_value(), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

/// Generate an event type, mostly from the known vocabulary.
pub fn event_type() -> impl Strategy<Value = EventType> {
    prop_oneof![
        Just(EventType::VerifyCalled),
        Just(EventType::VerifyResult),
        Just(EventType::PolicyDecision),
        Just(EventType::PaymentAction),
        Just(EventType::Note),
        "[A-Z][A-Z_]{0,15}".prop_map(|tag| EventType::parse(&tag)),
    ]
}

/// Generate an actor with optional instance id and extra fields.
pub fn actor() -> impl Strategy<Value = Actor> {
    (
        "[a-z][a-z0-9-]{0,15}",
        proptest::option::of("[a-z0-9-]{1,12}"),
        prop::collection::btree_map("x_[a-z]{1,6}", json_value(), 0..3),
    )
        .prop_map(|(system, instance, extra)| {
            let mut actor = Actor::new(system);
            actor.instance_id = instance;
            actor.extra = extra.into_iter().collect();
            actor
        })
}

/// Generate a document identifier.
pub fn document_id() -> impl Strategy<Value = String> {
    "[A-Z]{3}-[0-9]{1,6}".prop_map(String::from)
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct EventParams {
    pub document_id: String,
    pub event_type: EventType,
    pub actor: Actor,
    pub payload: Value,
    pub event_id: String,
    /// Milliseconds since the Unix epoch.
    pub ts_millis: i64,
}

impl Arbitrary for EventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            document_id(),
            event_type(),
            actor(),
            payload(),
            any::<u128>(),
            0i64..=4_102_444_800_000i64, // through 2100-01-01
        )
            .prop_map(|(document_id, event_type, actor, payload, id, ts)| EventParams {
                document_id,
                event_type,
                actor,
                payload,
                event_id: format!("{:032x}", id),
                ts_millis: ts,
            })
            .boxed()
    }
}

/// Seal an event from parameters, linked to `prev_hash`.
pub fn event_from_params(params: &EventParams, prev_hash: &str) -> Event {
    EventBuilder::new(params.document_id.clone(), params.event_type.clone())
        .actor(params.actor.clone())
        .payload(params.payload.clone())
        .prev_hash(prev_hash)
        .event_id(params.event_id.clone())
        .timestamp(Utc.timestamp_millis_opt(params.ts_millis).unwrap())
        .seal()
}

/// Seal a linked chain, one event per parameter set.
pub fn chain_from_params(params: &[EventParams]) -> Vec<Event> {
    let mut chain: Vec<Event> = Vec::with_capacity(params.len());
    for p in params {
        let prev = chain
            .last()
            .map(|e| e.event_hash.clone())
            .unwrap_or_else(|| GENESIS.to_string());
        chain.push(event_from_params(p, &prev));
    }
    chain
}

/// Generate a linked chain of 1 to `max_len` events.
pub fn chain(max_len: usize) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(any::<EventParams>(), 1..=max_len)
        .prop_map(|params| chain_from_params(&params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wcaf_core::{
        canonical_json, create_bundle, hash_value, verify_bundle, verify_chain, Problem,
    };

    proptest! {
        #[test]
        fn test_event_hash_deterministic(params: EventParams) {
            let e1 = event_from_params(&params, GENESIS);
            let e2 = event_from_params(&params, GENESIS);

            prop_assert_eq!(&e1.event_hash, &e2.event_hash);
            prop_assert!(e1.has_valid_hash());
        }

        #[test]
        fn test_canonical_ignores_formatting(value in json_value()) {
            let pretty = serde_json::to_string_pretty(&value).unwrap();
            let reparsed: Value = serde_json::from_str(&pretty).unwrap();

            prop_assert_eq!(canonical_json(&value), canonical_json(&reparsed));
            prop_assert_eq!(hash_value(&value), hash_value(&reparsed));
        }

        #[test]
        fn test_stored_events_keep_their_hash(params: EventParams) {
            let event = event_from_params(&params, GENESIS);
            let json = serde_json::to_string(&event).unwrap();
            let parsed: Event = serde_json::from_str(&json).unwrap();

            prop_assert!(parsed.has_valid_hash());
            prop_assert_eq!(parsed, event);
        }

        #[test]
        fn test_generated_chains_verify(events in chain(8)) {
            prop_assert!(verify_chain(&events).ok);
        }

        #[test]
        fn test_payload_tamper_detected(
            events in chain(8),
            pick in any::<prop::sample::Index>(),
            marker in "[a-z]{1,8}",
        ) {
            let mut events = events;
            let i = pick.index(events.len());
            let mut payload = events[i].payload.as_object().cloned().unwrap_or_default();
            payload.insert("__tampered".to_string(), Value::String(marker));
            events[i].payload = Value::Object(payload);

            let check = verify_chain(&events);
            prop_assert!(!check.ok);
            prop_assert_eq!(check.problems.len(), 1);
            let is_mismatch_at_i = matches!(
                &check.problems[0],
                Problem::HashMismatch { index, .. } if *index == i
            );
            prop_assert!(is_mismatch_at_i);
        }

        #[test]
        fn test_prev_hash_overwrite_is_chain_break(
            events in chain(8),
            pick in any::<prop::sample::Index>(),
        ) {
            prop_assume!(events.len() >= 2);
            let mut events = events;
            let i = 1 + pick.index(events.len() - 1);
            events[i].prev_hash = "f".repeat(64);

            let check = verify_chain(&events);
            prop_assert!(!check.ok);
            let has_chain_break_at_i = check
                .problems
                .iter()
                .any(|p| matches!(p, Problem::ChainBreak { index, .. } if *index == i));
            prop_assert!(has_chain_break_at_i);
            prop_assert!(check.problems.iter().all(|p| p.index() == Some(i)));
        }

        #[test]
        fn test_bundle_agrees_with_chain(
            events in chain(6),
            tamper in any::<bool>(),
        ) {
            let mut events = events;
            if tamper {
                events[0].payload = Value::String("rewritten".to_string());
            }

            let bundle = create_bundle(&events, None, None).unwrap();
            let report = verify_bundle(&bundle, None);
            prop_assert_eq!(report.chain_verified, verify_chain(&events).ok);
            prop_assert_eq!(report.chain_verified, !tamper);
        }

        #[test]
        fn test_different_payloads_different_hashes(
            params: EventParams,
            other in payload(),
        ) {
            prop_assume!(canonical_json(&params.payload) != canonical_json(&other));

            let mut changed = params.clone();
            changed.payload = other;

            prop_assert_ne!(
                event_from_params(&params, GENESIS).event_hash,
                event_from_params(&changed, GENESIS).event_hash
            );
        }
    }
}
