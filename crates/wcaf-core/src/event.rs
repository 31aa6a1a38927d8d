//! Audit events: the links of a document's hash chain.
//!
//! An event is immutable once sealed. Its `event_hash` is the SHA-256 of the
//! canonical encoding of every other field, and its `prev_hash` is the
//! `event_hash` of the event before it (or [`GENESIS`]).

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::hash::{hash_value, GENESIS};

/// Schema tag stamped on events by default.
pub const DEFAULT_SCHEMA_VERSION: &str = "wcaf-1.0";

/// Actor recorded when the caller does not name one.
pub const UNKNOWN_SYSTEM: &str = "unknown";

/// Event field keys.
mod keys {
    pub const EVENT_ID: &str = "event_id";
    pub const TS: &str = "ts";
    pub const DOCUMENT_ID: &str = "document_id";
    pub const TYPE: &str = "type";
    pub const ACTOR: &str = "actor";
    pub const PAYLOAD: &str = "payload";
    pub const PREV_HASH: &str = "prev_hash";
    pub const SCHEMA_VERSION: &str = "schema_version";

    pub const SYSTEM: &str = "system";
    pub const INSTANCE_ID: &str = "instance_id";
}

/// Format a timestamp as ISO-8601 UTC with milliseconds and a `Z` suffix.
pub fn iso8601_millis(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Kind of event.
///
/// The known vocabulary covers the verification / policy / payment trail.
/// Any other tag is carried through untouched as [`EventType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A verification was requested.
    VerifyCalled,
    /// A verification produced a verdict.
    VerifyResult,
    /// A policy engine decided on the document.
    PolicyDecision,
    /// A payment system acted on the document.
    PaymentAction,
    /// Free-form annotation.
    Note,
    /// Tag outside the known vocabulary.
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::VerifyCalled => "VERIFY_CALLED",
            EventType::VerifyResult => "VERIFY_RESULT",
            EventType::PolicyDecision => "POLICY_DECISION",
            EventType::PaymentAction => "PAYMENT_ACTION",
            EventType::Note => "NOTE",
            EventType::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "VERIFY_CALLED" => EventType::VerifyCalled,
            "VERIFY_RESULT" => EventType::VerifyResult,
            "POLICY_DECISION" => EventType::PolicyDecision,
            "PAYMENT_ACTION" => EventType::PaymentAction,
            "NOTE" => EventType::Note,
            other => EventType::Other(other.to_string()),
        }
    }

    /// Whether this tag belongs to the known vocabulary.
    pub fn is_known(&self) -> bool {
        !matches!(self, EventType::Other(_))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl From<String> for EventType {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::parse(&tag))
    }
}

/// Who produced an event.
///
/// `system` is always present. Any extra attributes (an IP, a region, ...)
/// are kept in `extra` and hashed with the rest of the event. An
/// `instance_id` that is not a string (including an explicit `null`) is kept
/// in `extra` as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Actor {
    pub system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Actor {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            instance_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.extra.remove(keys::INSTANCE_ID);
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(keys::SYSTEM.into(), Value::String(self.system.clone()));
        if let Some(instance_id) = &self.instance_id {
            map.insert(keys::INSTANCE_ID.into(), Value::String(instance_id.clone()));
        }
        Value::Object(map)
    }
}

impl<'de> Deserialize<'de> for Actor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut extra = Map::<String, Value>::deserialize(deserializer)?;
        let system = match extra.remove(keys::SYSTEM) {
            Some(Value::String(system)) => system,
            Some(_) => return Err(D::Error::custom("actor.system must be a string")),
            None => return Err(D::Error::missing_field(keys::SYSTEM)),
        };
        let instance_id = match extra.remove(keys::INSTANCE_ID) {
            Some(Value::String(id)) => Some(id),
            Some(other) => {
                extra.insert(keys::INSTANCE_ID.into(), other);
                None
            }
            None => None,
        };
        Ok(Self {
            system,
            instance_id,
            extra,
        })
    }
}

impl Default for Actor {
    fn default() -> Self {
        Self::new(UNKNOWN_SYSTEM)
    }
}

fn genesis() -> String {
    GENESIS.to_string()
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

/// A sealed audit event.
///
/// Fields outside the standard set are kept in `extra` and hashed with the
/// rest, so an event read from elsewhere hashes exactly as it was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    /// Creation time, ISO-8601 UTC with milliseconds.
    pub ts: String,
    pub document_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub actor: Actor,
    #[serde(default = "empty_payload")]
    pub payload: Value,
    /// Hash of the previous event, or `GENESIS`. A missing value reads as `GENESIS`.
    #[serde(default = "genesis")]
    pub prev_hash: String,
    pub event_hash: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// The hashed part of the event: every field except `event_hash`.
    pub fn core_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert(keys::EVENT_ID.into(), Value::String(self.event_id.clone()));
        map.insert(keys::TS.into(), Value::String(self.ts.clone()));
        map.insert(keys::DOCUMENT_ID.into(), Value::String(self.document_id.clone()));
        map.insert(keys::TYPE.into(), Value::String(self.event_type.as_str().to_string()));
        map.insert(keys::ACTOR.into(), self.actor.to_value());
        map.insert(keys::PAYLOAD.into(), self.payload.clone());
        map.insert(keys::PREV_HASH.into(), Value::String(self.prev_hash.clone()));
        map.insert(
            keys::SCHEMA_VERSION.into(),
            Value::String(self.schema_version.clone()),
        );
        Value::Object(map)
    }

    /// Recompute the content hash from the event's current fields.
    pub fn compute_hash(&self) -> String {
        hash_value(&self.core_value())
    }

    /// Whether the stored `event_hash` matches the content.
    pub fn has_valid_hash(&self) -> bool {
        self.compute_hash() == self.event_hash
    }

    /// Whether this event claims to start its chain.
    pub fn is_genesis(&self) -> bool {
        self.prev_hash == GENESIS
    }
}

/// Builder for sealing new events.
///
/// Identifier and timestamp are generated at [`seal`](Self::seal) time unless
/// set explicitly, which is mostly useful for reproducible fixtures.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    document_id: String,
    event_type: EventType,
    actor: Actor,
    payload: Value,
    prev_hash: String,
    schema_version: String,
    event_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl EventBuilder {
    /// Start building an event for a document.
    pub fn new(document_id: impl Into<String>, event_type: impl Into<EventType>) -> Self {
        Self {
            document_id: document_id.into(),
            event_type: event_type.into(),
            actor: Actor::default(),
            payload: empty_payload(),
            prev_hash: genesis(),
            schema_version: default_schema_version(),
            event_id: None,
            timestamp: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Link to the previous chain head.
    pub fn prev_hash(mut self, prev_hash: impl Into<String>) -> Self {
        self.prev_hash = prev_hash.into();
        self
    }

    pub fn schema_version(mut self, schema_version: impl Into<String>) -> Self {
        self.schema_version = schema_version.into();
        self
    }

    pub fn event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Assemble the event and compute its hash.
    pub fn seal(self) -> Event {
        let mut event = Event {
            event_id: self
                .event_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ts: iso8601_millis(self.timestamp.unwrap_or_else(Utc::now)),
            document_id: self.document_id,
            event_type: self.event_type,
            actor: self.actor,
            payload: self.payload,
            prev_hash: self.prev_hash,
            event_hash: String::new(),
            schema_version: self.schema_version,
            extra: Map::new(),
        };
        event.event_hash = event.compute_hash();
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_event() -> Event {
        EventBuilder::new("INV-2025-0001", EventType::VerifyResult)
            .actor(Actor::new("verification-api").with_instance("api-1"))
            .payload(json!({"verdict": "VALID", "trust_level": "HIGH"}))
            .event_id("00000000-0000-4000-8000-000000000001")
            .timestamp(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap())
            .seal()
    }

    #[test]
    fn test_seal_defaults() {
        let event = EventBuilder::new("doc", "NOTE").seal();

        assert_eq!(event.prev_hash, GENESIS);
        assert_eq!(event.actor.system, UNKNOWN_SYSTEM);
        assert_eq!(event.payload, json!({}));
        assert_eq!(event.schema_version, DEFAULT_SCHEMA_VERSION);
        assert_eq!(event.event_type, EventType::Note);
        assert!(Uuid::parse_str(&event.event_id).is_ok());
        assert!(event.has_valid_hash());
        assert!(event.is_genesis());
    }

    #[test]
    fn test_timestamp_format() {
        let event = fixed_event();
        assert_eq!(event.ts, "2025-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_core_value_matches_serde() {
        let event = fixed_event();
        let mut serialized = serde_json::to_value(&event).unwrap();
        serialized.as_object_mut().unwrap().remove("event_hash");

        assert_eq!(event.core_value(), serialized);
    }

    #[test]
    fn test_hash_binds_every_field() {
        let base = fixed_event();
        let original = base.compute_hash();

        let mut variants = Vec::new();
        let mut e = base.clone();
        e.event_id.push('x');
        variants.push(e);
        let mut e = base.clone();
        e.ts = "2025-01-02T03:04:05.001Z".into();
        variants.push(e);
        let mut e = base.clone();
        e.document_id = "INV-2025-0002".into();
        variants.push(e);
        let mut e = base.clone();
        e.event_type = EventType::Note;
        variants.push(e);
        let mut e = base.clone();
        e.actor.instance_id = None;
        variants.push(e);
        let mut e = base.clone();
        e.actor = e.actor.with_field("ip", json!("10.0.0.1"));
        variants.push(e);
        let mut e = base.clone();
        e.payload["verdict"] = json!("INVALID");
        variants.push(e);
        let mut e = base.clone();
        e.prev_hash = "00".repeat(32);
        variants.push(e);
        let mut e = base.clone();
        e.schema_version = "wcaf-2.0".into();
        variants.push(e);
        let mut e = base.clone();
        e.extra.insert("channel".into(), json!("batch"));
        variants.push(e);

        for variant in variants {
            assert_ne!(variant.compute_hash(), original, "{:?}", variant);
        }
    }

    #[test]
    fn test_event_type_roundtrip() {
        for tag in [
            "VERIFY_CALLED",
            "VERIFY_RESULT",
            "POLICY_DECISION",
            "PAYMENT_ACTION",
            "NOTE",
        ] {
            let t = EventType::parse(tag);
            assert!(t.is_known());
            assert_eq!(t.as_str(), tag);
        }

        let custom = EventType::parse("KYC_REFRESH");
        assert_eq!(custom, EventType::Other("KYC_REFRESH".into()));
        assert!(!custom.is_known());
        assert_eq!(serde_json::to_value(&custom).unwrap(), json!("KYC_REFRESH"));
    }

    #[test]
    fn test_actor_extra_fields_flatten() {
        let actor: Actor =
            serde_json::from_value(json!({"system": "bank-core", "ip": "10.1.1.1"})).unwrap();
        assert_eq!(actor.system, "bank-core");
        assert_eq!(actor.instance_id, None);
        assert_eq!(actor.extra.get("ip"), Some(&json!("10.1.1.1")));

        let back = serde_json::to_value(&actor).unwrap();
        assert_eq!(back, json!({"system": "bank-core", "ip": "10.1.1.1"}));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let event: Event = serde_json::from_value(json!({
            "event_id": "e1",
            "ts": "2025-01-01T00:00:00.000Z",
            "document_id": "doc",
            "type": "NOTE",
            "event_hash": "abc"
        }))
        .unwrap();

        assert_eq!(event.prev_hash, GENESIS);
        assert_eq!(event.payload, json!({}));
        assert_eq!(event.actor, Actor::default());
        assert_eq!(event.schema_version, DEFAULT_SCHEMA_VERSION);
    }

    #[test]
    fn test_actor_explicit_null_instance_kept() {
        let actor: Actor =
            serde_json::from_value(json!({"system": "erp", "instance_id": null})).unwrap();
        assert_eq!(actor.instance_id, None);
        assert_eq!(
            serde_json::to_value(&actor).unwrap(),
            json!({"system": "erp", "instance_id": null})
        );
        assert_ne!(actor.to_value(), Actor::new("erp").to_value());
    }

    #[test]
    fn test_actor_requires_system() {
        assert!(serde_json::from_value::<Actor>(json!({"instance_id": "a"})).is_err());
        assert!(serde_json::from_value::<Actor>(json!({"system": 7})).is_err());
    }

    #[test]
    fn test_unknown_fields_are_hashed() {
        let event = fixed_event();
        let mut value = serde_json::to_value(&event).unwrap();
        value["decision_override"] = json!("BLOCK");

        let received: Event = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(received.extra.get("decision_override"), Some(&json!("BLOCK")));
        assert!(!received.has_valid_hash());

        let mut expected_core = value;
        expected_core.as_object_mut().unwrap().remove("event_hash");
        assert_eq!(received.core_value(), expected_core);
        assert_eq!(serde_json::to_value(&received).unwrap()["decision_override"], json!("BLOCK"));
    }

    #[test]
    fn test_json_roundtrip_keeps_hash() {
        let event = fixed_event();
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(back, event);
        assert!(back.has_valid_hash());
    }
}
