//! The AuditLog: unified API over a store and an institutional key.
//!
//! Appending goes through the hash-chain appender; everything else reads the
//! stored timeline and hands it to the pure functions in `wcaf_core`.

use std::sync::Arc;

use serde_json::Value;
use wcaf_core::{
    verify_chain, Actor, Attestation, Bundle, BundleVerification, ChainCheck, CoreError, Event,
    EventBuilder, EventType, PublicKey,
};
use wcaf_store::{AuditStore, ChainHead};

use crate::append::append_event;
use crate::config::AuditLogConfig;
use crate::error::{AuditError, Result};
use crate::replay::{replay, ReplayState};

/// The main audit log.
///
/// Provides a unified API for:
/// - Appending events to per-document hash chains
/// - Reading and verifying timelines
/// - Attesting chain heads with the institutional key
/// - Creating and verifying portable bundles
pub struct AuditLog<S: AuditStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: AuditLogConfig,
}

impl<S: AuditStore> Clone for AuditLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: AuditStore> AuditLog<S> {
    /// Create a new audit log over `store`.
    pub fn new(store: S, config: AuditLogConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AuditLogConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an event to a document's chain.
    ///
    /// Fails with [`AuditError::Conflict`] if another writer appended to the
    /// same document concurrently.
    pub async fn append(
        &self,
        document_id: &str,
        event_type: impl Into<EventType>,
        payload: Value,
        actor: Actor,
    ) -> Result<Event> {
        let builder = EventBuilder::new(document_id, event_type)
            .payload(payload)
            .actor(actor)
            .schema_version(self.config.schema_version.clone());
        self.append_with(builder).await
    }

    /// Append a prepared builder as-is, apart from its `prev_hash`, which is
    /// always replaced by the current head.
    pub async fn append_with(&self, builder: EventBuilder) -> Result<Event> {
        if self.config.strict_event_types && !builder.event_type().is_known() {
            return Err(AuditError::UnknownEventType(
                builder.event_type().as_str().to_string(),
            ));
        }

        append_event(self.store.as_ref(), builder).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// All events of a document, oldest first. Empty if the document is unknown.
    pub async fn timeline(&self, document_id: &str) -> Result<Vec<Event>> {
        Ok(self.store.events_for_document(document_id).await?)
    }

    /// Replay and verify a document's stored chain.
    pub async fn verify_document(&self, document_id: &str) -> Result<ChainCheck> {
        let timeline = self.timeline(document_id).await?;
        let check = verify_chain(&timeline);
        if !check.ok {
            tracing::warn!(
                "Chain for {} failed verification with {} problem(s)",
                document_id,
                check.problems.len()
            );
        }
        Ok(check)
    }

    /// Fold a document's timeline into its current business state.
    pub async fn replay_document(&self, document_id: &str) -> Result<ReplayState> {
        let timeline = self.timeline(document_id).await?;
        Ok(replay(&timeline))
    }

    pub async fn chain_head(&self, document_id: &str) -> Result<Option<ChainHead>> {
        Ok(self.store.chain_head(document_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attestation Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign the document's current head with the institutional key.
    ///
    /// The attestation is returned, not stored.
    pub async fn attest(&self, document_id: &str) -> Result<Attestation> {
        if self.config.institution.is_none() {
            return Err(AuditError::NoInstitution);
        }

        let head = self
            .store
            .last_hash(document_id)
            .await?
            .ok_or_else(|| CoreError::MissingHead(document_id.to_string()))?;

        self.attest_head(document_id, &head)
    }

    fn attest_head(&self, document_id: &str, head: &str) -> Result<Attestation> {
        let institution = self
            .config
            .institution
            .as_ref()
            .ok_or(AuditError::NoInstitution)?;

        let attestation = wcaf_core::attest(
            document_id,
            head,
            &institution.key_id,
            &institution.private_key,
            self.config.signature_algorithm,
        )?;

        tracing::info!(
            "Attested {} at head {} with key {}",
            document_id,
            head.get(..16).unwrap_or(head),
            institution.key_id
        );
        Ok(attestation)
    }

    /// Most recent stored attestation, if the store keeps attestations.
    pub async fn latest_attestation(&self, document_id: &str) -> Result<Option<Attestation>> {
        match self.store.attestations() {
            Some(attestations) => Ok(attestations.latest_attestation(document_id).await?),
            None => Ok(None),
        }
    }

    /// Check an attestation against `public_key`, or the configured key.
    pub fn verify_attestation(
        &self,
        attestation: &Attestation,
        public_key: Option<&PublicKey>,
    ) -> Result<bool> {
        let key = self.resolve_key(public_key).ok_or(AuditError::NoPublicKey)?;
        let ok = wcaf_core::verify_attestation(attestation, &key);
        if !ok {
            tracing::warn!(
                "Attestation for {} did not verify against key {}",
                attestation.document_id,
                attestation.key_id
            );
        }
        Ok(ok)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bundle Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Bundle a document's timeline, signed by the institution when one is
    /// configured.
    pub async fn create_bundle(
        &self,
        document_id: &str,
        attestation: Option<&Attestation>,
    ) -> Result<Bundle> {
        let timeline = self.timeline(document_id).await?;
        let bundle =
            wcaf_core::create_bundle(&timeline, attestation, self.config.institution.as_ref())?;
        tracing::debug!(
            "Bundled {} event(s) for {} (signed: {})",
            timeline.len(),
            document_id,
            bundle.bundle_signature.is_some()
        );
        Ok(bundle)
    }

    /// Re-verify a bundle against `public_key`, or the configured key.
    pub fn verify_bundle(
        &self,
        bundle: &Bundle,
        public_key: Option<&PublicKey>,
    ) -> BundleVerification {
        let key = self.resolve_key(public_key);
        let report = wcaf_core::verify_bundle(bundle, key.as_ref());
        if !report.ok {
            tracing::warn!(
                "Bundle for {} failed verification with {} problem(s)",
                bundle.document_id,
                report.problems.len()
            );
        }
        report
    }

    /// Produce the document's full audit export.
    ///
    /// With an institution configured, the head of the exported timeline is
    /// attested and the attestation is persisted when the store keeps
    /// attestations. The bundle embeds that attestation and is signed.
    /// Events appended after the timeline is read are in neither.
    pub async fn export_audit_bundle(&self, document_id: &str) -> Result<Bundle> {
        let timeline = self.timeline(document_id).await?;
        let Some(head) = timeline.last().map(|e| e.event_hash.clone()) else {
            return Err(AuditError::NoEvents(document_id.to_string()));
        };

        let attestation = match self.config.institution {
            Some(_) => {
                let attestation = self.attest_head(document_id, &head)?;
                if let Some(store) = self.store.attestations() {
                    store.save_attestation(&attestation).await?;
                }
                Some(attestation)
            }
            None => None,
        };

        let bundle = wcaf_core::create_bundle(
            &timeline,
            attestation.as_ref(),
            self.config.institution.as_ref(),
        )?;

        tracing::info!(
            "Exported audit bundle for {}: {} event(s), verified: {}",
            document_id,
            bundle.chain_verification.event_count,
            bundle.chain_verification.verified
        );
        Ok(bundle)
    }

    fn resolve_key(&self, public_key: Option<&PublicKey>) -> Option<PublicKey> {
        public_key
            .cloned()
            .or_else(|| self.config.verification_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use async_trait::async_trait;
    use wcaf_core::{Institution, PrivateKey, SignatureAlgorithm, GENESIS};
    use wcaf_store::{AppendResult, AttestationStore, MemoryStore};

    /// Store where another writer appends right after every timeline read.
    struct BusyDocument(MemoryStore);

    #[async_trait]
    impl AuditStore for BusyDocument {
        async fn last_hash(&self, document_id: &str) -> wcaf_store::Result<Option<String>> {
            self.0.last_hash(document_id).await
        }

        async fn append(&self, event: &Event) -> wcaf_store::Result<AppendResult> {
            self.0.append(event).await
        }

        async fn events_for_document(&self, document_id: &str) -> wcaf_store::Result<Vec<Event>> {
            let events = self.0.events_for_document(document_id).await?;
            if let Some(head) = events.last() {
                let late = EventBuilder::new(document_id, EventType::Note)
                    .payload(json!({"late": true}))
                    .prev_hash(head.event_hash.clone())
                    .seal();
                self.0.append(&late).await?;
            }
            Ok(events)
        }

        async fn chain_head(&self, document_id: &str) -> wcaf_store::Result<Option<ChainHead>> {
            self.0.chain_head(document_id).await
        }

        fn attestations(&self) -> Option<&dyn AttestationStore> {
            self.0.attestations()
        }
    }

    fn institution(seed: u8) -> Institution {
        Institution::new(
            format!("key-{}", seed),
            PrivateKey::ed25519_from_seed(&[seed; 32]),
        )
    }

    fn signed_log() -> AuditLog<MemoryStore> {
        AuditLog::new(
            MemoryStore::new(),
            AuditLogConfig::default().with_institution(institution(7)),
        )
    }

    #[tokio::test]
    async fn test_append_and_timeline() {
        let log = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());

        let a = log
            .append(
                "INV-1",
                EventType::VerifyResult,
                json!({"verdict": "VALID"}),
                Actor::new("verifier"),
            )
            .await
            .unwrap();
        let b = log
            .append(
                "INV-1",
                EventType::PolicyDecision,
                json!({"decision": "ALLOW"}),
                Actor::new("policy"),
            )
            .await
            .unwrap();

        assert_eq!(a.prev_hash, GENESIS);
        assert_eq!(b.prev_hash, a.event_hash);
        assert_eq!(log.timeline("INV-1").await.unwrap(), vec![a, b]);
        assert!(log.verify_document("INV-1").await.unwrap().ok);
    }

    #[tokio::test]
    async fn test_unknown_document_is_empty_and_valid() {
        let log = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());

        assert!(log.timeline("nope").await.unwrap().is_empty());
        assert!(log.verify_document("nope").await.unwrap().ok);
        assert!(log.chain_head("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_strict_event_types() {
        let log = AuditLog::new(
            MemoryStore::new(),
            AuditLogConfig::default().with_strict_event_types(true),
        );

        let err = log
            .append("INV-1", "SHIPPED", json!({}), Actor::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::UnknownEventType(t) if t == "SHIPPED"));
        assert!(log.timeline("INV-1").await.unwrap().is_empty());

        let lenient = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());
        let event = lenient
            .append("INV-1", "SHIPPED", json!({}), Actor::default())
            .await
            .unwrap();
        assert_eq!(event.event_type.as_str(), "SHIPPED");
    }

    #[tokio::test]
    async fn test_configured_schema_version() {
        let log = AuditLog::new(
            MemoryStore::new(),
            AuditLogConfig::default().with_schema_version("wcaf-1.1"),
        );

        let event = log
            .append("INV-1", EventType::Note, json!({"text": "hi"}), Actor::default())
            .await
            .unwrap();
        assert_eq!(event.schema_version, "wcaf-1.1");
        assert!(event.has_valid_hash());
    }

    #[tokio::test]
    async fn test_replay_document() {
        let log = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());
        log.append("INV-1", EventType::VerifyResult, json!({"verdict": "VALID"}), Actor::default())
            .await
            .unwrap();
        log.append("INV-1", EventType::Note, json!({"text": "checked"}), Actor::default())
            .await
            .unwrap();

        let state = log.replay_document("INV-1").await.unwrap();
        assert_eq!(state.verify, Some(json!({"verdict": "VALID"})));
        assert_eq!(state.notes, vec![json!({"text": "checked"})]);
    }

    #[tokio::test]
    async fn test_attest_requires_institution_and_head() {
        let unsigned = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());
        assert!(matches!(
            unsigned.attest("INV-1").await.unwrap_err(),
            AuditError::NoInstitution
        ));

        let log = signed_log();
        assert!(matches!(
            log.attest("INV-1").await.unwrap_err(),
            AuditError::Core(CoreError::MissingHead(_))
        ));
    }

    #[tokio::test]
    async fn test_attest_and_verify() {
        let log = signed_log();
        let event = log
            .append("INV-1", EventType::Note, json!({}), Actor::default())
            .await
            .unwrap();

        let attestation = log.attest("INV-1").await.unwrap();
        assert_eq!(attestation.head_event_hash, event.event_hash);
        assert_eq!(attestation.algorithm(), SignatureAlgorithm::Ed25519);
        assert_eq!(attestation.key_id, "key-7");

        assert!(log.verify_attestation(&attestation, None).unwrap());

        let stranger = institution(8).public_key();
        assert!(!log.verify_attestation(&attestation, Some(&stranger)).unwrap());

        // attest does not persist
        assert!(log.latest_attestation("INV-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_attestation_without_key() {
        let log = signed_log();
        log.append("INV-1", EventType::Note, json!({}), Actor::default())
            .await
            .unwrap();
        let attestation = log.attest("INV-1").await.unwrap();

        let unsigned = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());
        assert!(matches!(
            unsigned.verify_attestation(&attestation, None).unwrap_err(),
            AuditError::NoPublicKey
        ));
    }

    #[tokio::test]
    async fn test_export_audit_bundle() {
        let log = signed_log();
        for verdict in ["VALID", "REVIEW"] {
            log.append(
                "INV-1",
                EventType::VerifyResult,
                json!({"verdict": verdict}),
                Actor::default(),
            )
            .await
            .unwrap();
        }

        let bundle = log.export_audit_bundle("INV-1").await.unwrap();
        assert_eq!(bundle.timeline.len(), 2);
        assert!(bundle.chain_verification.verified);
        assert!(bundle.attestation.is_some());
        assert!(bundle.bundle_signature.is_some());

        let stored = log.latest_attestation("INV-1").await.unwrap().unwrap();
        assert_eq!(Some(stored.head_event_hash.as_str()), bundle.head_event_hash());

        let report = log.verify_bundle(&bundle, None);
        assert!(report.ok);
        assert_eq!(report.bundle_signature_verified, Some(true));
        assert_eq!(report.attestation_verified, Some(true));
    }

    #[tokio::test]
    async fn test_export_attests_the_exported_head() {
        let log = AuditLog::new(
            BusyDocument(MemoryStore::new()),
            AuditLogConfig::default().with_institution(institution(7)),
        );
        log.append("INV-1", EventType::Note, json!({"n": 1}), Actor::default())
            .await
            .unwrap();

        let bundle = log.export_audit_bundle("INV-1").await.unwrap();
        assert_eq!(bundle.timeline.len(), 1);

        let embedded = bundle.attestation.as_ref().unwrap();
        assert_eq!(Some(embedded.head_event_hash.as_str()), bundle.head_event_hash());

        let stored = log.latest_attestation("INV-1").await.unwrap().unwrap();
        assert_eq!(Some(stored.head_event_hash.as_str()), bundle.head_event_hash());
        assert_ne!(
            log.store().last_hash("INV-1").await.unwrap().as_deref(),
            bundle.head_event_hash()
        );

        let report = log.verify_bundle(&bundle, None);
        assert!(report.ok);
        assert_eq!(report.attestation_verified, Some(true));
    }

    #[tokio::test]
    async fn test_export_empty_document_fails() {
        let log = signed_log();
        assert!(matches!(
            log.export_audit_bundle("INV-404").await.unwrap_err(),
            AuditError::NoEvents(d) if d == "INV-404"
        ));
        assert!(matches!(
            log.create_bundle("INV-404", None).await.unwrap_err(),
            AuditError::Core(CoreError::EmptyTimeline)
        ));
    }

    #[tokio::test]
    async fn test_unsigned_export() {
        let log = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());
        log.append("INV-1", EventType::Note, json!({}), Actor::default())
            .await
            .unwrap();

        let bundle = log.export_audit_bundle("INV-1").await.unwrap();
        assert!(bundle.attestation.is_none());
        assert!(bundle.bundle_signature.is_none());

        let report = log.verify_bundle(&bundle, None);
        assert!(report.ok);
        assert_eq!(report.bundle_signature_verified, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_never_fork() {
        let log = AuditLog::new(MemoryStore::new(), AuditLogConfig::default());

        let mut handles = Vec::new();
        for worker in 0..8 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..10 {
                    loop {
                        match log
                            .append(
                                "INV-1",
                                EventType::Note,
                                json!({"worker": worker, "n": n}),
                                Actor::default(),
                            )
                            .await
                        {
                            Ok(_) => break,
                            Err(AuditError::Conflict { .. }) => tokio::task::yield_now().await,
                            Err(other) => panic!("unexpected error {:?}", other),
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let timeline = log.timeline("INV-1").await.unwrap();
        assert_eq!(timeline.len(), 80);
        assert!(verify_chain(&timeline).ok);
    }
}
