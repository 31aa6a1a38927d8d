//! Audit log configuration.

use wcaf_core::{Institution, PublicKey, SignatureAlgorithm, DEFAULT_SCHEMA_VERSION};

/// Configuration for the audit log.
#[derive(Debug, Clone)]
pub struct AuditLogConfig {
    /// Schema tag stamped on appended events.
    pub schema_version: String,
    /// Reject event types outside the known vocabulary.
    pub strict_event_types: bool,
    /// Algorithm used for attestations.
    pub signature_algorithm: SignatureAlgorithm,
    /// Institutional key for attestations and bundle signatures.
    pub institution: Option<Institution>,
    /// Key used to verify when the caller supplies none.
    pub public_key: Option<PublicKey>,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self {
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            strict_event_types: false,
            signature_algorithm: SignatureAlgorithm::default(),
            institution: None,
            public_key: None,
        }
    }
}

impl AuditLogConfig {
    /// Sign with `institution`, using its key's algorithm for attestations.
    pub fn with_institution(mut self, institution: Institution) -> Self {
        self.signature_algorithm = institution.algorithm();
        self.institution = Some(institution);
        self
    }

    pub fn with_public_key(mut self, public_key: PublicKey) -> Self {
        self.public_key = Some(public_key);
        self
    }

    pub fn with_strict_event_types(mut self, strict: bool) -> Self {
        self.strict_event_types = strict;
        self
    }

    pub fn with_schema_version(mut self, schema_version: impl Into<String>) -> Self {
        self.schema_version = schema_version.into();
        self
    }

    /// Default verification key: the explicit one, else the institution's own.
    pub fn verification_key(&self) -> Option<PublicKey> {
        self.public_key
            .clone()
            .or_else(|| self.institution.as_ref().map(Institution::public_key))
    }
}
