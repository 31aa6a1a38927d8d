//! Institutional signing keys: RSA-SHA256 (PKCS#1 v1.5) and Ed25519.
//!
//! Keys are exchanged as PEM (PKCS#8 / SPKI, RSA also PKCS#1). Signatures
//! travel as standard base64. Verification never fails loudly: a malformed
//! key, a malformed signature or a key of the wrong type all read as
//! "not verified".

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};

/// RSA modulus size used when generating keys.
pub const DEFAULT_RSA_BITS: usize = 2048;

/// Signature algorithm of an attestation or bundle signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignatureAlgorithm {
    #[default]
    RsaSha256,
    Ed25519,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::RsaSha256 => "RSA-SHA256",
            SignatureAlgorithm::Ed25519 => "Ed25519",
        }
    }

    /// Resolve an algorithm name. Anything mentioning `ed25519` (any case)
    /// selects Ed25519; everything else is RSA-SHA256.
    pub fn from_name(name: &str) -> Self {
        if name.to_ascii_lowercase().contains("ed25519") {
            SignatureAlgorithm::Ed25519
        } else {
            SignatureAlgorithm::RsaSha256
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SignatureAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignatureAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// A private signing key.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(Box<RsaPrivateKey>),
    Ed25519(SigningKey),
}

impl PrivateKey {
    /// Generate a fresh key for the given algorithm.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self> {
        match algorithm {
            SignatureAlgorithm::RsaSha256 => Self::generate_rsa(DEFAULT_RSA_BITS),
            SignatureAlgorithm::Ed25519 => {
                Ok(PrivateKey::Ed25519(SigningKey::generate(&mut rand::thread_rng())))
            }
        }
    }

    /// Generate an RSA key with the given modulus size.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)
            .map_err(|e| CoreError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey::Rsa(Box::new(key)))
    }

    /// Deterministic Ed25519 key from a 32-byte seed.
    pub fn ed25519_from_seed(seed: &[u8; 32]) -> Self {
        PrivateKey::Ed25519(SigningKey::from_bytes(seed))
    }

    /// Parse a PEM private key (PKCS#8, or PKCS#1 for RSA).
    pub fn from_pem(pem: &str) -> Result<Self> {
        use rsa::pkcs1::DecodeRsaPrivateKey;
        use rsa::pkcs8::DecodePrivateKey;

        if pem.contains("BEGIN RSA PRIVATE KEY") {
            return RsaPrivateKey::from_pkcs1_pem(pem)
                .map(|k| PrivateKey::Rsa(Box::new(k)))
                .map_err(|e| CoreError::InvalidPrivateKey(e.to_string()));
        }

        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(PrivateKey::Rsa(Box::new(key)));
        }

        <SigningKey as ed25519_dalek::pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
            .map(PrivateKey::Ed25519)
            .map_err(|e| CoreError::InvalidPrivateKey(e.to_string()))
    }

    /// Encode as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<String> {
        match self {
            PrivateKey::Rsa(key) => {
                use rsa::pkcs8::EncodePrivateKey;
                key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
                    .map(|pem| pem.to_string())
                    .map_err(|e| CoreError::Encoding(e.to_string()))
            }
            PrivateKey::Ed25519(key) => {
                <SigningKey as ed25519_dalek::pkcs8::EncodePrivateKey>::to_pkcs8_pem(
                    key,
                    ed25519_dalek::pkcs8::spki::der::pem::LineEnding::LF,
                )
                .map(|pem| pem.to_string())
                .map_err(|e| CoreError::Encoding(e.to_string()))
            }
        }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            PrivateKey::Rsa(_) => SignatureAlgorithm::RsaSha256,
            PrivateKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            PrivateKey::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Sign a message with this key's own algorithm.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match self {
            PrivateKey::Rsa(key) => {
                let digest = Sha256::digest(message);
                key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
                    .map_err(|e| CoreError::SigningFailed(e.to_string()))
            }
            PrivateKey::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
        }
    }

    /// Sign a message, insisting the key matches `algorithm`.
    pub fn sign_with(&self, algorithm: SignatureAlgorithm, message: &[u8]) -> Result<Vec<u8>> {
        if self.algorithm() != algorithm {
            return Err(CoreError::KeyAlgorithmMismatch(algorithm.as_str()));
        }
        self.sign(message)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.algorithm())
    }
}

/// A public verification key.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    Ed25519(VerifyingKey),
}

impl PublicKey {
    /// Parse a PEM public key (SPKI, or PKCS#1 for RSA).
    pub fn from_pem(pem: &str) -> Result<Self> {
        use rsa::pkcs1::DecodeRsaPublicKey;
        use rsa::pkcs8::DecodePublicKey;

        if pem.contains("BEGIN RSA PUBLIC KEY") {
            return RsaPublicKey::from_pkcs1_pem(pem)
                .map(PublicKey::Rsa)
                .map_err(|e| CoreError::InvalidPublicKey(e.to_string()));
        }

        if let Ok(key) = RsaPublicKey::from_public_key_pem(pem) {
            return Ok(PublicKey::Rsa(key));
        }

        <VerifyingKey as ed25519_dalek::pkcs8::DecodePublicKey>::from_public_key_pem(pem)
            .map(PublicKey::Ed25519)
            .map_err(|e| CoreError::InvalidPublicKey(e.to_string()))
    }

    /// Encode as SPKI PEM.
    pub fn to_pem(&self) -> Result<String> {
        match self {
            PublicKey::Rsa(key) => {
                use rsa::pkcs8::EncodePublicKey;
                key.to_public_key_pem(rsa::pkcs8::LineEnding::LF)
                    .map_err(|e| CoreError::Encoding(e.to_string()))
            }
            PublicKey::Ed25519(key) => {
                <VerifyingKey as ed25519_dalek::pkcs8::EncodePublicKey>::to_public_key_pem(
                    key,
                    ed25519_dalek::pkcs8::spki::der::pem::LineEnding::LF,
                )
                .map_err(|e| CoreError::Encoding(e.to_string()))
            }
        }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self {
            PublicKey::Rsa(_) => SignatureAlgorithm::RsaSha256,
            PublicKey::Ed25519(_) => SignatureAlgorithm::Ed25519,
        }
    }

    /// Check a signature over `message` under `algorithm`.
    ///
    /// Returns `false` for any failure, including a key of the wrong type.
    pub fn verify(&self, algorithm: SignatureAlgorithm, message: &[u8], signature: &[u8]) -> bool {
        match (self, algorithm) {
            (PublicKey::Rsa(key), SignatureAlgorithm::RsaSha256) => {
                let digest = Sha256::digest(message);
                key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                    .is_ok()
            }
            (PublicKey::Ed25519(key), SignatureAlgorithm::Ed25519) => {
                match Ed25519Signature::from_slice(signature) {
                    Ok(sig) => key.verify(message, &sig).is_ok(),
                    Err(_) => false,
                }
            }
            _ => false,
        }
    }
}

/// Base64-encode signature bytes.
pub fn encode_signature(signature: &[u8]) -> String {
    BASE64.encode(signature)
}

/// Decode a base64 signature; `None` when malformed.
pub fn decode_signature(encoded: &str) -> Option<Vec<u8>> {
    BASE64.decode(encoded.trim()).ok()
}

/// A named institutional signing key.
#[derive(Debug, Clone)]
pub struct Institution {
    /// Identifier published alongside every signature.
    pub key_id: String,
    pub private_key: PrivateKey,
}

impl Institution {
    pub fn new(key_id: impl Into<String>, private_key: PrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            private_key,
        }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.private_key.algorithm()
    }

    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }
}
