//!
//! Signature verification of texture payloads against an issuer public key.
//!
//! A payload is accepted only if
//! 1. its texture value is base64 that decodes to a JSON object,
//! 2. its signature is valid base64,
//! 3. the signature verifies over the UTF-8 bytes of the texture value.
//!
//! Every failure, including malformed input, is reported as `false`.
//!

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::Verifier as _;
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};

use crate::TexturePayload;

#[derive(thiserror::Error, Debug)]
pub enum KeyError {
    #[error("invalid RSA public key: {0}")]
    Rsa(String),
    #[error("invalid Ed25519 public key: {0}")]
    Ed25519(String),
}

/// Checks payload signatures for one issuer.
pub trait TextureVerifier: Send + Sync {
    fn verify(&self, payload: &TexturePayload) -> bool;
}

/// Decodes the signature bytes if the payload is well formed.
fn signature_bytes(payload: &TexturePayload) -> Option<Vec<u8>> {
    let document = STANDARD.decode(payload.texture().as_bytes()).ok()?;
    match serde_json::from_slice::<serde_json::Value>(&document) {
        Ok(serde_json::Value::Object(_)) => {}
        _ => return None,
    }
    if payload.signature().is_empty() {
        return None;
    }
    STANDARD.decode(payload.signature().as_bytes()).ok()
}

/// RSA PKCS#1 v1.5 / SHA-1 verifier, the scheme of the Mojang session server.
#[derive(Debug, Clone)]
pub struct YggdrasilVerifier {
    key: RsaPublicKey,
}

impl YggdrasilVerifier {
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Parse a PEM encoded SubjectPublicKeyInfo.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPublicKey::from_public_key_pem(pem.trim())
            .map(Self::new)
            .map_err(|e| KeyError::Rsa(e.to_string()))
    }

    /// Parse a DER encoded SubjectPublicKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        RsaPublicKey::from_public_key_der(der)
            .map(Self::new)
            .map_err(|e| KeyError::Rsa(e.to_string()))
    }
}

impl TextureVerifier for YggdrasilVerifier {
    fn verify(&self, payload: &TexturePayload) -> bool {
        let Some(sig_bytes) = signature_bytes(payload) else {
            return false;
        };
        let hashed = Sha1::digest(payload.texture().as_bytes());
        self.key
            .verify(Pkcs1v15Sign::new::<Sha1>(), &hashed, &sig_bytes)
            .is_ok()
    }
}

/// Ed25519 verifier for providers that sign textures with an Ed25519 key.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: ed25519_dalek::VerifyingKey,
}

impl Ed25519Verifier {
    pub fn new(key: ed25519_dalek::VerifyingKey) -> Self {
        Self { key }
    }

    /// Parse a hex encoded 32 byte public key.
    pub fn from_hex(value: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(value.trim()).map_err(|e| KeyError::Ed25519(e.to_string()))?;
        let bytes: [u8; ed25519_dalek::PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| KeyError::Ed25519(format!("expected 32 bytes, got {}", b.len())))?;
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self::new)
            .map_err(|e| KeyError::Ed25519(e.to_string()))
    }
}

impl TextureVerifier for Ed25519Verifier {
    fn verify(&self, payload: &TexturePayload) -> bool {
        let Some(sig_bytes) = signature_bytes(payload) else {
            return false;
        };
        let Ok(signature) = ed25519_dalek::Signature::from_slice(&sig_bytes) else {
            return false;
        };
        self.key
            .verify(payload.texture().as_bytes(), &signature)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers to produce correctly signed payloads in tests.

    use base64::{engine::general_purpose::STANDARD, Engine};
    use ed25519_dalek::{Signer, SigningKey};

    use super::Ed25519Verifier;
    use crate::TexturePayload;

    pub fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    pub fn verifier() -> Ed25519Verifier {
        Ed25519Verifier::new(signing_key().verifying_key())
    }

    /// Encodes `name` into a textures document and signs it.
    pub fn signed_payload(key: &SigningKey, name: &str) -> TexturePayload {
        let document = serde_json::json!({
            "timestamp": 0,
            "profileId": name,
            "profileName": name,
            "signatureRequired": true,
            "textures": {}
        });
        let texture = STANDARD.encode(document.to_string());
        let signature = STANDARD.encode(key.sign(texture.as_bytes()).to_bytes());
        TexturePayload::new(texture, signature)
    }
}
