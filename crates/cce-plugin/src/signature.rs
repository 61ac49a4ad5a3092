//! Signature verification for pulled plugin artifacts.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};

use crate::error::{Error, Result};

/// A detached signature over an artifact's bytes, as delivered by a
/// registry alongside the artifact.
#[derive(Debug, Clone)]
pub struct Signature {
    /// The claimed signer's identity (e.g. a key fingerprint or email).
    pub signer: String,
    /// Raw Ed25519 signature bytes.
    pub bytes: [u8; 64],
    /// When the registry reports this signature as issued.
    pub signed_at: DateTime<Utc>,
}

/// Identity and timing of a successfully verified signature, reported
/// to the logs per policy.
#[derive(Debug, Clone)]
pub struct SignerInfo {
    /// The verified signer.
    pub signer: String,
    /// When the signature was issued.
    pub timestamp: DateTime<Utc>,
}

/// Verifies a detached signature against a known public key.
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` over `artifact`. Returns the signer info on
    /// success.
    fn verify(&self, artifact: &[u8], signature: &Signature) -> Result<SignerInfo>;
}

/// Verifies Ed25519 signatures against a single trusted public key.
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Construct a verifier trusting `key`.
    #[must_use]
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, artifact: &[u8], signature: &Signature) -> Result<SignerInfo> {
        let sig = Ed25519Signature::from_bytes(&signature.bytes);
        self.key
            .verify(artifact, &sig)
            .map_err(|e| Error::SignatureInvalid(signature.signer.clone(), e.to_string()))?;
        Ok(SignerInfo {
            signer: signature.signer.clone(),
            timestamp: signature.signed_at,
        })
    }
}

/// Always rejects. The safe default when no trusted key has been
/// configured but policy requires signed artifacts.
pub struct RejectAllVerifier;

impl SignatureVerifier for RejectAllVerifier {
    fn verify(&self, _artifact: &[u8], signature: &Signature) -> Result<SignerInfo> {
        Err(Error::SignatureInvalid(
            signature.signer.clone(),
            "no trusted signing key is configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn valid_signature_verifies() {
        let signing = signing_key();
        let artifact = b"bytecode";
        let sig = signing.sign(artifact);
        let verifier = Ed25519Verifier::new(signing.verifying_key());

        let signature = Signature {
            signer: "ci@example.com".to_string(),
            bytes: sig.to_bytes(),
            signed_at: Utc::now(),
        };
        let info = verifier.verify(artifact, &signature).unwrap();
        assert_eq!(info.signer, "ci@example.com");
    }

    #[test]
    fn tampered_artifact_fails_verification() {
        let signing = signing_key();
        let sig = signing.sign(b"bytecode");
        let verifier = Ed25519Verifier::new(signing.verifying_key());

        let signature = Signature {
            signer: "ci@example.com".to_string(),
            bytes: sig.to_bytes(),
            signed_at: Utc::now(),
        };
        assert!(verifier.verify(b"different bytecode", &signature).is_err());
    }

    #[test]
    fn reject_all_always_fails() {
        let signature = Signature {
            signer: "ci@example.com".to_string(),
            bytes: [0u8; 64],
            signed_at: Utc::now(),
        };
        assert!(RejectAllVerifier.verify(b"x", &signature).is_err());
    }
}
