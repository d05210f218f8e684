//! Ed25519 weight grants.
//!
//! A weight grant lets a stakeholder raise its own weight without the owner
//! touching the ledger. The authority signs a digest committing to:
//! - the domain separator [`WEIGHT_GRANT_DOMAIN`]
//! - the ledger's token account
//! - the subject address
//! - the granted weight (little-endian u64)
//!
//! The 64-byte signature is the proof handed to `increase_weight`.

use ed25519_dalek::{Signer, Verifier};
use std::fmt;

use crate::constants::WEIGHT_GRANT_DOMAIN;
use crate::traits::WeightAuthorizer;
use crate::types::Address;

/// Digest signed by a weight grant.
pub fn weight_grant_message(ledger: &Address, subject: &Address, weight: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(WEIGHT_GRANT_DOMAIN);
    hasher.update(ledger.as_bytes());
    hasher.update(subject.as_bytes());
    hasher.update(&weight.to_le_bytes());
    *hasher.finalize().as_bytes()
}

/// Digest identifying a proof, used to reject replays.
pub fn proof_digest(proof: &[u8]) -> [u8; 32] {
    *blake3::hash(proof).as_bytes()
}

/// Holder of the grant-signing key.
pub struct GrantSigner {
    signing_key: ed25519_dalek::SigningKey,
}

impl GrantSigner {
    /// Create a signer from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    /// The authorizer that accepts this signer's grants.
    pub fn authorizer(&self) -> Ed25519Authorizer {
        Ed25519Authorizer {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Sign a grant of `weight` to `subject` on `ledger`.
    pub fn sign_grant(&self, ledger: &Address, subject: &Address, weight: u64) -> [u8; 64] {
        let msg = weight_grant_message(ledger, subject, weight);
        self.signing_key.sign(&msg).to_bytes()
    }
}

impl fmt::Debug for GrantSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantSigner")
            .field("verifying_key", &hex::encode(self.signing_key.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verifies grants against a fixed Ed25519 public key.
#[derive(Clone, Debug)]
pub struct Ed25519Authorizer {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl Ed25519Authorizer {
    /// Build an authorizer from a 32-byte public key. Returns `None` if the
    /// bytes are not a valid curve point.
    pub fn from_public_bytes(bytes: &[u8; 32]) -> Option<Self> {
        ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .ok()
            .map(|verifying_key| Self { verifying_key })
    }

    /// Raw public key bytes.
    pub fn public_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }
}

impl WeightAuthorizer for Ed25519Authorizer {
    fn verify(&self, ledger: &Address, subject: &Address, weight: u64, proof: &[u8]) -> bool {
        let Ok(sig_bytes) = <[u8; 64]>::try_from(proof) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        let msg = weight_grant_message(ledger, subject, weight);
        self.verifying_key.verify(&msg, &sig).is_ok()
    }
}
