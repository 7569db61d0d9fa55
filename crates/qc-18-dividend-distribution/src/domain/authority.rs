//! # Round-Controller Authority
//!
//! Start/Apply/Done skip the ledger's usual signature, sequence and fee
//! checks. They are authorized solely by an Ed25519 signature from the
//! operator-configured round-controller key.
//!
//! ## Security Properties
//!
//! - Deterministic signatures (no RNG dependency)
//! - Missing key, malformed key and mismatched signature are hard rejections

use super::errors::DividendError;
use super::instruction::RoundInstruction;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Instruction plus the controller's signature over its canonical bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedInstruction {
    pub instruction: RoundInstruction,
    /// 64-byte Ed25519 signature. Empty when unsigned.
    pub signature: Vec<u8>,
}

impl SignedInstruction {
    pub fn unsigned(instruction: RoundInstruction) -> Self {
        Self {
            instruction,
            signature: Vec::new(),
        }
    }
}

/// Verifying half of the round-controller key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerKey([u8; 32]);

impl ControllerKey {
    /// Create from bytes, rejecting points that are not valid keys.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, DividendError> {
        VerifyingKey::from_bytes(&bytes)
            .map_err(|_| DividendError::Unauthorized("invalid controller public key".into()))?;
        Ok(Self(bytes))
    }

    /// Parse a hex-encoded key from configuration.
    pub fn from_hex(encoded: &str) -> Result<Self, DividendError> {
        let raw = hex::decode(encoded.trim())
            .map_err(|e| DividendError::Unauthorized(format!("controller key is not hex: {e}")))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|_| {
            DividendError::Unauthorized("controller key must be 32 bytes".into())
        })?;
        Self::from_bytes(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verify that `signed` was produced by this key.
    pub fn verify(&self, signed: &SignedInstruction) -> Result<(), DividendError> {
        if signed.signature.is_empty() {
            return Err(DividendError::Unauthorized(format!(
                "{} instruction carries no signature",
                signed.instruction.kind()
            )));
        }
        let bytes: [u8; 64] = signed.signature.as_slice().try_into().map_err(|_| {
            DividendError::Unauthorized(format!(
                "signature must be 64 bytes, got {}",
                signed.signature.len()
            ))
        })?;

        let verifying_key = VerifyingKey::from_bytes(&self.0)
            .map_err(|_| DividendError::Unauthorized("invalid controller public key".into()))?;
        let signature = Signature::from_bytes(&bytes);

        verifying_key
            .verify(&signed.instruction.encode(), &signature)
            .map_err(|_| {
                DividendError::Unauthorized(format!(
                    "{} instruction for ledger {} not signed by the round controller",
                    signed.instruction.kind(),
                    signed.instruction.ledger_seq()
                ))
            })
    }
}

/// Signing half, held by the round submitter.
pub struct ControllerKeypair {
    signing_key: SigningKey,
}

impl ControllerKeypair {
    /// Create from secret seed (32 bytes).
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> ControllerKey {
        ControllerKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, instruction: RoundInstruction) -> SignedInstruction {
        let signature = self.signing_key.sign(&instruction.encode());
        SignedInstruction {
            instruction,
            signature: signature.to_bytes().to_vec(),
        }
    }
}
