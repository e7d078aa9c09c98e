//! Signature hashing and ECDSA transaction signatures
//!
//! Implements the legacy signature hash: the transaction is serialized with
//! every input script blanked except the one being signed, which carries the
//! script being satisfied (the previous P2PKH scriptPubKey, or the redeem
//! script for a P2SH input). The 4-byte hash type is appended and the result
//! double SHA-256 hashed.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, Signing, Verification};
use thiserror::Error;

use super::script::Script;
use super::transaction::{Transaction, TransactionError};
use crate::crypto::double_sha256;

// =============================================================================
// Signature Hash Types
// =============================================================================

/// Signature hash type determines what parts of the transaction are signed
///
/// Only SIGHASH_ALL is produced by this tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SigHashType {
    /// Sign all inputs and all outputs
    #[default]
    All = 0x01,
}

impl SigHashType {
    /// Parse sighash type from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SigHashType::All),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Little-endian 4-byte form appended to the preimage
    pub fn to_u32_le_bytes(self) -> [u8; 4] {
        (self as u32).to_le_bytes()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Signing and signature parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Empty signature")]
    Empty,
    #[error("Unsupported sighash type: 0x{0:02x}")]
    UnsupportedSigHashType(u8),
    #[error("Invalid DER signature")]
    InvalidDer,
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

// =============================================================================
// Signature Hash
// =============================================================================

/// Compute the signature hash for `input_index` with `script_code` substituted
/// as its unlocking script
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    sighash_type: SigHashType,
) -> Result<[u8; 32], TransactionError> {
    let count = tx.inputs.len();
    if input_index >= count {
        return Err(TransactionError::InputIndexOutOfRange {
            index: input_index,
            count,
        });
    }

    let mut preimage_tx = tx.clone();
    for (i, input) in preimage_tx.inputs.iter_mut().enumerate() {
        input.script_sig = if i == input_index {
            script_code.clone()
        } else {
            Script::new()
        };
    }

    let mut preimage = preimage_tx.serialize();
    preimage.extend_from_slice(&sighash_type.to_u32_le_bytes());

    let hash = double_sha256(&preimage);
    log::debug!(
        "sighash for input {} ({} byte preimage): {}",
        input_index,
        preimage.len(),
        hex::encode(hash)
    );
    Ok(hash)
}

// =============================================================================
// Transaction Signature
// =============================================================================

/// An ECDSA signature together with its sighash type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSignature {
    pub signature: Signature,
    pub sighash_type: SigHashType,
}

impl TransactionSignature {
    /// DER signature followed by the sighash type byte, as embedded in scripts
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.signature.serialize_der().to_vec();
        bytes.push(self.sighash_type.to_byte());
        bytes
    }

    /// Parse a script-embedded signature (DER plus sighash type byte)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let (type_byte, der) = bytes.split_last().ok_or(SignatureError::Empty)?;
        let sighash_type = SigHashType::from_byte(*type_byte)
            .ok_or(SignatureError::UnsupportedSigHashType(*type_byte))?;
        let signature = Signature::from_der(der).map_err(|_| SignatureError::InvalidDer)?;
        Ok(Self {
            signature,
            sighash_type,
        })
    }

    /// Check this signature against a signature hash and public key
    pub fn verify<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        sighash: &[u8; 32],
        public_key: &PublicKey,
    ) -> bool {
        match Message::from_digest_slice(sighash) {
            Ok(message) => secp.verify_ecdsa(&message, &self.signature, public_key).is_ok(),
            Err(_) => false,
        }
    }
}

/// Sign a signature hash, producing a low-S signature
pub fn sign_hash<C: Signing>(
    secp: &Secp256k1<C>,
    sighash: &[u8; 32],
    secret_key: &SecretKey,
    sighash_type: SigHashType,
) -> Result<TransactionSignature, secp256k1::Error> {
    let message = Message::from_digest_slice(sighash)?;
    let mut signature = secp.sign_ecdsa(&message, secret_key);
    signature.normalize_s();
    Ok(TransactionSignature {
        signature,
        sighash_type,
    })
}

/// Compute the signature hash for an input and sign it
pub fn sign_input<C: Signing>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    secret_key: &SecretKey,
) -> Result<TransactionSignature, SignatureError> {
    let sighash = signature_hash(tx, input_index, script_code, SigHashType::All)?;
    Ok(sign_hash(secp, &sighash, secret_key, SigHashType::All)?)
}

// =============================================================================
// Tests
// =============================================================================
