//! ECDSA key management
//!
//! Provides key pair generation, WIF import/export and compressed public key
//! handling on the secp256k1 curve. Every function takes the signing context
//! explicitly; callers create one `Secp256k1` at startup and pass it down.

use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey, Signing};
use thiserror::Error;

use super::address::{base58check_decode, base58check_encode, Address, WIF_VERSION};
use super::hash::hash160;

/// Length of a compressed SEC1 public key
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// WIF suffix marking a key whose public key is used in compressed form
const WIF_COMPRESSION_FLAG: u8 = 0x01;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid WIF: {0}")]
    InvalidWif(String),
    #[error("Entropy source failed: {0}")]
    Entropy(#[from] rand::Error),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair from the operating system's CSPRNG
    ///
    /// Draws are redrawn until they fall in `[1, n-1]`.
    pub fn generate<C: Signing>(secp: &Secp256k1<C>) -> Result<Self, KeyError> {
        let mut bytes = [0u8; 32];
        loop {
            OsRng.try_fill_bytes(&mut bytes)?;
            if let Ok(secret_key) = SecretKey::from_slice(&bytes) {
                return Ok(Self::from_secret_key(secp, secret_key));
            }
            log::debug!("Discarded out-of-range private key draw");
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key<C: Signing>(secp: &Secp256k1<C>, secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from raw 32-byte private key material
    pub fn from_secret_bytes<C: Signing>(
        secp: &Secp256k1<C>,
        bytes: &[u8],
    ) -> Result<Self, KeyError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secp, secret_key))
    }

    /// Import a key pair from Wallet Import Format
    ///
    /// Accepts both the bare 32-byte form and the form carrying the trailing
    /// compression flag; the public key is always used compressed.
    pub fn from_wif<C: Signing>(secp: &Secp256k1<C>, wif: &str) -> Result<Self, KeyError> {
        let (version, payload) =
            base58check_decode(wif).map_err(|e| KeyError::InvalidWif(e.to_string()))?;

        if version != WIF_VERSION {
            return Err(KeyError::InvalidWif(format!(
                "unexpected version byte 0x{:02x}",
                version
            )));
        }

        let secret = match payload.len() {
            32 => &payload[..],
            33 if payload[32] == WIF_COMPRESSION_FLAG => &payload[..32],
            len => {
                return Err(KeyError::InvalidWif(format!(
                    "unexpected payload length {}",
                    len
                )))
            }
        };

        Self::from_secret_bytes(secp, secret)
    }

    /// Export the private key in Wallet Import Format (version 0x80, 32 bytes)
    pub fn to_wif(&self) -> String {
        base58check_encode(WIF_VERSION, &self.secret_key.secret_bytes())
    }

    /// Get the public key in 33-byte compressed form
    pub fn public_key_bytes(&self) -> [u8; COMPRESSED_PUBKEY_LEN] {
        self.public_key.serialize()
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Hash160 of the compressed public key
    pub fn public_key_hash(&self) -> [u8; 20] {
        hash160(&self.public_key.serialize())
    }

    /// Pay-to-pubkey-hash address of this key pair
    pub fn address(&self) -> Address {
        public_key_to_address(&self.public_key)
    }
}

/// Convert a public key to its mainnet P2PKH address
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    Address::P2pkh(hash160(&public_key.serialize()))
}

/// Parse a compressed public key from hex
///
/// Only the 33-byte compressed encoding is accepted; the point must lie on
/// the curve.
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| KeyError::InvalidPublicKey(format!("{}: {}", hex_key, e)))?;

    if bytes.len() != COMPRESSED_PUBKEY_LEN || !matches!(bytes[0], 0x02 | 0x03) {
        return Err(KeyError::InvalidPublicKey(format!(
            "{}: expected 33-byte compressed key",
            hex_key
        )));
    }

    PublicKey::from_slice(&bytes)
        .map_err(|_| KeyError::InvalidPublicKey(format!("{}: not on curve", hex_key)))
}
