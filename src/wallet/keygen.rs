//! Batch key generation

use secp256k1::{Secp256k1, Signing};
use serde::Serialize;

use super::WalletError;
use crate::crypto::KeyPair;

/// Upper bound on keys generated per invocation
pub const MAX_KEY_COUNT: usize = 100;

/// A generated key in its exported forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRecord {
    /// Private key in Wallet Import Format
    pub private_key: String,
    /// Compressed public key (hex)
    pub public_key: String,
    /// P2PKH address of the compressed public key
    pub address: String,
}

impl From<&KeyPair> for KeyRecord {
    fn from(key: &KeyPair) -> Self {
        Self {
            private_key: key.to_wif(),
            public_key: key.public_key_hex(),
            address: key.address().to_string(),
        }
    }
}

/// Generate `count` fresh keys
///
/// Fails before generating anything when `count` is outside
/// `1..=MAX_KEY_COUNT`.
pub fn generate_key_records<C: Signing>(
    secp: &Secp256k1<C>,
    count: usize,
) -> Result<Vec<KeyRecord>, WalletError> {
    if !(1..=MAX_KEY_COUNT).contains(&count) {
        return Err(WalletError::InvalidKeyCount {
            count,
            max: MAX_KEY_COUNT,
        });
    }

    let records = (0..count)
        .map(|_| KeyPair::generate(secp).map(|key| KeyRecord::from(&key)))
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("Generated {} key(s)", records.len());
    Ok(records)
}
