//! Base58Check address encoding
//!
//! Addresses are `version || payload || checksum` where the checksum is the
//! first four bytes of the double SHA-256 of `version || payload`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::hash::double_sha256;
use crate::core::script::{Script, ScriptError};

/// Mainnet pay-to-pubkey-hash version byte (addresses start with '1')
pub const P2PKH_VERSION: u8 = 0x00;

/// Mainnet pay-to-script-hash version byte (addresses start with '3')
pub const P2SH_VERSION: u8 = 0x05;

/// Mainnet Wallet Import Format version byte
pub const WIF_VERSION: u8 = 0x80;

/// Length of the Base58Check checksum
const CHECKSUM_LEN: usize = 4;

/// Errors that can occur while decoding addresses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid Base58 encoding: {0}")]
    InvalidEncoding(String),
    #[error("Invalid Base58Check checksum")]
    InvalidChecksum,
    #[error("Base58Check data too short: {0} bytes")]
    TooShort(usize),
    #[error("Invalid address payload length: {0} bytes (expected 20)")]
    InvalidLength(usize),
    #[error("Unsupported address version byte: 0x{0:02x}")]
    UnsupportedVersion(u8),
}

fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = double_sha256(data);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a version byte and payload as a Base58Check string
pub fn base58check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
    data.push(version);
    data.extend_from_slice(payload);
    let check = checksum(&data);
    data.extend_from_slice(&check);
    bs58::encode(data).into_string()
}

/// Decode a Base58Check string into its version byte and payload
pub fn base58check_decode(encoded: &str) -> Result<(u8, Vec<u8>), AddressError> {
    let data = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

    if data.len() < 1 + CHECKSUM_LEN {
        return Err(AddressError::TooShort(data.len()));
    }

    let (body, check) = data.split_at(data.len() - CHECKSUM_LEN);
    if checksum(body) != check {
        return Err(AddressError::InvalidChecksum);
    }

    Ok((body[0], body[1..].to_vec()))
}

/// A mainnet address this tool can pay to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Pay to public key hash
    P2pkh([u8; 20]),
    /// Pay to script hash
    P2sh([u8; 20]),
}

impl Address {
    /// The 20-byte hash committed to by this address
    pub fn hash(&self) -> &[u8; 20] {
        match self {
            Address::P2pkh(hash) | Address::P2sh(hash) => hash,
        }
    }

    /// The Base58Check version byte of this address
    pub fn version(&self) -> u8 {
        match self {
            Address::P2pkh(_) => P2PKH_VERSION,
            Address::P2sh(_) => P2SH_VERSION,
        }
    }

    pub fn is_p2sh(&self) -> bool {
        matches!(self, Address::P2sh(_))
    }

    /// Locking script that pays to this address
    pub fn script_pubkey(&self) -> Result<Script, ScriptError> {
        match self {
            Address::P2pkh(hash) => Script::p2pkh_lock(hash),
            Address::P2sh(hash) => Script::p2sh_lock(hash),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version, payload) = base58check_decode(s)?;
        let hash: [u8; 20] = payload
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(payload.len()))?;

        match version {
            P2PKH_VERSION => Ok(Address::P2pkh(hash)),
            P2SH_VERSION => Ok(Address::P2sh(hash)),
            other => Err(AddressError::UnsupportedVersion(other)),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base58check_encode(self.version(), self.hash()))
    }
}
