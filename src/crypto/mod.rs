//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256, double SHA-256 and HASH160
//! - Base58Check encoding and P2PKH/P2SH addresses
//! - ECDSA key management (secp256k1) with WIF import/export

pub mod address;
pub mod hash;
pub mod keys;

pub use address::{base58check_decode, base58check_encode, Address, AddressError};
pub use hash::{double_sha256, hash160, sha256};
pub use keys::{public_key_from_hex, public_key_to_address, KeyError, KeyPair};
