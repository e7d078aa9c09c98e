//! P2SH-Multisig: an offline builder and signer for Bitcoin M-of-N
//! pay-to-script-hash transactions
//!
//! This crate provides:
//! - Key generation with WIF import/export (secp256k1)
//! - Base58Check P2PKH and P2SH addresses
//! - Script templates and multisig redeem scripts
//! - Legacy transaction serialization and signature hashing
//! - Low-S DER signing and input verification
//! - Funding and spending transaction builders
//!
//! # Example
//!
//! ```rust
//! use p2sh_multisig::crypto::KeyPair;
//! use p2sh_multisig::multisig::RedeemScript;
//! use secp256k1::Secp256k1;
//!
//! let secp = Secp256k1::new();
//! let keys: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate(&secp).unwrap()).collect();
//!
//! // Create a 2-of-3 redeem script
//! let redeem = RedeemScript::new(2, keys.iter().map(|k| k.public_key).collect()).unwrap();
//! println!("Fund this address: {}", redeem.address());
//! ```

pub mod cli;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod wallet;

// Re-export commonly used types
pub use core::{Script, Transaction, TransactionSignature};
pub use crypto::{Address, KeyPair};
pub use multisig::{RedeemScript, SignatureCollector};
pub use wallet::{build_funding_transaction, build_spending_transaction, InputRef};
