//! Multi-signature redeem scripts and unlocking script assembly
//!
//! Provides M-of-N P2SH redeem scripts where M signatures from N listed
//! public keys are required to spend funds.
//!
//! # Example
//!
//! ```ignore
//! use p2sh_multisig::multisig::{RedeemScript, SignatureCollector};
//!
//! // Create a 2-of-3 redeem script
//! let redeem = RedeemScript::new(2, vec![pubkey1, pubkey2, pubkey3])?;
//! println!("Fund this address: {}", redeem.address());
//!
//! // Collect signatures in any order
//! let mut collector = SignatureCollector::new(&redeem, sighash);
//! collector.add_signature(&secp, &pubkey3, signature3)?;
//! collector.add_signature(&secp, &pubkey1, signature1)?;
//!
//! // Unlocking script with signatures in key order
//! let script_sig = collector.finalize()?;
//! ```

pub mod assembler;
pub mod redeem;

pub use assembler::{multisig_unlock, SignatureCollector};
pub use redeem::{MultisigError, RedeemScript, MAX_PUBKEYS_PER_MULTISIG};
