//! Core transaction components
//!
//! This module contains the fundamental building blocks:
//! - Script (P2PKH and P2SH templates, minimal pushes, instruction parsing)
//! - Transactions (legacy wire format)
//! - Signature hashing and low-S DER signatures
//! - Input verification for P2PKH and P2SH multisig spends

pub mod script;
pub mod sighash;
pub mod transaction;
pub mod verify;

pub use script::{Script, ScriptBuilder, ScriptError};
pub use sighash::{
    sign_hash, sign_input, signature_hash, SigHashType, SignatureError, TransactionSignature,
};
pub use transaction::{
    OutPoint, Transaction, TransactionError, TxIn, TxOut, DEFAULT_LOCKTIME, SEQUENCE_FINAL,
    TX_VERSION,
};
pub use verify::{verify_input, VerifyError};
