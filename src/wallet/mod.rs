//! Wallet operations: key generation and end-to-end transaction building
//!
//! The builders take exactly one previous output and produce exactly one
//! output; whatever the input holds beyond `amount` is left as the miner fee.

pub mod fund;
pub mod keygen;
pub mod spend;

use thiserror::Error;

use crate::core::{OutPoint, ScriptError, SignatureError, TransactionError, VerifyError};
use crate::crypto::KeyError;
use crate::multisig::MultisigError;

pub use fund::build_funding_transaction;
pub use keygen::{generate_key_records, KeyRecord, MAX_KEY_COUNT};
pub use spend::build_spending_transaction;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: amount {amount} exceeds input value {available}")]
    InsufficientFunds { amount: u64, available: u64 },
    #[error("Destination must be a P2SH address, got {0}")]
    WrongAddressType(String),
    #[error("Key count must be between 1 and {max}, got {count}")]
    InvalidKeyCount { count: usize, max: usize },
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Script error: {0}")]
    ScriptError(#[from] ScriptError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Signature error: {0}")]
    SignatureError(#[from] SignatureError),
    #[error("Multisig error: {0}")]
    MultisigError(#[from] MultisigError),
    #[error("Verification failed: {0}")]
    VerifyError(#[from] VerifyError),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// The previous output being spent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRef {
    pub outpoint: OutPoint,
    /// Value of the referenced output in satoshis, when known
    pub value: Option<u64>,
}

impl InputRef {
    /// Reference output `vout` of the transaction with display hash `txid_hex`
    pub fn new(txid_hex: &str, vout: u32) -> Result<Self, WalletError> {
        Ok(Self {
            outpoint: OutPoint::from_display_hex(txid_hex, vout)?,
            value: None,
        })
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = Some(value);
        self
    }
}

/// Check the spend amount against the input and log the implied fee
fn check_amount(amount: u64, input: &InputRef) -> Result<(), WalletError> {
    if amount == 0 {
        return Err(WalletError::InvalidAmount(
            "amount must be greater than zero".into(),
        ));
    }

    if let Some(available) = input.value {
        if amount > available {
            return Err(WalletError::InsufficientFunds { amount, available });
        }
        log::info!(
            "Spending {} of {} satoshis, implied fee {}",
            amount,
            available,
            available - amount
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> InputRef {
        InputRef::new(&"cd".repeat(32), 0).unwrap()
    }

    #[test]
    fn test_input_ref() {
        let input = InputRef::new(&"cd".repeat(32), 3).unwrap().with_value(1_000);
        assert_eq!(input.outpoint.vout, 3);
        assert_eq!(input.outpoint.display_txid(), "cd".repeat(32));
        assert_eq!(input.value, Some(1_000));

        assert!(matches!(
            InputRef::new("abcd", 0),
            Err(WalletError::TransactionError(TransactionError::InvalidTxid(_)))
        ));
    }

    #[test]
    fn test_check_amount() {
        assert!(matches!(
            check_amount(0, &input()),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(check_amount(1, &input()).is_ok());
        assert!(check_amount(500, &input().with_value(500)).is_ok());
        assert!(matches!(
            check_amount(501, &input().with_value(500)),
            Err(WalletError::InsufficientFunds {
                amount: 501,
                available: 500
            })
        ));
    }
}
