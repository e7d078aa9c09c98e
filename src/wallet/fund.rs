//! Funding a P2SH address from a single-key P2PKH output

use secp256k1::{Secp256k1, Signing, Verification};

use super::{check_amount, InputRef, WalletError};
use crate::core::sighash::sign_input;
use crate::core::verify::verify_input;
use crate::core::{Script, Transaction, TxIn, TxOut};
use crate::crypto::{Address, KeyPair};

/// Build and sign a transaction moving `amount` from the funder's P2PKH
/// output to the P2SH `destination`
///
/// The signed transaction is verified against the funder's locking script
/// before it is returned.
pub fn build_funding_transaction<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    funder: &KeyPair,
    input: &InputRef,
    amount: u64,
    destination: &Address,
) -> Result<Transaction, WalletError> {
    if !destination.is_p2sh() {
        return Err(WalletError::WrongAddressType(destination.to_string()));
    }
    check_amount(amount, input)?;

    let funder_lock = funder.address().script_pubkey()?;
    let unsigned = Transaction::single(
        TxIn::new(input.outpoint, funder_lock.clone()),
        TxOut {
            value: amount,
            script_pubkey: destination.script_pubkey()?,
        },
    );

    let signature = sign_input(secp, &unsigned, 0, &funder_lock, &funder.secret_key)?;
    let signed = unsigned.with_script_sig(0, Script::p2pkh_unlock(&signature, &funder.public_key))?;

    verify_input(secp, &signed, 0, &funder_lock)?;
    log::info!(
        "Funded {} with {} satoshis from {}, txid {}",
        destination,
        amount,
        funder.address(),
        signed.txid()
    );
    Ok(signed)
}
