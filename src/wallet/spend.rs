//! Spending a P2SH multisig output

use secp256k1::{Secp256k1, Signing, Verification};

use super::{check_amount, InputRef, WalletError};
use crate::core::sighash::{sign_hash, signature_hash, SigHashType};
use crate::core::verify::verify_input;
use crate::core::{Script, Transaction, TxIn, TxOut};
use crate::crypto::{Address, KeyPair};
use crate::multisig::{MultisigError, RedeemScript, SignatureCollector};

/// Build a transaction spending a P2SH multisig output to `destination`
///
/// Every signer signs the same sighash (redeem script substituted for the
/// input script). Signatures are placed by each signer's position in the
/// redeem script, so `signers` may be given in any order, and the result is
/// verified against the P2SH locking script before it is returned.
pub fn build_spending_transaction<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    signers: &[KeyPair],
    redeem: &RedeemScript,
    input: &InputRef,
    amount: u64,
    destination: &Address,
) -> Result<Transaction, WalletError> {
    check_amount(amount, input)?;

    for (i, signer) in signers.iter().enumerate() {
        if signers[..i].iter().any(|s| s.public_key == signer.public_key) {
            return Err(MultisigError::DuplicateSigner(signer.public_key_hex()).into());
        }
    }

    let unsigned = Transaction::single(
        TxIn::new(input.outpoint, Script::new()),
        TxOut {
            value: amount,
            script_pubkey: destination.script_pubkey()?,
        },
    );

    let sighash = signature_hash(&unsigned, 0, redeem.script(), SigHashType::All)?;
    let mut collector = SignatureCollector::new(redeem, sighash);
    for signer in signers {
        let signature = sign_hash(secp, &sighash, &signer.secret_key, SigHashType::All)?;
        collector.add_signature(secp, &signer.public_key, signature)?;
    }

    log::debug!(
        "Collected {} signature(s) at redeem script positions {:?}",
        collector.signature_count(),
        collector.signed_positions()
    );
    let unlock = collector.finalize()?;
    let signed = unsigned.with_script_sig(0, unlock)?;

    verify_input(secp, &signed, 0, &redeem.script_pubkey()?)?;
    log::info!(
        "Spent {} output {} to {} ({} satoshis), txid {}",
        redeem.description(),
        input.outpoint.display_txid(),
        destination,
        amount,
        signed.txid()
    );
    Ok(signed)
}
