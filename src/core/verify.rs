//! Script verification for P2PKH and P2SH multisig inputs
//!
//! Checks a signed input against the locking script it spends, evaluating
//! the two templates this tool produces rather than running a general
//! script interpreter.

use secp256k1::{PublicKey, Secp256k1, Verification};
use thiserror::Error;

use super::script::{Script, ScriptError};
use super::sighash::{signature_hash, SignatureError, TransactionSignature};
use super::transaction::{Transaction, TransactionError};
use crate::crypto::hash160;
use crate::multisig::{MultisigError, RedeemScript};

/// Verification failures
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Unsupported locking script: {0}")]
    UnsupportedScriptPubKey(String),
    #[error("Unlocking script is not push-only")]
    NotPushOnly,
    #[error("Malformed unlocking script: {0}")]
    MalformedScriptSig(String),
    #[error("Invalid public key in unlocking script")]
    InvalidPublicKey,
    #[error("Public key does not match the locking script hash")]
    PubKeyHashMismatch,
    #[error("Redeem script does not match the locking script hash")]
    ScriptHashMismatch,
    #[error("Invalid redeem script: {0}")]
    InvalidRedeemScript(#[from] MultisigError),
    #[error("OP_CHECKMULTISIG dummy element must be empty")]
    NonEmptyDummy,
    #[error("Expected {expected} signatures, found {found}")]
    SignatureCount { expected: usize, found: usize },
    #[error("Signature verification failed")]
    SignatureMismatch,
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
}

/// Verify input `input_index` of `tx` against the locking script it spends
pub fn verify_input<C: Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    script_pubkey: &Script,
) -> Result<(), VerifyError> {
    let input = tx
        .inputs
        .get(input_index)
        .ok_or(TransactionError::InputIndexOutOfRange {
            index: input_index,
            count: tx.inputs.len(),
        })?;

    let elements = input
        .script_sig
        .push_elements()?
        .ok_or(VerifyError::NotPushOnly)?;

    if let Some(hash) = script_pubkey.p2pkh_hash() {
        verify_p2pkh(secp, tx, input_index, script_pubkey, hash, &elements)
    } else if let Some(hash) = script_pubkey.p2sh_hash() {
        verify_p2sh_multisig(secp, tx, input_index, hash, &elements)
    } else {
        Err(VerifyError::UnsupportedScriptPubKey(script_pubkey.to_hex()))
    }
}

fn verify_p2pkh<C: Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    script_pubkey: &Script,
    pubkey_hash: &[u8],
    elements: &[&[u8]],
) -> Result<(), VerifyError> {
    let [sig_bytes, key_bytes] = elements else {
        return Err(VerifyError::MalformedScriptSig(format!(
            "expected 2 pushes, found {}",
            elements.len()
        )));
    };

    if hash160(key_bytes).as_slice() != pubkey_hash {
        return Err(VerifyError::PubKeyHashMismatch);
    }
    let public_key = PublicKey::from_slice(key_bytes).map_err(|_| VerifyError::InvalidPublicKey)?;

    let signature = TransactionSignature::from_bytes(sig_bytes)?;
    let sighash = signature_hash(tx, input_index, script_pubkey, signature.sighash_type)?;

    if !signature.verify(secp, &sighash, &public_key) {
        return Err(VerifyError::SignatureMismatch);
    }
    Ok(())
}

fn verify_p2sh_multisig<C: Verification>(
    secp: &Secp256k1<C>,
    tx: &Transaction,
    input_index: usize,
    script_hash: &[u8],
    elements: &[&[u8]],
) -> Result<(), VerifyError> {
    let Some((redeem_bytes, stack)) = elements.split_last() else {
        return Err(VerifyError::MalformedScriptSig("empty unlocking script".into()));
    };

    if hash160(redeem_bytes).as_slice() != script_hash {
        return Err(VerifyError::ScriptHashMismatch);
    }
    let redeem = RedeemScript::from_script(Script::from_bytes(redeem_bytes.to_vec()))?;

    let Some((dummy, sig_pushes)) = stack.split_first() else {
        return Err(VerifyError::MalformedScriptSig(
            "missing OP_CHECKMULTISIG dummy element".into(),
        ));
    };
    if !dummy.is_empty() {
        return Err(VerifyError::NonEmptyDummy);
    }

    if sig_pushes.len() != redeem.threshold() {
        return Err(VerifyError::SignatureCount {
            expected: redeem.threshold(),
            found: sig_pushes.len(),
        });
    }

    // Keys are consumed as they are tried, so signatures must follow key order
    let mut keys = redeem.public_keys().iter();
    for sig_bytes in sig_pushes {
        let signature = TransactionSignature::from_bytes(sig_bytes)?;
        let sighash = signature_hash(tx, input_index, redeem.script(), signature.sighash_type)?;

        if !keys
            .by_ref()
            .any(|key| signature.verify(secp, &sighash, key))
        {
            return Err(VerifyError::SignatureMismatch);
        }
    }

    log::debug!(
        "Verified {} multisig input {}",
        redeem.description(),
        input_index
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::script::{ScriptBuilder, OP_0};
    use crate::core::sighash::sign_input;
    use crate::core::transaction::{OutPoint, TxIn, TxOut};
    use crate::crypto::KeyPair;
    use crate::multisig::multisig_unlock;

    fn keypair(secp: &Secp256k1<secp256k1::All>, n: u8) -> KeyPair {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        KeyPair::from_secret_bytes(secp, &bytes).unwrap()
    }

    fn unsigned_tx() -> Transaction {
        let outpoint = OutPoint::from_display_hex(&"ab".repeat(32), 1).unwrap();
        Transaction::single(
            TxIn::new(outpoint, Script::new()),
            TxOut {
                value: 40_000,
                script_pubkey: Script::p2pkh_lock(&[0x33u8; 20]).unwrap(),
            },
        )
    }

    fn signed_p2pkh(secp: &Secp256k1<secp256k1::All>, key: &KeyPair) -> (Transaction, Script) {
        let lock = key.address().script_pubkey().unwrap();
        let tx = unsigned_tx();
        let sig = sign_input(secp, &tx, 0, &lock, &key.secret_key).unwrap();
        let signed = tx
            .with_script_sig(0, Script::p2pkh_unlock(&sig, &key.public_key))
            .unwrap();
        (signed, lock)
    }

    fn multisig_fixture(
        secp: &Secp256k1<secp256k1::All>,
    ) -> (Transaction, RedeemScript, Vec<KeyPair>) {
        let keys: Vec<_> = (1..=3).map(|n| keypair(secp, n)).collect();
        let redeem = RedeemScript::new(2, keys.iter().map(|k| k.public_key).collect()).unwrap();
        (unsigned_tx(), redeem, keys)
    }

    fn sign_multisig(
        secp: &Secp256k1<secp256k1::All>,
        tx: &Transaction,
        redeem: &RedeemScript,
        signers: &[&KeyPair],
    ) -> Vec<TransactionSignature> {
        signers
            .iter()
            .map(|k| sign_input(secp, tx, 0, redeem.script(), &k.secret_key).unwrap())
            .collect()
    }

    #[test]
    fn test_verify_p2pkh() {
        let secp = Secp256k1::new();
        let key = keypair(&secp, 1);
        let (tx, lock) = signed_p2pkh(&secp, &key);
        verify_input(&secp, &tx, 0, &lock).unwrap();
    }

    #[test]
    fn test_verify_p2pkh_wrong_key() {
        let secp = Secp256k1::new();
        let key = keypair(&secp, 1);
        let (tx, _) = signed_p2pkh(&secp, &key);
        let other_lock = keypair(&secp, 2).address().script_pubkey().unwrap();

        assert!(matches!(
            verify_input(&secp, &tx, 0, &other_lock),
            Err(VerifyError::PubKeyHashMismatch)
        ));
    }

    #[test]
    fn test_verify_p2pkh_tampered_output() {
        let secp = Secp256k1::new();
        let key = keypair(&secp, 1);
        let (mut tx, lock) = signed_p2pkh(&secp, &key);
        tx.outputs[0].value += 1;

        assert!(matches!(
            verify_input(&secp, &tx, 0, &lock),
            Err(VerifyError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_verify_multisig() {
        let secp = Secp256k1::new();
        let (tx, redeem, keys) = multisig_fixture(&secp);
        let lock = redeem.script_pubkey().unwrap();

        for pair in [[0, 1], [0, 2], [1, 2]] {
            let sigs = sign_multisig(&secp, &tx, &redeem, &[&keys[pair[0]], &keys[pair[1]]]);
            let unlock = multisig_unlock(&redeem, &sigs).unwrap();
            let signed = tx.with_script_sig(0, unlock).unwrap();
            verify_input(&secp, &signed, 0, &lock).unwrap();
        }
    }

    #[test]
    fn test_verify_multisig_rejects_misordered_signatures() {
        let secp = Secp256k1::new();
        let (tx, redeem, keys) = multisig_fixture(&secp);
        let lock = redeem.script_pubkey().unwrap();

        let sigs = sign_multisig(&secp, &tx, &redeem, &[&keys[2], &keys[0]]);
        let unlock = multisig_unlock(&redeem, &sigs).unwrap();
        let signed = tx.with_script_sig(0, unlock).unwrap();

        assert!(matches!(
            verify_input(&secp, &signed, 0, &lock),
            Err(VerifyError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_verify_multisig_rejects_wrong_count() {
        let secp = Secp256k1::new();
        let (tx, redeem, keys) = multisig_fixture(&secp);
        let lock = redeem.script_pubkey().unwrap();

        let sig = sign_multisig(&secp, &tx, &redeem, &[&keys[0]])[0];
        let unlock = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_slice(&sig.to_bytes())
            .unwrap()
            .push_slice(redeem.script().as_bytes())
            .unwrap()
            .into_script();
        let signed = tx.with_script_sig(0, unlock).unwrap();

        assert!(matches!(
            verify_input(&secp, &signed, 0, &lock),
            Err(VerifyError::SignatureCount { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_verify_multisig_rejects_foreign_redeem_script() {
        let secp = Secp256k1::new();
        let (tx, redeem, keys) = multisig_fixture(&secp);
        let other = RedeemScript::new(1, vec![keys[0].public_key]).unwrap();

        let sigs = sign_multisig(&secp, &tx, &redeem, &[&keys[0], &keys[1]]);
        let unlock = multisig_unlock(&redeem, &sigs).unwrap();
        let signed = tx.with_script_sig(0, unlock).unwrap();

        assert!(matches!(
            verify_input(&secp, &signed, 0, &other.script_pubkey().unwrap()),
            Err(VerifyError::ScriptHashMismatch)
        ));
    }

    #[test]
    fn test_verify_multisig_rejects_nonempty_dummy() {
        let secp = Secp256k1::new();
        let (tx, redeem, keys) = multisig_fixture(&secp);
        let lock = redeem.script_pubkey().unwrap();

        let sigs = sign_multisig(&secp, &tx, &redeem, &[&keys[0], &keys[1]]);
        let mut builder = ScriptBuilder::new().push_slice(&[0x01]).unwrap();
        for sig in &sigs {
            builder = builder.push_slice(&sig.to_bytes()).unwrap();
        }
        let unlock = builder.push_slice(redeem.script().as_bytes()).unwrap().into_script();
        let signed = tx.with_script_sig(0, unlock).unwrap();

        assert!(matches!(
            verify_input(&secp, &signed, 0, &lock),
            Err(VerifyError::NonEmptyDummy)
        ));
    }

    #[test]
    fn test_verify_rejects_non_push_script_sig() {
        let secp = Secp256k1::new();
        let key = keypair(&secp, 1);
        let lock = key.address().script_pubkey().unwrap();
        // The funding placeholder scriptSig is the P2PKH template, which has opcodes
        let tx = unsigned_tx().with_script_sig(0, lock.clone()).unwrap();

        assert!(matches!(
            verify_input(&secp, &tx, 0, &lock),
            Err(VerifyError::NotPushOnly)
        ));
    }

    #[test]
    fn test_verify_unsupported_lock_and_index() {
        let secp = Secp256k1::new();
        let key = keypair(&secp, 1);
        let (tx, lock) = signed_p2pkh(&secp, &key);

        assert!(matches!(
            verify_input(&secp, &tx, 0, &Script::from_bytes(vec![0x51])),
            Err(VerifyError::UnsupportedScriptPubKey(_))
        ));
        assert!(matches!(
            verify_input(&secp, &tx, 3, &lock),
            Err(VerifyError::Transaction(TransactionError::InputIndexOutOfRange { .. }))
        ));
    }
}
