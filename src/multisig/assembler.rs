//! Multisig unlocking script assembly
//!
//! Collects signatures from the signers of a redeem script and assembles the
//! final `OP_0 <sig_1> ... <sig_M> <redeem script>` unlocking script.

use secp256k1::{PublicKey, Secp256k1, Verification};

use super::redeem::{MultisigError, RedeemScript};
use crate::core::script::{Script, ScriptBuilder, OP_0};
use crate::core::sighash::TransactionSignature;

/// Assemble a multisig unlocking script from signatures already in redeem
/// script key order
///
/// The leading `OP_0` is consumed by OP_CHECKMULTISIG's extra stack pop.
///
/// # Errors
/// `InsufficientSignatures` for fewer than M signatures, `TooManySignatures`
/// for more than M.
pub fn multisig_unlock(
    redeem: &RedeemScript,
    signatures: &[TransactionSignature],
) -> Result<Script, MultisigError> {
    let need = redeem.threshold();
    let have = signatures.len();

    if have < need {
        return Err(MultisigError::InsufficientSignatures { have, need });
    }
    if have > need {
        return Err(MultisigError::TooManySignatures { have, need });
    }

    let mut builder = ScriptBuilder::new().push_opcode(OP_0);
    for signature in signatures {
        builder = builder.push_slice(&signature.to_bytes())?;
    }
    builder = builder.push_slice(redeem.script().as_bytes())?;

    Ok(builder.into_script())
}

/// Signatures collected against one signature hash, keyed by the signer's
/// position in the redeem script
///
/// Signatures may be added in any order; they are emitted in redeem script
/// key order.
#[derive(Debug, Clone)]
pub struct SignatureCollector<'a> {
    redeem: &'a RedeemScript,
    sighash: [u8; 32],
    slots: Vec<Option<TransactionSignature>>,
}

impl<'a> SignatureCollector<'a> {
    pub fn new(redeem: &'a RedeemScript, sighash: [u8; 32]) -> Self {
        Self {
            redeem,
            sighash,
            slots: vec![None; redeem.total()],
        }
    }

    /// Add a signature from `signer`
    ///
    /// The signer must appear in the redeem script, must not have signed
    /// already, and the signature must verify against the collected sighash.
    pub fn add_signature<C: Verification>(
        &mut self,
        secp: &Secp256k1<C>,
        signer: &PublicKey,
        signature: TransactionSignature,
    ) -> Result<usize, MultisigError> {
        let signer_hex = hex::encode(signer.serialize());

        let position = self
            .redeem
            .position_of(signer)
            .ok_or_else(|| MultisigError::UnauthorizedSigner(signer_hex.clone()))?;

        if self.slots[position].is_some() {
            return Err(MultisigError::AlreadySigned(signer_hex));
        }

        if !signature.verify(secp, &self.sighash, signer) {
            return Err(MultisigError::InvalidSignature(signer_hex));
        }

        log::debug!(
            "Placed signature from {} at redeem script position {}",
            signer_hex,
            position
        );
        self.slots[position] = Some(signature);
        Ok(position)
    }

    /// Get number of signatures collected
    pub fn signature_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if exactly the threshold has been collected
    pub fn is_ready(&self) -> bool {
        self.signature_count() == self.redeem.threshold()
    }

    /// Redeem script positions that have signed
    pub fn signed_positions(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|_| i))
            .collect()
    }

    /// Collected signatures in redeem script key order
    pub fn ordered_signatures(&self) -> Vec<TransactionSignature> {
        self.slots.iter().flatten().copied().collect()
    }

    /// Build the unlocking script from the collected signatures
    pub fn finalize(&self) -> Result<Script, MultisigError> {
        multisig_unlock(self.redeem, &self.ordered_signatures())
    }
}
