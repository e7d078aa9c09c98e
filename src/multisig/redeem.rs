//! M-of-N multisig redeem scripts
//!
//! A redeem script is `OP_M <pubkey_1> ... <pubkey_N> OP_N OP_CHECKMULTISIG`.
//! The public key order is part of the script and therefore of the P2SH
//! address; it is never reordered here.

use secp256k1::PublicKey;
use thiserror::Error;

use crate::core::script::{
    decode_small_int, small_int_opcode, Instruction, Script, ScriptBuilder, ScriptError,
    OP_CHECKMULTISIG,
};
use crate::crypto::keys::COMPRESSED_PUBKEY_LEN;
use crate::crypto::{hash160, Address, KeyError};

/// Largest N accepted for a P2SH multisig redeem script
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 15;

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Duplicate signer public key: {0}")]
    DuplicateSigner(String),
    #[error("Malformed redeem script: {0}")]
    MalformedRedeemScript(String),
    #[error("Signer not in redeem script: {0}")]
    UnauthorizedSigner(String),
    #[error("Already signed by this signer: {0}")]
    AlreadySigned(String),
    #[error("Insufficient signatures: have {have}, need {need}")]
    InsufficientSignatures { have: usize, need: usize },
    #[error("Too many signatures: have {have}, need {need}")]
    TooManySignatures { have: usize, need: usize },
    #[error("Invalid signature from {0}")]
    InvalidSignature(String),
    #[error("Script error: {0}")]
    ScriptError(#[from] ScriptError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

fn malformed(reason: impl Into<String>) -> MultisigError {
    MultisigError::MalformedRedeemScript(reason.into())
}

/// A validated M-of-N multisig redeem script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemScript {
    threshold: usize,
    public_keys: Vec<PublicKey>,
    script: Script,
}

impl RedeemScript {
    /// Build a redeem script requiring `threshold` of `public_keys`
    ///
    /// # Errors
    /// Returns `InvalidThreshold` unless `1 <= threshold <= N <= 15`, and
    /// `DuplicateSigner` if a key appears twice.
    pub fn new(threshold: usize, public_keys: Vec<PublicKey>) -> Result<Self, MultisigError> {
        validate_threshold(threshold, public_keys.len())?;

        for (i, key) in public_keys.iter().enumerate() {
            if public_keys[..i].contains(key) {
                return Err(MultisigError::DuplicateSigner(hex::encode(key.serialize())));
            }
        }

        let mut builder = ScriptBuilder::new().push_opcode(small_int_opcode(threshold)?);
        for key in &public_keys {
            builder = builder.push_slice(&key.serialize())?;
        }
        let script = builder
            .push_opcode(small_int_opcode(public_keys.len())?)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script();

        Ok(Self {
            threshold,
            public_keys,
            script,
        })
    }

    /// Parse and validate a serialized redeem script
    pub fn from_script(script: Script) -> Result<Self, MultisigError> {
        let instructions = script
            .instructions()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(e.to_string()))?;

        let (first, rest) = instructions
            .split_first()
            .ok_or_else(|| malformed("empty script"))?;
        let (last, rest) = rest
            .split_last()
            .ok_or_else(|| malformed("script too short"))?;
        let (count_op, key_pushes) = rest
            .split_last()
            .ok_or_else(|| malformed("script too short"))?;

        if *last != Instruction::Op(OP_CHECKMULTISIG) {
            return Err(malformed("missing OP_CHECKMULTISIG"));
        }

        let threshold = match first {
            Instruction::Op(op) => decode_small_int(*op),
            Instruction::Push(_) => None,
        }
        .ok_or_else(|| malformed("threshold is not a small integer opcode"))?;

        let total = match count_op {
            Instruction::Op(op) => decode_small_int(*op),
            Instruction::Push(_) => None,
        }
        .ok_or_else(|| malformed("key count is not a small integer opcode"))?;

        if total != key_pushes.len() {
            return Err(malformed(format!(
                "declares {} keys but contains {}",
                total,
                key_pushes.len()
            )));
        }

        let public_keys = key_pushes
            .iter()
            .map(|instruction| match instruction {
                Instruction::Push(data) if data.len() == COMPRESSED_PUBKEY_LEN => {
                    PublicKey::from_slice(data).map_err(|_| {
                        MultisigError::CryptoError(KeyError::InvalidPublicKey(hex::encode(data)))
                    })
                }
                _ => Err(malformed("expected a 33-byte compressed public key push")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let parsed = Self::new(threshold, public_keys)?;
        // Non-minimal pushes would change the script hash
        if parsed.script != script {
            return Err(malformed("non-canonical encoding"));
        }
        Ok(parsed)
    }

    /// Parse a redeem script from hex
    pub fn from_hex(hex_script: &str) -> Result<Self, MultisigError> {
        Self::from_script(Script::from_hex(hex_script.trim())?)
    }

    /// Required signatures (M)
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Total signers (N)
    pub fn total(&self) -> usize {
        self.public_keys.len()
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn to_hex(&self) -> String {
        self.script.to_hex()
    }

    /// Position of `key` in the redeem script's key list
    pub fn position_of(&self, key: &PublicKey) -> Option<usize> {
        self.public_keys.iter().position(|k| k == key)
    }

    /// Hash160 of the serialized script
    pub fn script_hash(&self) -> [u8; 20] {
        hash160(self.script.as_bytes())
    }

    /// P2SH address paying to this script
    pub fn address(&self) -> Address {
        Address::P2sh(self.script_hash())
    }

    /// P2SH locking script paying to this script
    pub fn script_pubkey(&self) -> Result<Script, ScriptError> {
        Script::p2sh_lock(&self.script_hash())
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.public_keys.len())
    }
}

fn validate_threshold(threshold: usize, total: usize) -> Result<(), MultisigError> {
    if threshold == 0 {
        return Err(MultisigError::InvalidThreshold(
            "threshold must be at least 1".to_string(),
        ));
    }

    if total > MAX_PUBKEYS_PER_MULTISIG {
        return Err(MultisigError::InvalidThreshold(format!(
            "{} public keys exceeds the maximum of {}",
            total, MAX_PUBKEYS_PER_MULTISIG
        )));
    }

    if threshold > total {
        return Err(MultisigError::InvalidThreshold(format!(
            "threshold {} exceeds signer count {}",
            threshold, total
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::core::script::{OP_1, OP_PUSHDATA1};
    use secp256k1::Secp256k1;

    fn keys(count: u8) -> Vec<PublicKey> {
        let secp = Secp256k1::new();
        (1..=count)
            .map(|n| {
                let mut bytes = [0u8; 32];
                bytes[31] = n;
                KeyPair::from_secret_bytes(&secp, &bytes).unwrap().public_key
            })
            .collect()
    }

    #[test]
    fn test_two_of_three_layout() {
        let pubkeys = keys(3);
        let redeem = RedeemScript::new(2, pubkeys.clone()).unwrap();
        let bytes = redeem.script().as_bytes();

        assert_eq!(bytes.len(), 1 + 3 * 34 + 2);
        assert_eq!(bytes[0], 0x52);
        assert_eq!(bytes[1], 33);
        assert_eq!(&bytes[2..35], &pubkeys[0].serialize());
        assert_eq!(bytes[bytes.len() - 2], 0x53);
        assert_eq!(bytes[bytes.len() - 1], OP_CHECKMULTISIG);
        assert_eq!(redeem.description(), "2-of-3");
        assert!(redeem
            .to_hex()
            .starts_with("52210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"));
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(matches!(
            RedeemScript::new(0, keys(3)),
            Err(MultisigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            RedeemScript::new(4, keys(3)),
            Err(MultisigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            RedeemScript::new(1, keys(16)),
            Err(MultisigError::InvalidThreshold(_))
        ));
        assert!(matches!(
            RedeemScript::new(1, vec![]),
            Err(MultisigError::InvalidThreshold(_))
        ));

        assert!(RedeemScript::new(1, keys(1)).is_ok());
        let max = RedeemScript::new(15, keys(15)).unwrap();
        assert_eq!(max.script().len(), 513);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut pubkeys = keys(2);
        pubkeys.push(pubkeys[0]);
        assert!(matches!(
            RedeemScript::new(2, pubkeys),
            Err(MultisigError::DuplicateSigner(_))
        ));
    }

    #[test]
    fn test_key_order_preserved() {
        let pubkeys = keys(3);
        let mut reversed = pubkeys.clone();
        reversed.reverse();

        let a = RedeemScript::new(2, pubkeys).unwrap();
        let b = RedeemScript::new(2, reversed).unwrap();
        assert_ne!(a.script(), b.script());
        assert_ne!(a.address(), b.address());
        assert_eq!(b.position_of(&a.public_keys()[0]), Some(2));
    }

    #[test]
    fn test_address_is_p2sh() {
        let redeem = RedeemScript::new(2, keys(3)).unwrap();
        let address = redeem.address();
        assert!(address.is_p2sh());
        assert!(address.to_string().starts_with('3'));
        assert_eq!(address.hash(), &hash160(redeem.script().as_bytes()));
        assert_eq!(
            redeem.script_pubkey().unwrap(),
            address.script_pubkey().unwrap()
        );
    }

    #[test]
    fn test_parse_round_trip() {
        for (m, n) in [(1, 1), (2, 3), (3, 5), (15, 15)] {
            let redeem = RedeemScript::new(m, keys(n)).unwrap();
            let parsed = RedeemScript::from_hex(&redeem.to_hex()).unwrap();
            assert_eq!(parsed, redeem);
            assert_eq!(parsed.threshold(), m);
            assert_eq!(parsed.total(), n as usize);
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let redeem = RedeemScript::new(2, keys(3)).unwrap();
        let bytes = redeem.script().as_bytes().to_vec();

        // Wrong trailing opcode
        let mut wrong_op = bytes.clone();
        *wrong_op.last_mut().unwrap() = 0xac;
        assert!(matches!(
            RedeemScript::from_script(Script::from_bytes(wrong_op)),
            Err(MultisigError::MalformedRedeemScript(_))
        ));

        // Key count disagrees with OP_N
        let mut wrong_count = bytes.clone();
        let n_index = wrong_count.len() - 2;
        wrong_count[n_index] = 0x54;
        assert!(matches!(
            RedeemScript::from_script(Script::from_bytes(wrong_count)),
            Err(MultisigError::MalformedRedeemScript(_))
        ));

        // Truncated
        let truncated = bytes[..40].to_vec();
        assert!(RedeemScript::from_script(Script::from_bytes(truncated)).is_err());

        // Threshold above key count
        let mut high = bytes.clone();
        high[0] = 0x54;
        assert!(matches!(
            RedeemScript::from_script(Script::from_bytes(high)),
            Err(MultisigError::InvalidThreshold(_))
        ));

        assert!(RedeemScript::from_hex("not hex").is_err());
        assert!(RedeemScript::from_script(Script::new()).is_err());
    }

    #[test]
    fn test_parse_rejects_non_minimal_push() {
        let pubkey = keys(1)[0].serialize();
        let mut bytes = vec![OP_1, OP_PUSHDATA1, 33];
        bytes.extend_from_slice(&pubkey);
        bytes.extend_from_slice(&[OP_1, OP_CHECKMULTISIG]);

        assert!(matches!(
            RedeemScript::from_script(Script::from_bytes(bytes)),
            Err(MultisigError::MalformedRedeemScript(_))
        ));
    }
}
