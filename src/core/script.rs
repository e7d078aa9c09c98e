//! Script construction and parsing
//!
//! Scripts are opaque byte programs of push-data and opcodes. This module
//! builds the standard P2PKH and P2SH templates and provides an instruction
//! reader used to parse redeem scripts and unlocking scripts.

use std::fmt;

use secp256k1::PublicKey;
use thiserror::Error;

use super::sighash::TransactionSignature;

// =============================================================================
// Opcodes
// =============================================================================

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
/// OP_1 .. OP_16 are `OP_1 + (n - 1)`
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Maximum size of a single pushed element
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Size of a P2PKH locking script
pub const P2PKH_SCRIPT_LEN: usize = 25;

/// Size of a P2SH locking script
pub const P2SH_SCRIPT_LEN: usize = 23;

// =============================================================================
// Script Errors
// =============================================================================

/// Script-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Invalid hash length: {0} bytes (expected 20)")]
    InvalidHashLength(usize),
    #[error("Push of {0} bytes exceeds the 520-byte element limit")]
    PushTooLarge(usize),
    #[error("Truncated script at offset {0}")]
    Truncated(usize),
    #[error("Invalid hex script: {0}")]
    InvalidHex(String),
    #[error("Small integer {0} out of range 0..=16")]
    SmallIntOutOfRange(usize),
}

// =============================================================================
// Script
// =============================================================================

/// A raw script program
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex_script: &str) -> Result<Self, ScriptError> {
        hex::decode(hex_script)
            .map(Self)
            .map_err(|e| ScriptError::InvalidHex(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// `OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn p2pkh_lock(public_key_hash: &[u8]) -> Result<Self, ScriptError> {
        check_hash_len(public_key_hash)?;
        Ok(ScriptBuilder::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(public_key_hash)?
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .into_script())
    }

    /// `OP_HASH160 <20-byte hash> OP_EQUAL`
    pub fn p2sh_lock(script_hash: &[u8]) -> Result<Self, ScriptError> {
        check_hash_len(script_hash)?;
        Ok(ScriptBuilder::new()
            .push_opcode(OP_HASH160)
            .push_slice(script_hash)?
            .push_opcode(OP_EQUAL)
            .into_script())
    }

    /// `<signature || hashtype> <compressed pubkey>`
    pub fn p2pkh_unlock(signature: &TransactionSignature, public_key: &PublicKey) -> Self {
        // DER signature plus type byte is at most 73 bytes, a key is 33
        ScriptBuilder::new()
            .push_data(&signature.to_bytes())
            .push_data(&public_key.serialize())
            .into_script()
    }

    /// Extract the 20-byte hash from a P2PKH locking script
    pub fn p2pkh_hash(&self) -> Option<&[u8]> {
        let b = &self.0;
        let matches = b.len() == P2PKH_SCRIPT_LEN
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == 20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG;
        matches.then(|| &b[3..23])
    }

    /// Extract the 20-byte hash from a P2SH locking script
    pub fn p2sh_hash(&self) -> Option<&[u8]> {
        let b = &self.0;
        let matches =
            b.len() == P2SH_SCRIPT_LEN && b[0] == OP_HASH160 && b[1] == 20 && b[22] == OP_EQUAL;
        matches.then(|| &b[2..22])
    }

    /// Iterate over the instructions of this script
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            data: &self.0,
            offset: 0,
        }
    }

    /// Collect the pushed elements of a push-only script
    ///
    /// Returns `None` if any instruction is an opcode other than a push.
    pub fn push_elements(&self) -> Result<Option<Vec<&[u8]>>, ScriptError> {
        let mut elements = Vec::new();
        for instruction in self.instructions() {
            match instruction? {
                Instruction::Push(data) => elements.push(data),
                Instruction::Op(_) => return Ok(None),
            }
        }
        Ok(Some(elements))
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn check_hash_len(hash: &[u8]) -> Result<(), ScriptError> {
    if hash.len() != 20 {
        return Err(ScriptError::InvalidHashLength(hash.len()));
    }
    Ok(())
}

/// Opcode pushing the small integer `n` (0..=16)
pub fn small_int_opcode(n: usize) -> Result<u8, ScriptError> {
    match n {
        0 => Ok(OP_0),
        1..=16 => Ok(OP_1 + (n as u8 - 1)),
        _ => Err(ScriptError::SmallIntOutOfRange(n)),
    }
}

/// Decode a small integer opcode (OP_0, OP_1 .. OP_16)
pub fn decode_small_int(opcode: u8) -> Option<usize> {
    match opcode {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some((opcode - OP_1) as usize + 1),
        _ => None,
    }
}

// =============================================================================
// Script Builder
// =============================================================================

/// Incremental script builder using minimal push encodings
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.bytes.push(opcode);
        self
    }

    /// Push data, rejecting elements larger than the consensus limit
    pub fn push_slice(self, data: &[u8]) -> Result<Self, ScriptError> {
        if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
            return Err(ScriptError::PushTooLarge(data.len()));
        }
        Ok(self.push_data(data))
    }

    /// Push data whose size the caller already bounds
    fn push_data(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.bytes.push(len as u8);
        } else if len <= 0xff {
            self.bytes.push(OP_PUSHDATA1);
            self.bytes.push(len as u8);
        } else {
            self.bytes.push(OP_PUSHDATA2);
            self.bytes.extend_from_slice(&(len as u16).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn into_script(self) -> Script {
        Script(self.bytes)
    }
}

// =============================================================================
// Instruction Reader
// =============================================================================

/// A single decoded script instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Data pushed onto the stack (OP_0 pushes an empty element)
    Push(&'a [u8]),
    /// Any non-push opcode
    Op(u8),
}

/// Iterator over script instructions
pub struct Instructions<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Instructions<'a> {
    fn take(&mut self, start: usize, len: usize) -> Result<&'a [u8], ScriptError> {
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ScriptError::Truncated(self.offset))?;
        self.offset = end;
        let data: &'a [u8] = self.data;
        Ok(&data[start..end])
    }

    fn read_len(&mut self, start: usize, width: usize) -> Result<(usize, usize), ScriptError> {
        let raw = self.take(start, width)?;
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(raw);
        Ok((u32::from_le_bytes(buf) as usize, start + width))
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }

        let opcode = self.data[self.offset];
        let after = self.offset + 1;

        let result = match opcode {
            OP_0 => {
                self.offset = after;
                Ok(Instruction::Push(&[]))
            }
            0x01..=0x4b => self.take(after, opcode as usize).map(Instruction::Push),
            OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                let width = match opcode {
                    OP_PUSHDATA1 => 1,
                    OP_PUSHDATA2 => 2,
                    _ => 4,
                };
                self.read_len(after, width)
                    .and_then(|(len, start)| self.take(start, len))
                    .map(Instruction::Push)
            }
            _ => {
                self.offset = after;
                Ok(Instruction::Op(opcode))
            }
        };

        if result.is_err() {
            // Stop iterating after the first malformed instruction
            self.offset = self.data.len();
        }
        Some(result)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p2pkh_lock_layout() {
        let hash = hex::decode("751e76e8199196d454941c45d1b3a323f1433bd6").unwrap();
        let script = Script::p2pkh_lock(&hash).unwrap();
        assert_eq!(
            script.to_hex(),
            "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac"
        );
        assert_eq!(script.p2pkh_hash(), Some(&hash[..]));
        assert_eq!(script.p2sh_hash(), None);
    }

    #[test]
    fn test_p2sh_lock_layout() {
        let hash = [0x5au8; 20];
        let script = Script::p2sh_lock(&hash).unwrap();
        assert_eq!(script.len(), P2SH_SCRIPT_LEN);
        assert_eq!(script.as_bytes()[0], OP_HASH160);
        assert_eq!(script.as_bytes()[1], 20);
        assert_eq!(script.as_bytes()[22], OP_EQUAL);
        assert_eq!(script.p2sh_hash(), Some(&hash[..]));
        assert_eq!(script.p2pkh_hash(), None);
    }

    #[test]
    fn test_lock_rejects_bad_hash_length() {
        assert_eq!(
            Script::p2pkh_lock(&[0u8; 19]),
            Err(ScriptError::InvalidHashLength(19))
        );
        assert_eq!(
            Script::p2sh_lock(&[0u8; 32]),
            Err(ScriptError::InvalidHashLength(32))
        );
    }

    #[test]
    fn test_small_ints() {
        assert_eq!(small_int_opcode(0).unwrap(), OP_0);
        assert_eq!(small_int_opcode(1).unwrap(), OP_1);
        assert_eq!(small_int_opcode(15).unwrap(), 0x5f);
        assert_eq!(small_int_opcode(16).unwrap(), OP_16);
        assert!(small_int_opcode(17).is_err());

        for n in 0..=16 {
            assert_eq!(decode_small_int(small_int_opcode(n).unwrap()), Some(n));
        }
        assert_eq!(decode_small_int(OP_DUP), None);
    }

    #[test]
    fn test_push_encodings() {
        let short = ScriptBuilder::new().push_slice(&[1u8; 75]).unwrap().into_script();
        assert_eq!(short.as_bytes()[0], 75);
        assert_eq!(short.len(), 76);

        let medium = ScriptBuilder::new().push_slice(&[1u8; 76]).unwrap().into_script();
        assert_eq!(&medium.as_bytes()[..2], &[OP_PUSHDATA1, 76]);

        let long = ScriptBuilder::new().push_slice(&[1u8; 513]).unwrap().into_script();
        assert_eq!(&long.as_bytes()[..3], &[OP_PUSHDATA2, 0x01, 0x02]);
        assert_eq!(long.len(), 516);

        assert_eq!(
            ScriptBuilder::new().push_slice(&[0u8; 521]).unwrap_err(),
            ScriptError::PushTooLarge(521)
        );
    }

    #[test]
    fn test_instructions() {
        let script = ScriptBuilder::new()
            .push_opcode(OP_0)
            .push_slice(&[0xaa; 3])
            .unwrap()
            .push_slice(&[0xbb; 300])
            .unwrap()
            .push_opcode(OP_CHECKSIG)
            .into_script();

        let instructions: Vec<_> = script.instructions().collect::<Result<_, _>>().unwrap();
        assert_eq!(instructions.len(), 4);
        assert_eq!(instructions[0], Instruction::Push(&[]));
        assert_eq!(instructions[1], Instruction::Push(&[0xaa; 3]));
        assert!(matches!(instructions[2], Instruction::Push(data) if data.len() == 300));
        assert_eq!(instructions[3], Instruction::Op(OP_CHECKSIG));

        // Not push-only because of the trailing CHECKSIG
        assert_eq!(script.push_elements().unwrap(), None);
    }

    #[test]
    fn test_truncated_push() {
        let script = Script::from_bytes(vec![0x05, 0x01, 0x02]);
        let result: Result<Vec<_>, _> = script.instructions().collect();
        assert_eq!(result, Err(ScriptError::Truncated(0)));

        let script = Script::from_bytes(vec![OP_PUSHDATA2, 0x01]);
        assert!(script.push_elements().is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let script = Script::from_hex("a914000000000000000000000000000000000000000087").unwrap();
        assert_eq!(script.len(), P2SH_SCRIPT_LEN);
        assert_eq!(
            script.to_string(),
            "a914000000000000000000000000000000000000000087"
        );
        assert!(Script::from_hex("xyz").is_err());
    }
}
