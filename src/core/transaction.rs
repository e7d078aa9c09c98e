//! Raw transaction model and wire codec
//!
//! Implements the legacy (non-witness) Bitcoin transaction encoding:
//! - Little-endian fixed-width integers
//! - CompactSize variable-length counts and script lengths
//! - Previous transaction hashes stored byte-reversed relative to display hex

use bytes::{Buf, BufMut};
use thiserror::Error;

use super::script::Script;
use crate::crypto::double_sha256;

// =============================================================================
// Constants
// =============================================================================

/// Transaction version used for every transaction this tool builds
pub const TX_VERSION: i32 = 1;

/// Sequence number that disables locktime and RBF signaling
pub const SEQUENCE_FINAL: u32 = 0xFFFFFFFF;

/// Locktime of produced transactions (no lock)
pub const DEFAULT_LOCKTIME: u32 = 0;

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Malformed transaction: {0}")]
    Malformed(String),
    #[error("Invalid transaction hash: {0}")]
    InvalidTxid(String),
    #[error("Input index {index} out of range ({count} inputs)")]
    InputIndexOutOfRange { index: usize, count: usize },
}

fn truncated(what: &str) -> TransactionError {
    TransactionError::Malformed(format!("truncated while reading {}", what))
}

// =============================================================================
// CompactSize
// =============================================================================

/// Append a CompactSize integer
pub fn write_compact_size<B: BufMut>(buf: &mut B, n: u64) {
    match n {
        0..=0xfc => buf.put_u8(n as u8),
        0xfd..=0xffff => {
            buf.put_u8(0xfd);
            buf.put_u16_le(n as u16);
        }
        0x10000..=0xffff_ffff => {
            buf.put_u8(0xfe);
            buf.put_u32_le(n as u32);
        }
        _ => {
            buf.put_u8(0xff);
            buf.put_u64_le(n);
        }
    }
}

/// Read a CompactSize integer
pub fn read_compact_size<B: Buf>(buf: &mut B) -> Result<u64, TransactionError> {
    if !buf.has_remaining() {
        return Err(truncated("compact size"));
    }
    let width = match buf.get_u8() {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        n => return Ok(n as u64),
    };
    if buf.remaining() < width {
        return Err(truncated("compact size"));
    }
    Ok(match width {
        2 => buf.get_u16_le() as u64,
        4 => buf.get_u32_le() as u64,
        _ => buf.get_u64_le(),
    })
}

fn read_u32<B: Buf>(buf: &mut B, what: &str) -> Result<u32, TransactionError> {
    if buf.remaining() < 4 {
        return Err(truncated(what));
    }
    Ok(buf.get_u32_le())
}

fn read_script<B: Buf>(buf: &mut B, what: &str) -> Result<Script, TransactionError> {
    let len = read_compact_size(buf)?;
    if len > buf.remaining() as u64 {
        return Err(TransactionError::Malformed(format!(
            "{} length {} exceeds remaining {} bytes",
            what,
            len,
            buf.remaining()
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    buf.copy_to_slice(&mut bytes);
    Ok(Script::from_bytes(bytes))
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Reference to a previous transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    /// Previous transaction hash in internal (wire) byte order
    pub txid: [u8; 32],
    /// Index of the output in the previous transaction
    pub vout: u32,
}

impl OutPoint {
    /// Build an outpoint from a transaction hash as displayed by explorers and
    /// RPC (big-endian hex)
    pub fn from_display_hex(txid_hex: &str, vout: u32) -> Result<Self, TransactionError> {
        let bytes = hex::decode(txid_hex.trim())
            .map_err(|e| TransactionError::InvalidTxid(format!("{}: {}", txid_hex, e)))?;
        let mut txid: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            TransactionError::InvalidTxid(format!("{}: expected 32 bytes", txid_hex))
        })?;
        txid.reverse();
        Ok(Self { txid, vout })
    }

    /// Transaction hash in display (big-endian) hex
    pub fn display_txid(&self) -> String {
        let mut txid = self.txid;
        txid.reverse();
        hex::encode(txid)
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub previous_output: OutPoint,
    /// Unlocking script (scriptSig)
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    /// Input spending `previous_output` with the final sequence number
    pub fn new(previous_output: OutPoint, script_sig: Script) -> Self {
        Self {
            previous_output,
            script_sig,
            sequence: SEQUENCE_FINAL,
        }
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// Value in satoshis
    pub value: u64,
    /// Locking script (scriptPubKey)
    pub script_pubkey: Script,
}

// =============================================================================
// Transaction
// =============================================================================

/// A raw Bitcoin transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Single-input, single-output transaction with default version and
    /// locktime
    pub fn single(input: TxIn, output: TxOut) -> Self {
        Self {
            version: TX_VERSION,
            inputs: vec![input],
            outputs: vec![output],
            lock_time: DEFAULT_LOCKTIME,
        }
    }

    /// Copy of this transaction with input `index` carrying `script_sig`
    pub fn with_script_sig(&self, index: usize, script_sig: Script) -> Result<Self, TransactionError> {
        let mut tx = self.clone();
        let count = tx.inputs.len();
        let input = tx
            .inputs
            .get_mut(index)
            .ok_or(TransactionError::InputIndexOutOfRange { index, count })?;
        input.script_sig = script_sig;
        Ok(tx)
    }

    /// Serialize to the raw wire format
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.estimated_size());
        buf.put_i32_le(self.version);

        write_compact_size(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.put_slice(&input.previous_output.txid);
            buf.put_u32_le(input.previous_output.vout);
            write_compact_size(&mut buf, input.script_sig.len() as u64);
            buf.put_slice(input.script_sig.as_bytes());
            buf.put_u32_le(input.sequence);
        }

        write_compact_size(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.put_u64_le(output.value);
            write_compact_size(&mut buf, output.script_pubkey.len() as u64);
            buf.put_slice(output.script_pubkey.as_bytes());
        }

        buf.put_u32_le(self.lock_time);
        buf
    }

    /// Parse a raw wire-format transaction
    ///
    /// The whole buffer must be consumed.
    pub fn deserialize(data: &[u8]) -> Result<Self, TransactionError> {
        let mut buf = data;

        if buf.remaining() < 4 {
            return Err(truncated("version"));
        }
        let version = buf.get_i32_le();

        let input_count = read_compact_size(&mut buf)?;
        // Each input needs at least 41 bytes; reject absurd counts early
        if input_count > (buf.remaining() / 41) as u64 {
            return Err(TransactionError::Malformed(format!(
                "input count {} exceeds available data",
                input_count
            )));
        }
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            if buf.remaining() < 36 {
                return Err(truncated("outpoint"));
            }
            let mut txid = [0u8; 32];
            buf.copy_to_slice(&mut txid);
            let vout = buf.get_u32_le();
            let script_sig = read_script(&mut buf, "scriptSig")?;
            let sequence = read_u32(&mut buf, "sequence")?;
            inputs.push(TxIn {
                previous_output: OutPoint { txid, vout },
                script_sig,
                sequence,
            });
        }

        let output_count = read_compact_size(&mut buf)?;
        if output_count > (buf.remaining() / 9) as u64 {
            return Err(TransactionError::Malformed(format!(
                "output count {} exceeds available data",
                output_count
            )));
        }
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            if buf.remaining() < 8 {
                return Err(truncated("output value"));
            }
            let value = buf.get_u64_le();
            let script_pubkey = read_script(&mut buf, "scriptPubKey")?;
            outputs.push(TxOut {
                value,
                script_pubkey,
            });
        }

        let lock_time = read_u32(&mut buf, "locktime")?;

        if buf.has_remaining() {
            return Err(TransactionError::Malformed(format!(
                "{} trailing bytes",
                buf.remaining()
            )));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn from_hex(raw: &str) -> Result<Self, TransactionError> {
        let data = hex::decode(raw.trim())
            .map_err(|e| TransactionError::Malformed(format!("invalid hex: {}", e)))?;
        Self::deserialize(&data)
    }

    /// Transaction ID in display (big-endian) hex
    pub fn txid(&self) -> String {
        let mut hash = double_sha256(&self.serialize());
        hash.reverse();
        hex::encode(hash)
    }

    /// Sum of all output values
    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    fn estimated_size(&self) -> usize {
        let inputs: usize = self.inputs.iter().map(|i| 41 + 9 + i.script_sig.len()).sum();
        let outputs: usize = self.outputs.iter().map(|o| 8 + 9 + o.script_pubkey.len()).sum();
        4 + 9 + inputs + 9 + outputs + 4
    }
}

// =============================================================================
// Tests
// =============================================================================
