//! CLI commands for the multisig tool
//!
//! Each command has a pure `generate_*` function returning a serializable
//! report and a `cmd_*` handler that prints it as text or JSON.

use secp256k1::{All, Secp256k1};
use serde::Serialize;
use thiserror::Error;

use crate::core::{Transaction, TransactionError};
use crate::crypto::{public_key_from_hex, Address, AddressError, KeyError, KeyPair};
use crate::multisig::{MultisigError, RedeemScript};
use crate::wallet::{
    build_funding_transaction, build_spending_transaction, generate_key_records, InputRef,
    KeyRecord, WalletError,
};

const RULE: &str = "-------------------------------------------------------------";

/// CLI errors, grouped into the kinds reported on stderr
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),
    #[error(transparent)]
    Multisig(#[from] MultisigError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Error kind name printed alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::InvalidInput(_) | CliError::InvalidAddress(_) => "InvalidInput",
            CliError::InvalidKey(_) => "InvalidKey",
            CliError::Multisig(e) => multisig_kind(e),
            CliError::Wallet(e) => wallet_kind(e),
            CliError::Output(_) => "Output",
        }
    }
}

fn multisig_kind(e: &MultisigError) -> &'static str {
    match e {
        MultisigError::InvalidThreshold(_) => "InvalidThreshold",
        MultisigError::InsufficientSignatures { .. } => "InsufficientSignatures",
        MultisigError::TooManySignatures { .. } => "TooManySignatures",
        MultisigError::UnauthorizedSigner(_)
        | MultisigError::AlreadySigned(_)
        | MultisigError::CryptoError(_) => "InvalidKey",
        MultisigError::InvalidSignature(_) => "MalformedTransaction",
        MultisigError::DuplicateSigner(_)
        | MultisigError::MalformedRedeemScript(_)
        | MultisigError::ScriptError(_) => "InvalidInput",
    }
}

fn wallet_kind(e: &WalletError) -> &'static str {
    match e {
        WalletError::InvalidAmount(_)
        | WalletError::InsufficientFunds { .. }
        | WalletError::WrongAddressType(_)
        | WalletError::InvalidKeyCount { .. }
        | WalletError::TransactionError(TransactionError::InvalidTxid(_)) => "InvalidInput",
        WalletError::CryptoError(_) | WalletError::Secp256k1Error(_) => "InvalidKey",
        WalletError::MultisigError(e) => multisig_kind(e),
        WalletError::TransactionError(_)
        | WalletError::ScriptError(_)
        | WalletError::SignatureError(_)
        | WalletError::VerifyError(_) => "MalformedTransaction",
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

// =============================================================================
// Reports
// =============================================================================

/// Output of the `keys` command
#[derive(Debug, Serialize)]
pub struct KeysReport {
    pub keys: Vec<KeyRecord>,
}

/// Output of the `address` command
#[derive(Debug, Serialize)]
pub struct AddressReport {
    pub address: String,
    pub redeem_script: String,
    pub threshold: usize,
    pub total: usize,
}

/// Output of the `fund` and `spend` commands
#[derive(Debug, Serialize)]
pub struct TransactionReport {
    pub txid: String,
    pub hex: String,
    pub size: usize,
}

impl From<&Transaction> for TransactionReport {
    fn from(tx: &Transaction) -> Self {
        let raw = tx.serialize();
        Self {
            txid: tx.txid(),
            size: raw.len(),
            hex: hex::encode(raw),
        }
    }
}

// =============================================================================
// Argument helpers
// =============================================================================

/// Split a comma separated list, dropping whitespace and surrounding quotes
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reference to the output being spent
pub fn input_ref(input_tx: &str, vout: u32, input_value: Option<u64>) -> CliResult<InputRef> {
    let input = InputRef::new(input_tx, vout)?;
    Ok(match input_value {
        Some(value) => input.with_value(value),
        None => input,
    })
}

fn parse_address(raw: &str) -> CliResult<Address> {
    Ok(raw.trim().parse::<Address>()?)
}

// =============================================================================
// Pure command logic
// =============================================================================

/// Generate `count` key pairs
pub fn generate_keys(secp: &Secp256k1<All>, count: usize) -> CliResult<KeysReport> {
    Ok(KeysReport {
        keys: generate_key_records(secp, count)?,
    })
}

/// Build the M-of-N P2SH address for a comma separated list of public keys
pub fn generate_address(m: usize, n: usize, public_keys: &str) -> CliResult<AddressReport> {
    let keys = parse_list(public_keys);
    if keys.len() != n {
        return Err(CliError::InvalidInput(format!(
            "--n is {} but {} public key(s) were given",
            n,
            keys.len()
        )));
    }

    let public_keys = keys
        .iter()
        .map(|k| public_key_from_hex(k))
        .collect::<Result<Vec<_>, _>>()?;
    let redeem = RedeemScript::new(m, public_keys)?;

    log::info!("Built {} redeem script", redeem.description());
    Ok(AddressReport {
        address: redeem.address().to_string(),
        redeem_script: redeem.to_hex(),
        threshold: redeem.threshold(),
        total: redeem.total(),
    })
}

/// Sign a transaction funding a P2SH address from a single private key
pub fn generate_fund(
    secp: &Secp256k1<All>,
    private_key: &str,
    input: &InputRef,
    amount: u64,
    destination: &str,
) -> CliResult<TransactionReport> {
    let funder = KeyPair::from_wif(secp, private_key.trim())?;
    let destination = parse_address(destination)?;

    let tx = build_funding_transaction(secp, &funder, input, amount, &destination)?;
    Ok(TransactionReport::from(&tx))
}

/// Sign a transaction spending a P2SH multisig output
pub fn generate_spend(
    secp: &Secp256k1<All>,
    private_keys: &str,
    redeem_script: &str,
    input: &InputRef,
    amount: u64,
    destination: &str,
) -> CliResult<TransactionReport> {
    let signers = parse_list(private_keys)
        .iter()
        .map(|wif| KeyPair::from_wif(secp, wif))
        .collect::<Result<Vec<_>, _>>()?;
    let redeem = RedeemScript::from_hex(redeem_script)?;
    let destination = parse_address(destination)?;

    let tx = build_spending_transaction(secp, &signers, &redeem, input, amount, &destination)?;
    Ok(TransactionReport::from(&tx))
}

// =============================================================================
// Command handlers
// =============================================================================

fn print_json<T: Serialize>(report: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Handle `keys`
pub fn cmd_keys(secp: &Secp256k1<All>, count: usize, concise: bool, json: bool) -> CliResult<()> {
    let report = generate_keys(secp, count)?;
    if json {
        return print_json(&report);
    }

    if !concise {
        println!("{}", RULE);
        println!(
            "Disclaimer: these key pairs are generated from the operating system's \
             secure random source. They should not be used in production without a \
             further security audit."
        );
        println!("{}", RULE);
        println!("Each generated key pair includes:");
        println!("* Your private key (WIF)      -- keep this private, needed to spend received bitcoins.");
        println!("* Your public key (hex)       -- required to build a multisig address.");
        println!("* Your P2PKH address          -- give this to others to receive bitcoins.");
    }

    for (i, key) in report.keys.iter().enumerate() {
        println!("{}", RULE);
        println!("KEY #{}", i + 1);
        if concise {
            println!("{}", key.private_key);
            println!("{}", key.public_key);
            println!("{}", key.address);
        } else {
            println!();
            println!("Private key:\n{}\n", key.private_key);
            println!("Public key hex:\n{}\n", key.public_key);
            println!("Public address:\n{}", key.address);
        }
    }
    println!("{}", RULE);
    Ok(())
}

/// Handle `address`
pub fn cmd_address(m: usize, n: usize, public_keys: &str, json: bool) -> CliResult<()> {
    let report = generate_address(m, n, public_keys)?;
    if json {
        return print_json(&report);
    }

    println!("{}", RULE);
    println!(
        "Your {}-of-{} P2SH multisig address is:\n{}",
        report.threshold, report.total, report.address
    );
    println!("\nIts redeem script is:\n{}", report.redeem_script);
    println!("\nKeep the redeem script: it is needed to spend from this address.");
    println!("{}", RULE);
    Ok(())
}

fn print_transaction(report: &TransactionReport, what: &str, next: &str) {
    println!("{}", RULE);
    println!("Your raw {} transaction is:\n{}", what, report.hex);
    println!("\nTxid: {} ({} bytes)", report.txid, report.size);
    println!("{}", next);
    println!("{}", RULE);
}

/// Handle `fund`
pub fn cmd_fund(
    secp: &Secp256k1<All>,
    private_key: &str,
    input: &InputRef,
    amount: u64,
    destination: &str,
    json: bool,
) -> CliResult<()> {
    let report = generate_fund(secp, private_key, input, amount, destination)?;
    if json {
        return print_json(&report);
    }
    print_transaction(
        &report,
        "funding",
        "Broadcast this transaction to fund your P2SH address.",
    );
    Ok(())
}

/// Handle `spend`
pub fn cmd_spend(
    secp: &Secp256k1<All>,
    private_keys: &str,
    redeem_script: &str,
    input: &InputRef,
    amount: u64,
    destination: &str,
    json: bool,
) -> CliResult<()> {
    let report = generate_spend(secp, private_keys, redeem_script, input, amount, destination)?;
    if json {
        return print_json(&report);
    }
    print_transaction(
        &report,
        "spending",
        "Broadcast this transaction to spend from your P2SH address.",
    );
    Ok(())
}
