//! Offline P2SH multisig CLI
//!
//! Generates keys, builds M-of-N P2SH addresses and signs funding and
//! spending transactions without touching the network.

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use p2sh_multisig::cli;
use secp256k1::Secp256k1;

#[derive(Parser)]
#[command(name = "multisig")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Offline builder and signer for P2SH multisig transactions", long_about = None)]
struct Cli {
    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate key pairs
    Keys {
        /// Number of key pairs to generate (1-100)
        #[arg(long, default_value = "1")]
        count: usize,

        /// Print only the keys, without explanations
        #[arg(long)]
        concise: bool,
    },

    /// Build an M-of-N P2SH multisig address
    Address {
        /// Signatures required to spend
        #[arg(long)]
        m: usize,

        /// Number of public keys
        #[arg(long)]
        n: usize,

        /// Comma separated compressed public keys (hex), in redeem script order
        #[arg(long = "public-keys")]
        public_keys: String,
    },

    /// Fund a P2SH address from a single-key output
    Fund {
        /// Private key (WIF) controlling the input
        #[arg(long = "private-key")]
        private_key: String,

        /// Hash of the transaction holding the input
        #[arg(long = "input-tx")]
        input_tx: String,

        /// Index of the output being spent
        #[arg(long, default_value = "0")]
        vout: u32,

        /// Value of the output being spent, enables the fee check
        #[arg(long = "input-value")]
        input_value: Option<u64>,

        /// Satoshis to send; the rest of the input is the fee
        #[arg(long)]
        amount: u64,

        /// P2SH address to fund
        #[arg(long)]
        destination: String,
    },

    /// Spend from a P2SH multisig address
    Spend {
        /// Comma separated private keys (WIF) of the signers
        #[arg(long = "private-keys")]
        private_keys: String,

        /// Redeem script (hex) of the P2SH address
        #[arg(long = "redeem-script", alias = "redeemScript")]
        redeem_script: String,

        /// Hash of the transaction holding the input
        #[arg(long = "input-tx")]
        input_tx: String,

        /// Index of the output being spent
        #[arg(long, default_value = "0")]
        vout: u32,

        /// Value of the output being spent, enables the fee check
        #[arg(long = "input-value")]
        input_value: Option<u64>,

        /// Satoshis to send; the rest of the input is the fee
        #[arg(long)]
        amount: u64,

        /// Destination address
        #[arg(long)]
        destination: String,
    },
}

fn run(cli: Cli) -> cli::CliResult<()> {
    let secp = Secp256k1::new();

    match cli.command {
        Commands::Keys { count, concise } => cli::cmd_keys(&secp, count, concise, cli.json),

        Commands::Address { m, n, public_keys } => cli::cmd_address(m, n, &public_keys, cli.json),

        Commands::Fund {
            private_key,
            input_tx,
            vout,
            input_value,
            amount,
            destination,
        } => {
            let input = cli::input_ref(&input_tx, vout, input_value)?;
            cli::cmd_fund(&secp, &private_key, &input, amount, &destination, cli.json)
        }

        Commands::Spend {
            private_keys,
            redeem_script,
            input_tx,
            vout,
            input_value,
            amount,
            destination,
        } => {
            let input = cli::input_ref(&input_tx, vout, input_value)?;
            cli::cmd_spend(
                &secp,
                &private_keys,
                &redeem_script,
                &input,
                amount,
                &destination,
                cli.json,
            )
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}
