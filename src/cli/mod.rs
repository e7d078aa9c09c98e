//! Command-line interface handlers

pub mod commands;

pub use commands::{
    cmd_address, cmd_fund, cmd_keys, cmd_spend, generate_address, generate_fund, generate_keys,
    generate_spend, input_ref, parse_list, AddressReport, CliError, CliResult, KeysReport,
    TransactionReport,
};
