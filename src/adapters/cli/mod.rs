//! CLI Adapter
//!
//! Command-line interface for the position ledger.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    execute, CliApp, Command, HistoryCmd, PositionCmd, RecordCmd, ReferralCmd, Services, SettingsArgs, WalletCmd,
};
