//! CLI Command Definitions and Dispatch
//!
//! Every command resolves to a JSON value; main prints it.

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::application::{LedgerError, LedgerResult, PositionLedger, ReferralService, WalletService};
use crate::domain::{
    NewWallet, PositionStatus, SettingsUpdate, Timeframe, TradeAction, TradeRequest, WalletUpdate,
};

/// Position Ledger - per-user trading positions, wallets and referrals
#[derive(Parser, Debug)]
#[command(
    name = "position-ledger",
    version = env!("CARGO_PKG_VERSION"),
    about = "Per-user trading position ledger",
    long_about = "Records buy/sell events per user, keeps weighted-average cost basis per \
                  (token, chain), and reports realized PnL over a timeframe."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/ledger.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record trades and inspect positions
    #[command(subcommand)]
    Position(PositionCmd),

    /// Realized PnL over a timeframe
    History(HistoryCmd),

    /// Manage a user's wallets
    #[command(subcommand)]
    Wallet(WalletCmd),

    /// Referral codes and rewards
    #[command(subcommand)]
    Referral(ReferralCmd),
}

#[derive(Subcommand, Debug)]
pub enum PositionCmd {
    /// Record a buy or sell
    Record(RecordCmd),

    /// List positions
    List {
        user: String,

        /// open, closed or all
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one position
    Show {
        user: String,
        token_address: String,
        chain: String,
    },
}

#[derive(Args, Debug)]
pub struct RecordCmd {
    pub user: String,

    /// buy or sell
    pub action: TradeAction,

    #[arg(long)]
    pub token: String,

    #[arg(long)]
    pub chain: String,

    #[arg(long)]
    pub amount: Decimal,

    /// Price per token (legacy name: mcap)
    #[arg(long, visible_alias = "mcap")]
    pub price: Decimal,

    #[arg(long = "total-usd")]
    pub total_value_usd: Decimal,

    #[arg(long = "tx")]
    pub transaction_hash: String,

    #[arg(long = "wallet")]
    pub wallet_address: String,

    #[arg(long, default_value = "")]
    pub symbol: String,

    #[arg(long, default_value = "")]
    pub name: String,
}

impl From<RecordCmd> for TradeRequest {
    fn from(cmd: RecordCmd) -> Self {
        TradeRequest {
            token_address: cmd.token,
            chain: cmd.chain,
            token_symbol: cmd.symbol,
            token_name: cmd.name,
            action: cmd.action,
            amount: cmd.amount,
            price_per_token: cmd.price,
            total_value_usd: cmd.total_value_usd,
            transaction_hash: cmd.transaction_hash,
            wallet_address: cmd.wallet_address,
        }
    }
}

#[derive(Args, Debug)]
pub struct HistoryCmd {
    pub user: String,

    /// day, week, month or all
    #[arg(short, long)]
    pub timeframe: Option<String>,

    /// Include the per-trade breakdown
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Slippage tolerance in percent (0.1-100)
    #[arg(long)]
    pub slippage: Option<Decimal>,

    /// Gas limit (21000-1000000)
    #[arg(long)]
    pub gas_limit: Option<u64>,
}

impl From<SettingsArgs> for SettingsUpdate {
    fn from(args: SettingsArgs) -> Self {
        SettingsUpdate {
            slippage: args.slippage,
            gas_limit: args.gas_limit,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum WalletCmd {
    /// Attach a wallet
    Create {
        user: String,
        name: String,
        #[arg(long)]
        address: String,
        #[arg(long, env = "LEDGER_WALLET_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        #[arg(long, env = "LEDGER_WALLET_SEED_PHRASE", hide_env_values = true)]
        seed_phrase: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// List wallets
    List { user: String },

    /// Show one wallet
    Show { user: String, name: String },

    /// Replace address or credentials
    Update {
        user: String,
        name: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        private_key: Option<String>,
        #[arg(long)]
        seed_phrase: Option<String>,
    },

    /// Remove a wallet
    Delete { user: String, name: String },

    /// Show trading settings
    Settings { user: String, name: String },

    /// Change trading settings
    SetSettings {
        user: String,
        name: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReferralCmd {
    /// Assign a new referral code
    Generate { user: String },

    /// Credit the owner of CODE for referring USER
    Process { code: String, user: String },

    /// Referral code and stats
    Info { user: String },
}

/// Services the commands run against
#[derive(Clone)]
pub struct Services {
    pub ledger: PositionLedger,
    pub wallets: WalletService,
    pub referrals: ReferralService,
}

fn to_json<T: Serialize>(value: &T) -> LedgerResult<Value> {
    serde_json::to_value(value).map_err(|e| LedgerError::Internal(e.to_string()))
}

/// Run a command and return its JSON result
pub async fn execute(command: Command, services: &Services) -> LedgerResult<Value> {
    match command {
        Command::Position(cmd) => position_command(cmd, &services.ledger).await,
        Command::History(cmd) => {
            let timeframe = Timeframe::parse(cmd.timeframe.as_deref());
            let metrics = services.ledger.compute_history(&cmd.user, timeframe, cmd.detailed).await?;
            to_json(&metrics)
        }
        Command::Wallet(cmd) => wallet_command(cmd, &services.wallets).await,
        Command::Referral(cmd) => referral_command(cmd, &services.referrals).await,
    }
}

async fn position_command(cmd: PositionCmd, ledger: &PositionLedger) -> LedgerResult<Value> {
    match cmd {
        PositionCmd::Record(record) => {
            let user = record.user.clone();
            let position = ledger.record_transaction(&user, record.into()).await?;
            to_json(&position)
        }
        PositionCmd::List { user, status } => {
            let positions = ledger.list_positions(&user, PositionStatus::parse(status.as_deref())).await?;
            to_json(&positions)
        }
        PositionCmd::Show { user, token_address, chain } => {
            to_json(&ledger.get_position(&user, &token_address, &chain).await?)
        }
    }
}

async fn wallet_command(cmd: WalletCmd, wallets: &WalletService) -> LedgerResult<Value> {
    match cmd {
        WalletCmd::Create { user, name, address, private_key, seed_phrase, settings } => {
            let request = NewWallet {
                name,
                address,
                private_key,
                seed_phrase,
                settings: settings.into(),
            };
            to_json(&wallets.create_wallet(&user, request).await?)
        }
        WalletCmd::List { user } => to_json(&wallets.list_wallets(&user).await?),
        WalletCmd::Show { user, name } => to_json(&wallets.get_wallet(&user, &name).await?),
        WalletCmd::Update { user, name, address, private_key, seed_phrase } => {
            let update = WalletUpdate { address, private_key, seed_phrase };
            to_json(&wallets.update_wallet(&user, &name, update).await?)
        }
        WalletCmd::Delete { user, name } => {
            wallets.delete_wallet(&user, &name).await?;
            Ok(json!({ "message": "Wallet deleted successfully" }))
        }
        WalletCmd::Settings { user, name } => to_json(&wallets.get_settings(&user, &name).await?),
        WalletCmd::SetSettings { user, name, settings } => {
            to_json(&wallets.update_settings(&user, &name, settings.into()).await?)
        }
    }
}

async fn referral_command(cmd: ReferralCmd, referrals: &ReferralService) -> LedgerResult<Value> {
    match cmd {
        ReferralCmd::Generate { user } => {
            let code = referrals.generate_code(&user).await?;
            Ok(json!({ "referralCode": code }))
        }
        ReferralCmd::Process { code, user } => {
            referrals.process_referral(&code, &user).await?;
            Ok(json!({ "message": "Referral processed successfully" }))
        }
        ReferralCmd::Info { user } => to_json(&referrals.referral_info(&user).await?),
    }
}
