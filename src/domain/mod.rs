//! Domain Layer - Core accounting logic for the position ledger
//!
//! Pure types and rules with no I/O. Persistence happens through the ports
//! layer; orchestration lives in `application`.
//!
//! - `position`: trade events, weighted-average basis, open/close tracking
//! - `metrics`: realized PnL aggregation over a timeframe
//! - `wallet`: per-user EVM wallets and trading settings
//! - `referral`: referral codes and reward linkage
//! - `user`: the aggregate root persisted as one document

pub mod position;
pub mod metrics;
pub mod wallet;
pub mod referral;
pub mod user;

pub use position::{Position, PositionError, PositionStatus, TradeAction, TradeRequest, Transaction};
pub use metrics::{compute_history, PerformanceMetrics, Timeframe, TradeBreakdown};
pub use wallet::{NewWallet, SettingsUpdate, Wallet, WalletError, WalletSettings, WalletUpdate, WalletView};
pub use referral::{ReferralError, ReferralInfo, ReferralState};
pub use user::UserRecord;
