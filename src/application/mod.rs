pub mod error;
pub mod locks;
pub mod repository;
pub mod ledger;
pub mod wallets;
pub mod referrals;

pub use error::{LedgerError, LedgerResult};
pub use locks::UserLocks;
pub use repository::{MissingUser, UserRepository};
pub use ledger::{LedgerOptions, PositionLedger};
pub use wallets::WalletService;
pub use referrals::{ReferralOptions, ReferralService};
