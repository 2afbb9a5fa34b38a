//! Position Ledger - trading bot accounting backend
//!
//! Tracks per-user positions with weighted-average cost basis, realized PnL
//! history, EVM wallets and a referral program.
//!
//! # Modules
//!
//! - `domain`: Core accounting rules (Position, metrics, Wallet, referral, UserRecord)
//! - `ports`: Trait abstractions (UserStore)
//! - `adapters`: External implementations (memory store, JSON file store, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Services, per-user locking and the retrying repository

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
