//! Trade positions and the weighted-average accounting applied to them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for TradeAction {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            other => Err(PositionError::InvalidAction(other.to_string())),
        }
    }
}

/// Filter used when listing positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionStatus {
    Open,
    Closed,
    #[default]
    All,
}

impl PositionStatus {
    /// Unknown values fall back to `All`
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "open" => PositionStatus::Open,
            Some(v) if v == "closed" => PositionStatus::Closed,
            _ => PositionStatus::All,
        }
    }

    pub fn matches(&self, position: &Position) -> bool {
        match self {
            PositionStatus::Open => position.is_open(),
            PositionStatus::Closed => position.amount.is_zero(),
            PositionStatus::All => true,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PositionError {
    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(Decimal),
    #[error("price_per_token must be a positive number, got {0}")]
    InvalidPrice(Decimal),
    #[error("total_value_usd must be a positive number, got {0}")]
    InvalidTotalValue(Decimal),
    #[error("action must be 'buy' or 'sell', got '{0}'")]
    InvalidAction(String),
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },
    #[error("{0} is out of the representable range")]
    Overflow(&'static str),
}

/// A single buy or sell. Never mutated after it is appended to a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub action: TradeAction,
    pub amount: Decimal,
    /// Price per token at execution
    #[serde(alias = "mcap")]
    pub price_per_token: Decimal,
    pub total_value_usd: Decimal,
    pub transaction_hash: String,
    pub wallet_address: String,
    pub timestamp: DateTime<Utc>,
}

/// Incoming trade event for a (token, chain) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub token_address: String,
    pub chain: String,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub token_name: String,
    pub action: TradeAction,
    pub amount: Decimal,
    #[serde(alias = "mcap")]
    pub price_per_token: Decimal,
    pub total_value_usd: Decimal,
    pub transaction_hash: String,
    pub wallet_address: String,
}

impl TradeRequest {
    /// Reject anything that would make the accounting meaningless.
    pub fn validate(&self) -> Result<(), PositionError> {
        if self.token_address.trim().is_empty() {
            return Err(PositionError::MissingField("token_address"));
        }
        if self.chain.trim().is_empty() {
            return Err(PositionError::MissingField("chain"));
        }
        if self.transaction_hash.trim().is_empty() {
            return Err(PositionError::MissingField("transaction_hash"));
        }
        if self.wallet_address.trim().is_empty() {
            return Err(PositionError::MissingField("wallet_address"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(PositionError::InvalidAmount(self.amount));
        }
        if self.price_per_token <= Decimal::ZERO {
            return Err(PositionError::InvalidPrice(self.price_per_token));
        }
        if self.total_value_usd <= Decimal::ZERO {
            return Err(PositionError::InvalidTotalValue(self.total_value_usd));
        }
        Ok(())
    }

    fn to_transaction(&self, timestamp: DateTime<Utc>) -> Transaction {
        Transaction {
            action: self.action,
            amount: self.amount,
            price_per_token: self.price_per_token,
            total_value_usd: self.total_value_usd,
            transaction_hash: self.transaction_hash.trim().to_string(),
            wallet_address: self.wallet_address.trim().to_string(),
            timestamp,
        }
    }
}

/// Aggregated holding of one token on one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Always stored lowercase
    pub token_address: String,
    /// Always stored uppercase
    pub chain: String,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub token_name: String,
    pub amount: Decimal,
    /// Weighted-average buy price per token
    #[serde(alias = "average_mcap", alias = "average_buy_price", default)]
    pub average_basis: Decimal,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

pub fn normalize_token_address(token_address: &str) -> String {
    token_address.trim().to_ascii_lowercase()
}

pub fn normalize_chain(chain: &str) -> String {
    chain.trim().to_ascii_uppercase()
}

impl Position {
    pub fn new(
        token_address: &str,
        chain: &str,
        token_symbol: &str,
        token_name: &str,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_address: normalize_token_address(token_address),
            chain: normalize_chain(chain),
            token_symbol: token_symbol.to_string(),
            token_name: token_name.to_string(),
            amount: Decimal::ZERO,
            average_basis: Decimal::ZERO,
            transactions: Vec::new(),
            opened_at,
            closed_at: None,
        }
    }

    /// Case-insensitive key match
    pub fn matches_key(&self, token_address: &str, chain: &str) -> bool {
        self.token_address.eq_ignore_ascii_case(token_address.trim())
            && self.chain.eq_ignore_ascii_case(chain.trim())
    }

    pub fn is_open(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Check a trade against the current holding without touching it.
    pub fn check(&self, request: &TradeRequest) -> Result<(), PositionError> {
        request.validate()?;
        if request.action == TradeAction::Sell && self.amount < request.amount {
            return Err(PositionError::InsufficientBalance {
                available: self.amount,
                requested: request.amount,
            });
        }
        Ok(())
    }

    /// Apply a validated trade: append the transaction and recompute the aggregate.
    pub fn apply(&mut self, request: &TradeRequest, now: DateTime<Utc>) -> Result<&Transaction, PositionError> {
        self.check(request)?;

        match request.action {
            TradeAction::Buy => {
                let old_amount = self.amount;
                let new_amount = old_amount
                    .checked_add(request.amount)
                    .ok_or(PositionError::Overflow("position amount"))?;
                // computed in full before anything is assigned
                let new_basis = if new_amount.is_zero() {
                    self.average_basis
                } else {
                    old_amount
                        .checked_mul(self.average_basis)
                        .zip(request.amount.checked_mul(request.price_per_token))
                        .and_then(|(held, bought)| held.checked_add(bought))
                        .and_then(|cost| cost.checked_div(new_amount))
                        .ok_or(PositionError::Overflow("position cost"))?
                        .normalize()
                };
                if old_amount.is_zero() && self.closed_at.is_some() {
                    self.opened_at = now;
                    self.closed_at = None;
                }
                self.average_basis = new_basis;
                self.amount = new_amount.normalize();
            }
            TradeAction::Sell => {
                self.amount = (self.amount - request.amount).normalize();
                if self.amount.is_zero() {
                    self.closed_at = Some(now);
                }
            }
        }

        if !request.token_symbol.is_empty() && self.token_symbol.is_empty() {
            self.token_symbol = request.token_symbol.clone();
        }
        if !request.token_name.is_empty() && self.token_name.is_empty() {
            self.token_name = request.token_name.clone();
        }

        self.transactions.push(request.to_transaction(now));
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    /// Realized PnL of a sell measured against the current average basis
    pub fn realized_pnl(&self, tx: &Transaction) -> Result<Decimal, PositionError> {
        tx.price_per_token
            .checked_sub(self.average_basis)
            .and_then(|spread| spread.checked_mul(tx.amount))
            .ok_or(PositionError::Overflow("realized pnl"))
    }
}
