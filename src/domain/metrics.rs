//! Realized performance over a time window

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::{Position, PositionError, TradeAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    Week,
    Month,
    #[default]
    All,
}

impl Timeframe {
    /// Unknown values mean all-time
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "day" => Timeframe::Day,
            Some(v) if v == "week" => Timeframe::Week,
            Some(v) if v == "month" => Timeframe::Month,
            _ => Timeframe::All,
        }
    }

    /// Earliest timestamp included in the window
    pub fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Day => Some(now - Duration::hours(24)),
            Timeframe::Week => Some(now - Duration::days(7)),
            Timeframe::Month => Some(now - Duration::days(30)),
            Timeframe::All => None,
        }
    }
}

/// One realized sell in the detailed breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeBreakdown {
    pub token_address: String,
    pub chain: String,
    pub symbol: String,
    pub amount: Decimal,
    pub sell_price: Decimal,
    pub average_basis: Decimal,
    pub profit: Decimal,
    pub total_value_usd: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub timeframe: Timeframe,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub total_volume: Decimal,
    pub realized_pnl: Decimal,
    /// Percentage, 0-100
    pub win_rate: Decimal,
    pub average_trade_size: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trades: Option<Vec<TradeBreakdown>>,
}

/// Aggregate realized PnL over the sells that fall inside `timeframe`.
///
/// Each sell is measured against its position's current average basis.
/// The breakdown is ordered by transaction timestamp; ties keep the order in
/// which positions and transactions were appended. Totals that leave the
/// decimal range are reported as `PositionError::Overflow`.
pub fn compute_history(
    positions: &[Position],
    timeframe: Timeframe,
    detailed: bool,
    now: DateTime<Utc>,
) -> Result<PerformanceMetrics, PositionError> {
    let start = timeframe.window_start(now);
    let mut metrics = PerformanceMetrics {
        timeframe,
        ..Default::default()
    };
    let mut trades = Vec::new();

    for position in positions {
        let sells = position
            .transactions
            .iter()
            .filter(|tx| tx.action == TradeAction::Sell)
            .filter(|tx| start.map_or(true, |s| tx.timestamp >= s));

        for tx in sells {
            let profit = position.realized_pnl(tx)?;
            metrics.total_trades += 1;
            metrics.total_volume = metrics
                .total_volume
                .checked_add(tx.total_value_usd)
                .ok_or(PositionError::Overflow("total volume"))?;
            metrics.realized_pnl = metrics
                .realized_pnl
                .checked_add(profit)
                .ok_or(PositionError::Overflow("realized pnl"))?;
            if profit > Decimal::ZERO {
                metrics.winning_trades += 1;
            } else {
                metrics.losing_trades += 1;
            }

            if detailed {
                trades.push(TradeBreakdown {
                    token_address: position.token_address.clone(),
                    chain: position.chain.clone(),
                    symbol: position.token_symbol.clone(),
                    amount: tx.amount,
                    sell_price: tx.price_per_token,
                    average_basis: position.average_basis,
                    profit: profit.normalize(),
                    total_value_usd: tx.total_value_usd,
                    timestamp: tx.timestamp,
                });
            }
        }
    }

    if metrics.total_trades > 0 {
        let total = Decimal::from(metrics.total_trades);
        metrics.win_rate = (Decimal::from(metrics.winning_trades) * Decimal::ONE_HUNDRED / total).normalize();
        metrics.average_trade_size = (metrics.total_volume / total).normalize();
    }
    metrics.realized_pnl = metrics.realized_pnl.normalize();
    metrics.total_volume = metrics.total_volume.normalize();

    if detailed {
        trades.sort_by_key(|t| t.timestamp);
        metrics.trades = Some(trades);
    }

    Ok(metrics)
}
