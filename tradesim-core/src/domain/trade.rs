//! Completed round trips, appended when a position closes.

use super::position::PositionSide;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "signal")]
    Signal,
    #[serde(rename = "stop-loss")]
    StopLoss,
    #[serde(rename = "take-profit")]
    TakeProfit,
    #[serde(rename = "trailing-stop")]
    TrailingStop,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Signal => "signal",
            Self::StopLoss => "stop-loss",
            Self::TakeProfit => "take-profit",
            Self::TrailingStop => "trailing-stop",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: PositionSide,
    pub entry_date: Option<NaiveDate>,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    /// Absolute quantity closed.
    pub quantity: f64,
    /// Signed return on entry price: positive means the trade made money.
    pub return_pct: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.return_pct > 0.0
    }

    /// Realized PnL in currency.
    pub fn pnl(&self) -> f64 {
        self.return_pct * self.entry_price * self.quantity
    }
}

/// Signed return of a round trip.
pub fn trade_return(side: PositionSide, entry: f64, exit: f64) -> f64 {
    if entry == 0.0 {
        return 0.0;
    }
    match side {
        PositionSide::Long => (exit - entry) / entry,
        PositionSide::Short => (entry - exit) / entry,
    }
}
