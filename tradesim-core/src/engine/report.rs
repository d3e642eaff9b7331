//! Backtest output.

use crate::domain::{Fill, Portfolio, PositionSide, Signal, TradeRecord};
use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return: f64,
    /// Equity per bar divided by initial capital.
    pub equity_curve: Vec<f64>,
    /// Input signals per symbol, one per bar.
    pub signal_trace: BTreeMap<String, Vec<Signal>>,
    /// +1 long, -1 short, 0 flat; first open instrument in symbol order.
    pub position_trace: Vec<i8>,
    pub trades: Vec<TradeRecord>,
    pub fills: Vec<Fill>,
    pub metrics: PerformanceMetrics,
    pub bar_count: usize,
    /// Instrument-bars skipped because today's or tomorrow's bar was missing.
    pub skipped_bars: usize,
    pub sizer: String,
    pub commission: f64,
    pub slippage: f64,
}

impl BacktestReport {
    /// Equity in currency at bar `t`.
    pub fn equity_at(&self, t: usize) -> Option<f64> {
        self.equity_curve.get(t).map(|e| e * self.initial_capital)
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "return {:+.2}% | final {:.2} | trades {} | win {:.1}% | max dd {:.2}% | sharpe {:.2}",
            self.total_return * 100.0,
            self.final_value,
            self.metrics.total_trades,
            self.metrics.win_rate * 100.0,
            self.metrics.max_drawdown * 100.0,
            self.metrics.sharpe_ratio,
        )
    }
}

/// Side of the first open position in symbol order, as +1/-1/0.
pub fn position_sign(portfolio: &Portfolio) -> i8 {
    portfolio
        .open_positions()
        .next()
        .and_then(|p| p.side())
        .map(PositionSide::sign)
        .unwrap_or(0)
}
