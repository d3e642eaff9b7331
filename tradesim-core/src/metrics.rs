//! Performance metrics: pure functions over an equity curve and a trade list.

use crate::domain::TradeRecord;
use serde::{Deserialize, Serialize};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate statistics for one backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    /// Fraction of trades with a positive return.
    pub win_rate: f64,
    /// Mean per-trade return.
    pub avg_return: f64,
    /// Largest peak-to-trough decline, as a positive fraction.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub cagr: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics. `total_return` comes from the caller since it is
    /// defined against initial capital, not the first equity point.
    pub fn compute(equity_curve: &[f64], trades: &[TradeRecord], total_return: f64) -> Self {
        Self {
            total_return,
            win_rate: win_rate(trades),
            avg_return: avg_return(trades),
            max_drawdown: max_drawdown(equity_curve),
            sharpe_ratio: sharpe_ratio(equity_curve),
            sortino_ratio: sortino_ratio(equity_curve),
            cagr: cagr(equity_curve),
            profit_factor: profit_factor(trades),
            total_trades: trades.len(),
        }
    }
}

/// Annualized Sharpe ratio (zero risk-free rate) from daily returns.
///
/// Returns 0.0 with fewer than 2 returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(equity_curve: &[f64]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    if downside <= 0.0 {
        return 0.0;
    }
    let downside_std = (downside / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Compound annual growth rate over the curve, assuming daily bars.
pub fn cagr(equity_curve: &[f64]) -> f64 {
    let (Some(&first), Some(&last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || first <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
    (last / first).powf(1.0 / years) - 1.0
}

/// Maximum drawdown as a positive fraction (0.15 = 15% below the peak).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn avg_return(trades: &[TradeRecord]) -> f64 {
    let returns: Vec<f64> = trades.iter().map(|t| t.return_pct).collect();
    mean_f64(&returns)
}

/// Gross profit over gross loss, capped at 100.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let profit: f64 = trades.iter().map(|t| t.pnl()).filter(|p| *p > 0.0).sum();
    let loss: f64 = trades
        .iter()
        .map(|t| t.pnl())
        .filter(|p| *p < 0.0)
        .map(f64::abs)
        .sum();
    if loss < 1e-10 {
        return if profit > 0.0 { 100.0 } else { 0.0 };
    }
    (profit / loss).min(100.0)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity points.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
