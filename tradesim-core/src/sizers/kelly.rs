//! Fractional Kelly sizing with a sentiment adjustment.
//!
//! The win probability is nudged by sentiment, clamped to [0.1, 0.9], and run
//! through the Kelly formula with a fixed payoff ratio. The raw Kelly fraction
//! is scaled down (half Kelly, or 0.8 Kelly on very strong sentiment) and then
//! capped at the scenario's maximum position fraction.

use super::Sizer;
use serde::{Deserialize, Serialize};

/// Win rate assumed when none is supplied.
pub const DEFAULT_WIN_RATE: f64 = 0.55;
/// Average win / average loss.
pub const PAYOFF_RATIO: f64 = 1.5;
/// Probability shift per unit of sentiment.
pub const SENTIMENT_WEIGHT: f64 = 0.10;
pub const MIN_WIN_PROBABILITY: f64 = 0.1;
pub const MAX_WIN_PROBABILITY: f64 = 0.9;
pub const BASE_KELLY_MULTIPLIER: f64 = 0.5;
pub const STRONG_KELLY_MULTIPLIER: f64 = 0.8;
/// Sentiment above which the stronger multiplier applies.
pub const STRONG_SENTIMENT: f64 = 0.8;

/// Every intermediate of one Kelly sizing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeDecision {
    pub ticker: String,
    /// Final fraction of equity, in `[0, max_position_pct]`.
    pub fraction: f64,
    /// `equity * fraction`.
    pub amount: f64,
    pub win_probability: f64,
    pub loss_probability: f64,
    pub payoff_ratio: f64,
    /// Unscaled Kelly fraction (may be negative).
    pub kelly_fraction: f64,
    pub kelly_multiplier: f64,
}

/// Kelly-criterion sizer bounded by a maximum position fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KellySizer {
    pub max_position_pct: f64,
}

impl KellySizer {
    pub fn new(max_position_pct: f64) -> Self {
        Self { max_position_pct }
    }

    /// Size a position in `ticker` for the given equity.
    ///
    /// `win_rate` defaults to [`DEFAULT_WIN_RATE`]; `sentiment` is clamped to
    /// `[-1, 1]`.
    pub fn calculate_size(
        &self,
        ticker: &str,
        equity: f64,
        win_rate: Option<f64>,
        sentiment: f64,
    ) -> SizeDecision {
        let base = win_rate
            .filter(|w| w.is_finite())
            .unwrap_or(DEFAULT_WIN_RATE);
        let sentiment = if sentiment.is_finite() {
            sentiment.clamp(-1.0, 1.0)
        } else {
            0.0
        };

        let p = (base + sentiment * SENTIMENT_WEIGHT)
            .clamp(MIN_WIN_PROBABILITY, MAX_WIN_PROBABILITY);
        let q = 1.0 - p;
        let b = PAYOFF_RATIO;
        let kelly = (b * p - q) / b;

        let multiplier = if sentiment > STRONG_SENTIMENT {
            STRONG_KELLY_MULTIPLIER
        } else {
            BASE_KELLY_MULTIPLIER
        };

        let cap = self.max_position_pct.max(0.0);
        let fraction = (kelly * multiplier).max(0.0).min(cap);
        let amount = if equity.is_finite() && equity > 0.0 {
            equity * fraction
        } else {
            0.0
        };

        SizeDecision {
            ticker: ticker.to_string(),
            fraction,
            amount,
            win_probability: p,
            loss_probability: q,
            payoff_ratio: b,
            kelly_fraction: kelly,
            kelly_multiplier: multiplier,
        }
    }
}

/// In a backtest the Kelly amount is taken from available cash.
impl Sizer for KellySizer {
    fn allocation(&self, symbol: &str, available_cash: f64) -> f64 {
        self.calculate_size(symbol, available_cash, None, 0.0).amount
    }

    fn name(&self) -> &str {
        "kelly"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_sentiment_default_win_rate() {
        let sizer = KellySizer::new(0.10);
        let d = sizer.calculate_size("AAPL", 100_000.0, None, 0.0);
        // f* = (1.5 * 0.55 - 0.45) / 1.5 = 0.25, half Kelly = 0.125, capped at 0.10
        assert!((d.kelly_fraction - 0.25).abs() < 1e-12);
        assert_eq!(d.kelly_multiplier, 0.5);
        assert!((d.fraction - 0.10).abs() < 1e-12);
        assert!((d.amount - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn uncapped_fraction_is_half_kelly() {
        let sizer = KellySizer::new(0.5);
        let d = sizer.calculate_size("AAPL", 1_000.0, Some(0.55), 0.0);
        assert!((d.fraction - 0.125).abs() < 1e-12);
    }

    #[test]
    fn strong_sentiment_uses_larger_multiplier() {
        let sizer = KellySizer::new(1.0);
        let d = sizer.calculate_size("AAPL", 1_000.0, Some(0.5), 0.9);
        assert_eq!(d.kelly_multiplier, 0.8);
        assert!((d.win_probability - 0.59).abs() < 1e-12);
    }

    #[test]
    fn negative_edge_sizes_to_zero() {
        let sizer = KellySizer::new(0.2);
        let d = sizer.calculate_size("AAPL", 1_000.0, Some(0.2), -1.0);
        assert!((d.win_probability - 0.1).abs() < 1e-12);
        assert!(d.kelly_fraction < 0.0);
        assert_eq!(d.fraction, 0.0);
        assert_eq!(d.amount, 0.0);
    }

    #[test]
    fn probability_is_clamped_high() {
        let sizer = KellySizer::new(1.0);
        let d = sizer.calculate_size("AAPL", 1_000.0, Some(0.99), 1.0);
        assert_eq!(d.win_probability, 0.9);
        assert!((d.loss_probability - 0.1).abs() < 1e-12);
    }
}
