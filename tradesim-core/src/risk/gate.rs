//! Per-cycle risk gate: halts and sizing slowdowns.
//!
//! Nothing here is persisted. The gate is rebuilt (or reused with a fresh
//! scenario snapshot) for every decision cycle.

use super::scenario::RiskScenario;
use super::tail::cvar_factor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference index daily change at or beyond which trading halts.
pub const CIRCUIT_BREAKER_DROP: f64 = -0.05;
/// Drawdown above which sizing starts to shrink.
pub const DRAWDOWN_SLOWDOWN: f64 = 0.05;
pub const MIN_DRAWDOWN_FACTOR: f64 = 0.5;
pub const HIGH_VOLATILITY_FACTOR: f64 = 0.6;
pub const MIN_VOLATILITY_FACTOR: f64 = 0.25;
/// Relative gap between live and paper balances that triggers a warning.
pub const DIVERGENCE_TOLERANCE: f64 = 0.05;

/// Market-wide inputs for one decision cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    /// Reference index daily change as a fraction (-0.06 is a 6% drop).
    pub index_change: f64,
    /// Volatility index level (VIX-like).
    pub volatility_index: f64,
}

/// Why a whole batch was refused.
#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    #[error("drawdown {drawdown:.4} exceeds limit {limit:.4}")]
    Drawdown { drawdown: f64, limit: f64 },

    #[error("circuit breaker: reference index moved {index_change:.4}")]
    CircuitBreaker { index_change: f64 },

    #[error("health check failed (disk: {disk_ok}, memory: {memory_ok}, api: {api_ok})")]
    Unhealthy {
        disk_ok: bool,
        memory_ok: bool,
        api_ok: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskGate {
    pub initial_capital: f64,
    pub scenario: RiskScenario,
}

impl RiskGate {
    pub fn new(initial_capital: f64, scenario: RiskScenario) -> Self {
        Self {
            initial_capital,
            scenario,
        }
    }

    /// Drawdown from initial capital; negative when equity is above it.
    pub fn drawdown(&self, equity: f64) -> f64 {
        if self.initial_capital <= 0.0 {
            return 0.0;
        }
        (self.initial_capital - equity) / self.initial_capital
    }

    /// Drawdown halt first, then the circuit breaker.
    pub fn check_halt(&self, equity: f64, market: &MarketConditions) -> Result<(), HaltReason> {
        let drawdown = self.drawdown(equity);
        if drawdown > self.scenario.max_drawdown {
            return Err(HaltReason::Drawdown {
                drawdown,
                limit: self.scenario.max_drawdown,
            });
        }
        if market.index_change < CIRCUIT_BREAKER_DROP {
            return Err(HaltReason::CircuitBreaker {
                index_change: market.index_change,
            });
        }
        Ok(())
    }

    /// Sizing multiplier from drawdown and market volatility, floored at 0.25.
    pub fn volatility_factor(&self, equity: f64, volatility_index: f64) -> f64 {
        let mut factor = 1.0;
        let drawdown = self.drawdown(equity);
        if drawdown > DRAWDOWN_SLOWDOWN {
            factor *= (1.0 - drawdown).max(MIN_DRAWDOWN_FACTOR);
        }
        if volatility_index > self.scenario.volatility_threshold {
            factor *= HIGH_VOLATILITY_FACTOR;
        }
        factor.max(MIN_VOLATILITY_FACTOR)
    }

    /// Combined volatility and tail-risk multiplier.
    pub fn sizing_factor(&self, equity: f64, market: &MarketConditions, history: &[f64]) -> f64 {
        self.volatility_factor(equity, market.volatility_index) * cvar_factor(history)
    }

    /// True when a live balance strays more than 5% from paper cash.
    pub fn balance_diverges(&self, live_balance: f64, paper_cash: f64) -> bool {
        if paper_cash.abs() < f64::EPSILON {
            return live_balance.abs() > f64::EPSILON;
        }
        ((live_balance - paper_cash) / paper_cash).abs() > DIVERGENCE_TOLERANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RiskGate {
        RiskGate::new(1_000_000.0, RiskScenario::neutral())
    }

    #[test]
    fn drawdown_halt_is_strict() {
        let g = gate();
        let calm = MarketConditions::default();
        assert!(g.check_halt(850_000.0, &calm).is_ok());
        assert!(matches!(
            g.check_halt(840_000.0, &calm),
            Err(HaltReason::Drawdown { .. })
        ));
    }

    #[test]
    fn circuit_breaker() {
        let g = gate();
        let crash = MarketConditions {
            index_change: -0.06,
            volatility_index: 15.0,
        };
        assert_eq!(
            g.check_halt(1_000_000.0, &crash),
            Err(HaltReason::CircuitBreaker { index_change: -0.06 })
        );
        let dip = MarketConditions {
            index_change: -0.05,
            ..crash
        };
        assert!(g.check_halt(1_000_000.0, &dip).is_ok());
    }

    #[test]
    fn volatility_factor_compounds() {
        let g = gate();
        assert_eq!(g.volatility_factor(1_000_000.0, 10.0), 1.0);
        assert!((g.volatility_factor(1_000_000.0, 30.0) - 0.6).abs() < 1e-12);
        // 10% drawdown -> 0.9, high vol -> * 0.6
        assert!((g.volatility_factor(900_000.0, 30.0) - 0.54).abs() < 1e-12);
        // Deep drawdown bottoms out at 0.5 * 0.6 = 0.3
        assert!((g.volatility_factor(100_000.0, 30.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn divergence() {
        let g = gate();
        assert!(!g.balance_diverges(104_000.0, 100_000.0));
        assert!(g.balance_diverges(94_000.0, 100_000.0));
    }
}
