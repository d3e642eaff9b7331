//! Fixed-fraction sizer with per-symbol overrides.

use super::Sizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Commits a fixed fraction of available cash to every new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedFractionSizer {
    pub default_pct: f64,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

impl FixedFractionSizer {
    pub fn new(default_pct: f64) -> Self {
        Self {
            default_pct,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, symbol: impl Into<String>, pct: f64) -> Self {
        self.overrides.insert(symbol.into(), pct);
        self
    }

    pub fn pct_for(&self, symbol: &str) -> f64 {
        self.overrides
            .get(symbol)
            .copied()
            .unwrap_or(self.default_pct)
    }
}

impl Sizer for FixedFractionSizer {
    fn allocation(&self, symbol: &str, available_cash: f64) -> f64 {
        available_cash * self.pct_for(symbol).clamp(0.0, 1.0)
    }

    fn name(&self) -> &str {
        "fixed_fraction"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_beats_default() {
        let sizer = FixedFractionSizer::new(0.1).with_override("AAPL", 0.2);
        assert_eq!(sizer.allocation("SPY", 1_000.0), 100.0);
        assert_eq!(sizer.allocation("AAPL", 1_000.0), 200.0);
    }

    #[test]
    fn fraction_is_clamped() {
        let sizer = FixedFractionSizer::new(1.5);
        assert_eq!(sizer.allocation("SPY", 1_000.0), 1_000.0);
    }
}
