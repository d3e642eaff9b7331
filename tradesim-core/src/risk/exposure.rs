//! Post-trade exposure limits per instrument and per sector.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_MAX_PER_TICKER_PCT: f64 = 0.10;
pub const DEFAULT_MAX_PER_SECTOR_PCT: f64 = 0.30;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExposureBreach {
    #[error("{symbol} exposure {exposure:.4} would exceed {limit:.4} of equity")]
    Instrument {
        symbol: String,
        exposure: f64,
        limit: f64,
    },

    #[error("sector {sector} exposure {exposure:.4} would exceed {limit:.4} of equity")]
    Sector {
        sector: String,
        exposure: f64,
        limit: f64,
    },
}

/// Caps as fractions of equity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureLimits {
    pub max_per_ticker_pct: f64,
    pub max_per_sector_pct: f64,
}

impl Default for ExposureLimits {
    fn default() -> Self {
        Self {
            max_per_ticker_pct: DEFAULT_MAX_PER_TICKER_PCT,
            max_per_sector_pct: DEFAULT_MAX_PER_SECTOR_PCT,
        }
    }
}

impl ExposureLimits {
    /// Check a prospective order of `order_value` in `symbol`.
    ///
    /// `holdings` maps symbols to current notional. `sectors` maps symbols to
    /// their sector; a symbol without one skips the sector check.
    pub fn check(
        &self,
        symbol: &str,
        order_value: f64,
        equity: f64,
        holdings: &HashMap<String, f64>,
        sectors: &HashMap<String, String>,
    ) -> Result<(), ExposureBreach> {
        if equity <= 0.0 {
            return Err(ExposureBreach::Instrument {
                symbol: symbol.to_string(),
                exposure: f64::INFINITY,
                limit: self.max_per_ticker_pct,
            });
        }

        let current = holdings.get(symbol).copied().unwrap_or(0.0);
        let exposure = (current + order_value) / equity;
        if exposure > self.max_per_ticker_pct {
            return Err(ExposureBreach::Instrument {
                symbol: symbol.to_string(),
                exposure,
                limit: self.max_per_ticker_pct,
            });
        }

        let Some(sector) = sectors.get(symbol) else {
            return Ok(());
        };
        let sector_holdings: f64 = holdings
            .iter()
            .filter(|(s, _)| sectors.get(s.as_str()) == Some(sector))
            .map(|(_, value)| value)
            .sum();
        let exposure = (sector_holdings + order_value) / equity;
        if exposure > self.max_per_sector_pct {
            return Err(ExposureBreach::Sector {
                sector: sector.clone(),
                exposure,
                limit: self.max_per_sector_pct,
            });
        }
        Ok(())
    }
}
