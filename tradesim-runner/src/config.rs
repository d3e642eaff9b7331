//! TOML run configuration.
//!
//! ```toml
//! [backtest]
//! initial_capital = 1000000.0
//! position_size_pct = 0.1
//!
//! [backtest.position_size_overrides]
//! AAPL = 0.2
//!
//! [exits]
//! stop_loss_pct = 0.05
//!
//! [risk]
//! scenario = "neutral"
//!
//! [instruments.AAPL]
//! lot_size = 1.0
//! sector = "Technology"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tradesim_core::domain::{Instrument, DEFAULT_LOT_SIZE};
use tradesim_core::engine::SimulatorConfig;
use tradesim_core::fill::ExitRules;
use tradesim_core::risk::{
    ExposureLimits, RiskScenario, ScenarioError, ScenarioName, DEFAULT_MAX_PER_SECTOR_PCT,
    DEFAULT_MAX_PER_TICKER_PCT,
};
use tradesim_core::sizers::{KellySizer, Sizer};
use tradesim_live::engine::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MIN_ORDER_AMOUNT, DEFAULT_PROTECTIVE_STOP_PCT,
};
use tradesim_live::ExecutionConfig;

/// Content hash identifying a run: same config on the same data, same id.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: String, value: f64 },

    #[error("{field} must be a fraction in (0, 1], got {value}")]
    Fraction { field: String, value: f64 },

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizerKind {
    #[default]
    FixedFraction,
    Kelly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub exits: ExitRules,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub initial_capital: f64,
    pub position_size_pct: f64,
    #[serde(default)]
    pub position_size_overrides: BTreeMap<String, f64>,
    #[serde(default)]
    pub allow_short: bool,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub slippage: f64,
    #[serde(default)]
    pub sizer: SizerKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub scenario: String,
    pub max_per_ticker_pct: f64,
    pub max_per_sector_pct: f64,
    pub safe_mode: bool,
    pub min_order_amount: f64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub protective_stop_pct: f64,
    pub default_win_rate: Option<f64>,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            scenario: ScenarioName::default().to_string(),
            max_per_ticker_pct: DEFAULT_MAX_PER_TICKER_PCT,
            max_per_sector_pct: DEFAULT_MAX_PER_SECTOR_PCT,
            safe_mode: false,
            min_order_amount: DEFAULT_MIN_ORDER_AMOUNT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: 1_000,
            protective_stop_pct: DEFAULT_PROTECTIVE_STOP_PCT,
            default_win_rate: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSection {
    #[serde(default = "default_lot_size")]
    pub lot_size: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

fn default_lot_size() -> f64 {
    DEFAULT_LOT_SIZE
}

impl BacktestConfig {
    /// Minimal valid config.
    pub fn new(initial_capital: f64, position_size_pct: f64) -> Self {
        Self {
            backtest: BacktestSection {
                initial_capital,
                position_size_pct,
                position_size_overrides: BTreeMap::new(),
                allow_short: false,
                commission: 0.0,
                slippage: 0.0,
                sizer: SizerKind::default(),
            },
            exits: ExitRules::default(),
            risk: RiskSection::default(),
            instruments: BTreeMap::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("backtest.initial_capital", self.backtest.initial_capital)?;
        fraction("backtest.position_size_pct", self.backtest.position_size_pct)?;
        for (symbol, pct) in &self.backtest.position_size_overrides {
            fraction(&format!("backtest.position_size_overrides.{symbol}"), *pct)?;
        }
        let exits = [
            ("exits.stop_loss_pct", self.exits.stop_loss_pct),
            ("exits.take_profit_pct", self.exits.take_profit_pct),
            ("exits.trailing_stop_pct", self.exits.trailing_stop_pct),
        ];
        for (field, value) in exits {
            if let Some(v) = value {
                fraction(field, v)?;
            }
        }
        fraction("risk.max_per_ticker_pct", self.risk.max_per_ticker_pct)?;
        fraction("risk.max_per_sector_pct", self.risk.max_per_sector_pct)?;
        fraction("risk.protective_stop_pct", self.risk.protective_stop_pct)?;
        if let Some(rate) = self.risk.default_win_rate {
            fraction("risk.default_win_rate", rate)?;
        }
        for (symbol, instrument) in &self.instruments {
            positive(&format!("instruments.{symbol}.lot_size"), instrument.lot_size)?;
        }
        self.scenario()?;
        Ok(())
    }

    pub fn scenario(&self) -> Result<RiskScenario, ConfigError> {
        Ok(self.risk.scenario.parse::<RiskScenario>()?)
    }

    pub fn instruments(&self) -> BTreeMap<String, Instrument> {
        self.instruments
            .iter()
            .map(|(symbol, section)| {
                let instrument = Instrument {
                    symbol: symbol.clone(),
                    lot_size: section.lot_size,
                    sector: section.sector.clone(),
                };
                (symbol.clone(), instrument)
            })
            .collect()
    }

    pub fn to_simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            initial_capital: self.backtest.initial_capital,
            position_size_pct: self.backtest.position_size_pct,
            position_size_overrides: self.backtest.position_size_overrides.clone(),
            exits: self.exits,
            allow_short: self.backtest.allow_short,
            commission: self.backtest.commission,
            slippage: self.backtest.slippage,
            instruments: self.instruments(),
        }
    }

    /// Sizer override for the simulator; `None` keeps the fixed-fraction default.
    pub fn sizer(&self) -> Result<Option<Box<dyn Sizer>>, ConfigError> {
        Ok(match self.backtest.sizer {
            SizerKind::FixedFraction => None,
            SizerKind::Kelly => Some(Box::new(KellySizer::new(
                self.scenario()?.max_position_pct,
            ))),
        })
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            safe_mode: self.risk.safe_mode,
            limits: ExposureLimits {
                max_per_ticker_pct: self.risk.max_per_ticker_pct,
                max_per_sector_pct: self.risk.max_per_sector_pct,
            },
            min_order_amount: self.risk.min_order_amount,
            max_attempts: self.risk.max_attempts,
            retry_delay: Duration::from_millis(self.risk.retry_delay_ms),
            protective_stop_pct: self.risk.protective_stop_pct,
            default_win_rate: self.risk.default_win_rate,
            instruments: self.instruments(),
        }
    }

    /// BLAKE3 over the canonical JSON of this config plus the dataset hash.
    pub fn run_id(&self, dataset_hash: &str) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(json.as_bytes());
        hasher.update(dataset_hash.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            field: field.to_string(),
            value,
        })
    }
}

fn fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Fraction {
            field: field.to_string(),
            value,
        })
    }
}
