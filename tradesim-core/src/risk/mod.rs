//! Risk gate: scenarios, halts, sizing slowdowns, exposure limits.

pub mod exposure;
pub mod gate;
pub mod scenario;
pub mod tail;

pub use exposure::{
    ExposureBreach, ExposureLimits, DEFAULT_MAX_PER_SECTOR_PCT, DEFAULT_MAX_PER_TICKER_PCT,
};
pub use gate::{HaltReason, MarketConditions, RiskGate};
pub use scenario::{RiskScenario, ScenarioError, ScenarioName};
pub use tail::{cvar, cvar_factor, percentile};
