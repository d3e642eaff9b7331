//! Backtest runner: wires a validated config and loaded data into the simulator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use tradesim_core::engine::{BacktestReport, BacktestSimulator};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{LoadError, LoadedData};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("no bars to simulate")]
    NoBars,
}

/// Current schema version for persisted outcomes.
pub const SCHEMA_VERSION: u32 = 1;

/// A finished run with the provenance needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub config: BacktestConfig,
    pub report: BacktestReport,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run one backtest over pre-loaded data. No I/O.
pub fn run_backtest(config: &BacktestConfig, data: &LoadedData) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let (Some(&start_date), Some(&end_date)) = (data.bars.dates.first(), data.bars.dates.last())
    else {
        return Err(RunError::NoBars);
    };

    let sim_config = config.to_simulator_config();
    let simulator = match config.sizer()? {
        Some(sizer) => BacktestSimulator::with_sizer(sim_config, sizer),
        None => BacktestSimulator::new(sim_config),
    };
    let report = simulator.run(&data.bars, &data.signals);
    let run_id = config.run_id(&data.dataset_hash)?;

    info!(run_id = %&run_id[..12], summary = %report.summary(), "backtest complete");

    Ok(RunOutcome {
        schema_version: SCHEMA_VERSION,
        run_id,
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.has_synthetic,
        start_date,
        end_date,
        config: config.clone(),
        report,
    })
}
