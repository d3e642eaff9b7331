//! Several independent configurations over the same data.
//!
//! Each run owns its portfolio, so runs share nothing but the read-only
//! inputs and parallelize with rayon.

use rayon::prelude::*;

use crate::config::BacktestConfig;
use crate::data_loader::LoadedData;
use crate::runner::{run_backtest, RunError, RunOutcome};

/// Run every config, in parallel when `parallel` is set. Outcomes keep the
/// order of `configs`.
pub fn run_batch(
    configs: &[BacktestConfig],
    data: &LoadedData,
    parallel: bool,
) -> Vec<Result<RunOutcome, RunError>> {
    if parallel {
        configs
            .par_iter()
            .map(|config| run_backtest(config, data))
            .collect()
    } else {
        configs
            .iter()
            .map(|config| run_backtest(config, data))
            .collect()
    }
}

/// Like [`run_batch`] but fails on the first error.
pub fn run_all(
    configs: &[BacktestConfig],
    data: &LoadedData,
    parallel: bool,
) -> Result<Vec<RunOutcome>, RunError> {
    run_batch(configs, data, parallel).into_iter().collect()
}
