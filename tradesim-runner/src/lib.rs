//! tradesim runner: configuration, data loading, backtest orchestration, export.
//!
//! - [`config`]: TOML configuration and content-addressed run ids
//! - [`data_loader`]: CSV bars and signals, synthetic data, dataset hashes
//! - [`runner`]: one backtest from config + data
//! - [`batch`]: independent runs in parallel
//! - [`export`]: report JSON, trade ledger and equity CSV

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use batch::{run_all, run_batch};
pub use config::{BacktestConfig, ConfigError, RunId, SizerKind};
pub use data_loader::{load_csv, load_synthetic, LoadError, LoadedData};
pub use export::{save_artifacts, ExportError};
pub use runner::{run_backtest, RunError, RunOutcome, SCHEMA_VERSION};
