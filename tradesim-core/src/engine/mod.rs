//! Backtest simulator and its report.

pub mod report;
pub mod simulator;

pub use report::{position_sign, BacktestReport};
pub use simulator::{BacktestSimulator, SimulatorConfig};
