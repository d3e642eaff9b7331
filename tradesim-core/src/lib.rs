//! tradesim core: domain types, fill engine, backtest simulator, sizing and risk.
//!
//! This crate holds everything that does not need I/O or async:
//! - Domain types (bars, signals, positions, trades, portfolio)
//! - Input alignment and per-bar signal tables
//! - Fill engine with protective exits and order-descriptor triggers
//! - Bar-by-bar backtest simulator and performance metrics
//! - Fixed-fraction and Kelly position sizers
//! - Risk gate: scenarios, halts, volatility and tail-risk factors, exposure limits

pub mod data;
pub mod domain;
pub mod engine;
pub mod fill;
pub mod metrics;
pub mod risk;
pub mod sizers;
