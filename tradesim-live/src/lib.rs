//! tradesim live: the async, risk-gated execution engine.
//!
//! - [`ExecutionEngine`] runs batches of signals through health, halt,
//!   sizing and exposure checks and dispatches survivors to a broker
//! - Collaborator traits ([`Broker`], [`HealthProbe`], [`FundamentalsSource`])
//!   and in-memory implementations for paper trading and tests
//! - [`ScenarioHandle`] for swapping the risk scenario at runtime

pub mod collaborators;
pub mod engine;
pub mod paper;
pub mod scenario;
pub mod sector_cache;

pub use collaborators::{Broker, BrokerError, FundamentalsSource, HealthProbe, HealthStatus};
pub use engine::{
    ExecutedOrder, ExecutionConfig, ExecutionEngine, ExecutionReport, MarketSnapshot,
    RejectReason, RejectedOrder, TradeSignal,
};
pub use paper::{BrokerOrder, PaperBroker, StaticFundamentals, StaticHealth};
pub use scenario::ScenarioHandle;
pub use sector_cache::SectorCache;
