//! External collaborators the execution engine talks to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    /// The broker does not implement this operation; never retried.
    #[error("{broker}: operation not supported")]
    Unsupported { broker: String },

    #[error("{broker} rejected the order: {reason}")]
    Rejected { broker: String, reason: String },

    #[error("{broker} unavailable: {reason}")]
    Unavailable { broker: String, reason: String },
}

impl BrokerError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unsupported { .. })
    }
}

/// Order routing to a paper or live account.
#[async_trait]
pub trait Broker: Send + Sync {
    fn name(&self) -> &str;

    /// Place a buy; `true` when the broker accepted it.
    async fn buy(&self, symbol: &str, quantity: f64, price: f64) -> bool;

    /// Place a sell. Live brokers answer [`BrokerError::Unsupported`].
    async fn sell(&self, symbol: &str, quantity: f64, price: f64) -> Result<bool, BrokerError>;

    /// Account cash as reported by the broker, if it reports one.
    async fn balance(&self) -> Option<f64> {
        None
    }
}

/// Host health as seen by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub disk_ok: bool,
    pub memory_ok: bool,
    pub api_ok: bool,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            disk_ok: true,
            memory_ok: true,
            api_ok: true,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.disk_ok && self.memory_ok && self.api_ok
    }
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> HealthStatus;
}

/// Fundamentals lookup; only the sector is needed here.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn sector(&self, symbol: &str) -> Option<String>;
}
