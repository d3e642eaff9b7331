//! In-memory collaborators: paper broker, fixed health, static fundamentals.

use crate::collaborators::{Broker, BrokerError, FundamentalsSource, HealthProbe, HealthStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tradesim_core::domain::OrderSide;

/// An order the paper broker accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
}

/// Accepts every order and keeps a blotter.
#[derive(Debug, Default)]
pub struct PaperBroker {
    orders: Mutex<Vec<BrokerOrder>>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every order accepted so far.
    pub fn orders(&self) -> Vec<BrokerOrder> {
        self.orders.lock().clone()
    }

    fn record(&self, symbol: &str, side: OrderSide, quantity: f64, price: f64) {
        self.orders.lock().push(BrokerOrder {
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
        });
    }
}

#[async_trait]
impl Broker for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    async fn buy(&self, symbol: &str, quantity: f64, price: f64) -> bool {
        self.record(symbol, OrderSide::Buy, quantity, price);
        true
    }

    async fn sell(&self, symbol: &str, quantity: f64, price: f64) -> Result<bool, BrokerError> {
        self.record(symbol, OrderSide::Sell, quantity, price);
        Ok(true)
    }
}

/// Health probe returning a fixed status.
#[derive(Debug, Clone, Copy)]
pub struct StaticHealth(pub HealthStatus);

impl Default for StaticHealth {
    fn default() -> Self {
        Self(HealthStatus::healthy())
    }
}

#[async_trait]
impl HealthProbe for StaticHealth {
    async fn check(&self) -> HealthStatus {
        self.0
    }
}

/// Fundamentals from a fixed symbol -> sector map.
#[derive(Debug, Default)]
pub struct StaticFundamentals {
    sectors: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl StaticFundamentals {
    pub fn new(sectors: HashMap<String, String>) -> Self {
        Self {
            sectors,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of lookups served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FundamentalsSource for StaticFundamentals {
    async fn sector(&self, symbol: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.sectors.get(symbol).cloned()
    }
}
