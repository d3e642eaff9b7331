use crate::domain::signal::OrderSide;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Whether a fill opened or closed a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillAction {
    Open,
    Close,
}

/// Fill record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub date: NaiveDate,
    pub side: OrderSide,
    pub action: FillAction,
    pub quantity: f64,
    pub price: f64,
    /// Change applied to cash by this fill.
    pub cash_delta: f64,
}
