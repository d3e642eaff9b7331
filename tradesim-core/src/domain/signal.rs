//! Signals consumed by the fill engine and the execution engine.
//!
//! A signal is either a directional scalar or an explicit order descriptor.
//! This crate never produces signals; it only interprets them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Absolute scalar value at which a signal opens or covers a position.
pub const ENTRY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    #[error("unknown order kind '{0}' (expected market, limit or stop)")]
    UnknownKind(String),

    #[error("unknown order side '{0}' (expected buy or sell)")]
    UnknownSide(String),

    #[error("{kind} order requires a positive price")]
    MissingPrice { kind: OrderKind },

    #[error("order quantity must be positive, got {0}")]
    InvalidQuantity(f64),
}

/// Desired direction expressed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Explicit order: kind, side, trigger/limit price and optional quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderDescriptor {
    pub kind: OrderKind,
    pub side: OrderSide,
    /// Limit price for `Limit`, trigger price for `Stop`; ignored for `Market`.
    pub price: Option<f64>,
    /// Explicit quantity; `None` defers to the sizer.
    pub quantity: Option<f64>,
}

/// One signal value for one instrument on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Scalar(f64),
    Order(OrderDescriptor),
}

impl Default for Signal {
    fn default() -> Self {
        Self::flat()
    }
}

impl Signal {
    /// The no-op signal.
    pub fn flat() -> Self {
        Self::Scalar(0.0)
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Scalar(value) => Direction::from_scalar(*value),
            Self::Order(order) => order.side.direction(),
        }
    }

    /// Direction of a scalar signal; `None` for order descriptors.
    pub fn scalar_direction(&self) -> Option<Direction> {
        match self {
            Self::Scalar(value) => Some(Direction::from_scalar(*value)),
            Self::Order(_) => None,
        }
    }
}

impl Direction {
    pub fn from_scalar(value: f64) -> Self {
        if value >= ENTRY_THRESHOLD {
            Self::Long
        } else if value <= -ENTRY_THRESHOLD {
            Self::Short
        } else {
            // NaN lands here too.
            Self::Neutral
        }
    }
}

impl OrderSide {
    pub fn direction(self) -> Direction {
        match self {
            Self::Buy => Direction::Long,
            Self::Sell => Direction::Short,
        }
    }
}

impl OrderDescriptor {
    pub fn market(side: OrderSide) -> Self {
        Self {
            kind: OrderKind::Market,
            side,
            price: None,
            quantity: None,
        }
    }

    pub fn limit(side: OrderSide, price: f64) -> Self {
        Self {
            kind: OrderKind::Limit,
            side,
            price: Some(price),
            quantity: None,
        }
    }

    pub fn stop(side: OrderSide, price: f64) -> Self {
        Self {
            kind: OrderKind::Stop,
            side,
            price: Some(price),
            quantity: None,
        }
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        if self.kind != OrderKind::Market {
            match self.price {
                Some(p) if p.is_finite() && p > 0.0 => {}
                _ => return Err(SignalError::MissingPrice { kind: self.kind }),
            }
        }
        if let Some(q) = self.quantity {
            if !(q.is_finite() && q > 0.0) {
                return Err(SignalError::InvalidQuantity(q));
            }
        }
        Ok(())
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
        };
        f.write_str(s)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderKind {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Self::Market),
            "limit" => Ok(Self::Limit),
            "stop" => Ok(Self::Stop),
            other => Err(SignalError::UnknownKind(other.to_string())),
        }
    }
}

impl FromStr for OrderSide {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(SignalError::UnknownSide(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_thresholds() {
        assert_eq!(Signal::Scalar(0.5).direction(), Direction::Long);
        assert_eq!(Signal::Scalar(0.49).direction(), Direction::Neutral);
        assert_eq!(Signal::Scalar(-0.5).direction(), Direction::Short);
        assert_eq!(Signal::Scalar(f64::NAN).direction(), Direction::Neutral);
        assert_eq!(Signal::flat().direction(), Direction::Neutral);
    }

    #[test]
    fn order_direction_follows_side() {
        let buy = Signal::Order(OrderDescriptor::market(OrderSide::Buy));
        let sell = Signal::Order(OrderDescriptor::limit(OrderSide::Sell, 10.0));
        assert_eq!(buy.direction(), Direction::Long);
        assert_eq!(sell.direction(), Direction::Short);
        assert_eq!(buy.scalar_direction(), None);
    }

    #[test]
    fn limit_without_price_is_invalid() {
        let order = OrderDescriptor {
            kind: OrderKind::Limit,
            side: OrderSide::Buy,
            price: None,
            quantity: None,
        };
        assert_eq!(
            order.validate(),
            Err(SignalError::MissingPrice {
                kind: OrderKind::Limit
            })
        );
        assert!(OrderDescriptor::market(OrderSide::Buy).validate().is_ok());
        assert!(OrderDescriptor::market(OrderSide::Buy)
            .with_quantity(-1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn parse_kind_and_side() {
        assert_eq!("LIMIT".parse::<OrderKind>().unwrap(), OrderKind::Limit);
        assert_eq!(" sell ".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("fok".parse::<OrderKind>().is_err());
    }

    #[test]
    fn signal_json_shape() {
        let json = serde_json::to_string(&Signal::Scalar(0.7)).unwrap();
        assert_eq!(json, r#"{"scalar":0.7}"#);
        let order = Signal::Order(OrderDescriptor::stop(OrderSide::Buy, 101.0));
        let back: Signal = serde_json::from_str(&serde_json::to_string(&order).unwrap()).unwrap();
        assert_eq!(back, order);
    }
}
