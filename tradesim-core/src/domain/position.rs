use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::signal::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }

    /// True when `direction` asks for the other side of the book.
    pub fn is_opposed_by(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Self::Long, Direction::Short) | (Self::Short, Direction::Long)
        )
    }
}

/// Signed holding in one instrument.
///
/// Quantity is positive for longs, negative for shorts and zero when flat.
/// A flat position carries no entry or stop state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_date: Option<NaiveDate>,
    /// Highest price seen since entry (trailing-stop reference).
    pub highest_price: f64,
    /// Current trailing-stop level; only ever ratchets upward.
    pub trailing_stop: f64,
    /// Protective stop attached by the execution engine after a live buy.
    pub protective_stop: Option<f64>,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0.0,
            entry_price: 0.0,
            entry_date: None,
            highest_price: 0.0,
            trailing_stop: 0.0,
            protective_stop: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }

    pub fn side(&self) -> Option<PositionSide> {
        if self.quantity > 0.0 {
            Some(PositionSide::Long)
        } else if self.quantity < 0.0 {
            Some(PositionSide::Short)
        } else {
            None
        }
    }

    /// Contribution to equity at `close`.
    ///
    /// Longs are worth `qty * close`. Shorts hold no cash proceeds (margin model),
    /// so they contribute only their open PnL `(entry - close) * |qty|`.
    pub fn value(&self, close: f64) -> f64 {
        match self.side() {
            Some(PositionSide::Long) => self.quantity * close,
            Some(PositionSide::Short) => (self.entry_price - close) * self.quantity.abs(),
            None => 0.0,
        }
    }

    /// Gross notional at `price`, used for exposure limits.
    pub fn notional(&self, price: f64) -> f64 {
        self.quantity.abs() * price
    }

    /// Raise the high-water mark and the trailing stop; returns the stop level.
    pub fn ratchet_trailing(&mut self, high: f64, trail_pct: f64) -> f64 {
        self.highest_price = self.highest_price.max(high);
        self.trailing_stop = self
            .trailing_stop
            .max(self.highest_price * (1.0 - trail_pct));
        self.trailing_stop
    }

    /// Back to a blank, flat position.
    pub fn reset(&mut self) {
        let symbol = std::mem::take(&mut self.symbol);
        *self = Self::flat(symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(qty: f64, entry: f64) -> Position {
        Position {
            quantity: qty,
            entry_price: entry,
            highest_price: entry,
            ..Position::flat("SPY")
        }
    }

    #[test]
    fn long_value_is_mark_to_market() {
        assert_eq!(long(10.0, 100.0).value(110.0), 1_100.0);
    }

    #[test]
    fn short_value_is_open_pnl_only() {
        let short = long(-10.0, 100.0);
        assert_eq!(short.side(), Some(PositionSide::Short));
        assert_eq!(short.value(90.0), 100.0);
        assert_eq!(short.value(105.0), -50.0);
        assert_eq!(short.notional(90.0), 900.0);
    }

    #[test]
    fn trailing_stop_never_loosens() {
        let mut pos = long(1.0, 100.0);
        assert_eq!(pos.ratchet_trailing(110.0, 0.10), 99.0);
        // Lower high: watermark and stop stay put.
        assert_eq!(pos.ratchet_trailing(105.0, 0.10), 99.0);
        assert_eq!(pos.highest_price, 110.0);
    }

    #[test]
    fn reset_keeps_symbol_only() {
        let mut pos = long(5.0, 100.0);
        pos.protective_stop = Some(95.0);
        pos.reset();
        assert!(pos.is_flat());
        assert_eq!(pos, Position::flat("SPY"));
    }

    #[test]
    fn opposition() {
        assert!(PositionSide::Long.is_opposed_by(Direction::Short));
        assert!(!PositionSide::Long.is_opposed_by(Direction::Neutral));
        assert!(PositionSide::Short.is_opposed_by(Direction::Long));
    }
}
