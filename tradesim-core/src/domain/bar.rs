//! The fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol on a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("{symbol} {date}: non-finite price")]
    NonFinite { symbol: String, date: NaiveDate },

    #[error("{symbol} {date}: non-positive price")]
    NonPositive { symbol: String, date: NaiveDate },

    #[error("{symbol} {date}: high/low do not bracket open/close")]
    Inconsistent { symbol: String, date: NaiveDate },
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::NonFinite {
                symbol: self.symbol.clone(),
                date: self.date,
            });
        }
        if self.open <= 0.0 || self.close <= 0.0 || self.low <= 0.0 {
            return Err(BarError::NonPositive {
                symbol: self.symbol.clone(),
                date: self.date,
            });
        }
        let bracketed = self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close;
        if !bracketed {
            return Err(BarError::Inconsistent {
                symbol: self.symbol.clone(),
                date: self.date,
            });
        }
        Ok(())
    }

    pub fn is_sane(&self) -> bool {
        self.validate().is_ok()
    }

    /// Flat bar at this close for `date`, when the symbol did not trade.
    ///
    /// Open, high and low all equal the previous close, so a gap day never
    /// replays yesterday's range.
    pub fn carried_to(&self, date: NaiveDate) -> Self {
        Self {
            symbol: self.symbol.clone(),
            date,
            open: self.close,
            high: self.close,
            low: self.close,
            close: self.close,
            volume: 0,
        }
    }
}
