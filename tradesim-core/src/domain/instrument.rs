use serde::{Deserialize, Serialize};

/// Lot size used when an instrument has no explicit metadata.
pub const DEFAULT_LOT_SIZE: f64 = 1.0;

/// Instrument metadata: lot size and sector grouping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    #[serde(default = "default_lot_size")]
    pub lot_size: f64,
    #[serde(default)]
    pub sector: Option<String>,
}

fn default_lot_size() -> f64 {
    DEFAULT_LOT_SIZE
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, lot_size: f64) -> Self {
        Self {
            symbol: symbol.into(),
            lot_size,
            sector: None,
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    /// Round a quantity down to a whole number of lots.
    pub fn round_down(&self, quantity: f64) -> f64 {
        round_to_lot(quantity, self.lot_size)
    }
}

/// Round `quantity` down to a multiple of `lot_size`.
///
/// A small epsilon absorbs representation error (2.9999999 lots is 3 lots).
/// Non-positive or non-finite inputs round to zero.
pub fn round_to_lot(quantity: f64, lot_size: f64) -> f64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0.0;
    }
    if !(lot_size.is_finite() && lot_size > 0.0) {
        return quantity;
    }
    let lots = (quantity / lot_size + 1e-9).floor();
    lots * lot_size
}
