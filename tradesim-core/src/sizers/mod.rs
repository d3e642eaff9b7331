//! Position sizers: how much capital a new position receives.
//!
//! A sizer only answers "how much currency". Converting that into a lot-rounded
//! quantity and rejecting unfillable sizes happens in [`size_quantity`], which
//! both the fill engine and the execution engine share.

pub mod fixed;
pub mod kelly;

pub use fixed::FixedFractionSizer;
pub use kelly::{KellySizer, SizeDecision};

use crate::domain::round_to_lot;
use thiserror::Error;

/// Sizes new positions.
pub trait Sizer: Send + Sync {
    /// Currency to commit to a new position in `symbol`, given the cash available.
    fn allocation(&self, symbol: &str, available_cash: f64) -> f64;

    fn name(&self) -> &str;
}

/// Reasons a sizing attempt yields no order. None of these are fatal.
#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    #[error("fill price {0} is not positive")]
    InvalidPrice(f64),

    #[error("sizer allocated nothing")]
    NoAllocation,

    #[error("quantity rounds to zero at lot size {lot_size}")]
    BelowLot { lot_size: f64 },

    #[error("cost {cost:.2} exceeds available cash {cash:.2}")]
    InsufficientCash { cost: f64, cash: f64 },
}

/// Quantity for an allocation at `price`, rounded down to `lot_size`.
pub fn quantity_for(allocation: f64, price: f64, lot_size: f64) -> Result<f64, SizingError> {
    if !(price.is_finite() && price > 0.0) {
        return Err(SizingError::InvalidPrice(price));
    }
    if !(allocation.is_finite() && allocation > 0.0) {
        return Err(SizingError::NoAllocation);
    }
    lot_quantity(allocation / price, lot_size)
}

/// `quantity` rounded down to `lot_size`; an error if nothing is left.
pub fn lot_quantity(quantity: f64, lot_size: f64) -> Result<f64, SizingError> {
    let quantity = round_to_lot(quantity, lot_size);
    if quantity <= 0.0 {
        return Err(SizingError::BelowLot { lot_size });
    }
    Ok(quantity)
}

/// Ask `sizer` for an allocation and turn it into a fillable quantity.
pub fn size_quantity(
    sizer: &dyn Sizer,
    symbol: &str,
    available_cash: f64,
    price: f64,
    lot_size: f64,
) -> Result<f64, SizingError> {
    let allocation = sizer.allocation(symbol, available_cash.max(0.0));
    quantity_for(allocation, price, lot_size)
}
