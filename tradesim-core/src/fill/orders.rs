//! Order-descriptor trigger rules.
//!
//! Against a bar (backtest): market orders fill at the open; limit and stop
//! orders fill when the bar's range reaches their level, at the level or at a
//! better open when the bar gaps through it.
//!
//! Against a single price (live): an order is marketable when the price is on
//! the executable side of its level.

use crate::domain::{Bar, OrderDescriptor, OrderKind, OrderSide};

/// Fill price of `order` on `bar`, or `None` if it does not trigger.
pub fn order_fill_price(order: &OrderDescriptor, bar: &Bar) -> Option<f64> {
    if bar.is_void() {
        return None;
    }
    match (order.kind, order.side) {
        (OrderKind::Market, _) => Some(bar.open),
        (OrderKind::Limit, OrderSide::Buy) => {
            let limit = order.price?;
            (bar.low <= limit).then(|| limit.min(bar.open))
        }
        (OrderKind::Limit, OrderSide::Sell) => {
            let limit = order.price?;
            (bar.high >= limit).then(|| limit.max(bar.open))
        }
        (OrderKind::Stop, OrderSide::Buy) => {
            let stop = order.price?;
            (bar.high >= stop).then(|| stop.max(bar.open))
        }
        (OrderKind::Stop, OrderSide::Sell) => {
            let stop = order.price?;
            (bar.low <= stop).then(|| stop.min(bar.open))
        }
    }
}

/// Whether `order` can execute at the quoted `price`.
pub fn marketable(order: &OrderDescriptor, price: f64) -> bool {
    let Some(level) = order.price else {
        return order.kind == OrderKind::Market;
    };
    match (order.kind, order.side) {
        (OrderKind::Market, _) => true,
        (OrderKind::Limit, OrderSide::Buy) | (OrderKind::Stop, OrderSide::Sell) => price <= level,
        (OrderKind::Limit, OrderSide::Sell) | (OrderKind::Stop, OrderSide::Buy) => price >= level,
    }
}
