//! Cash and position bookkeeping shared by the simulator and the execution engine.
//!
//! Longs move cash by `qty * price` in both directions. Shorts follow a margin
//! model: opening one leaves cash untouched and closing one settles the PnL
//! `(entry - exit) * |qty|`.

use crate::domain::{
    trade_return, ExitReason, Fill, FillAction, OrderSide, Position, PositionSide, TradeRecord,
};
use chrono::NaiveDate;

/// Open a position on a flat slot.
///
/// The caller is responsible for the slot being flat and `quantity` positive.
pub fn open_position(
    position: &mut Position,
    cash: &mut f64,
    side: PositionSide,
    quantity: f64,
    price: f64,
    date: NaiveDate,
) -> Fill {
    let cash_delta = match side {
        PositionSide::Long => -quantity * price,
        PositionSide::Short => 0.0,
    };
    *cash += cash_delta;

    position.quantity = quantity * f64::from(side.sign());
    position.entry_price = price;
    position.entry_date = Some(date);
    position.highest_price = price;
    position.trailing_stop = 0.0;
    position.protective_stop = None;

    Fill {
        symbol: position.symbol.clone(),
        date,
        side: match side {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        },
        action: FillAction::Open,
        quantity,
        price,
        cash_delta,
    }
}

/// Add to an existing long at `price`, averaging the entry price.
pub fn increase_position(
    position: &mut Position,
    cash: &mut f64,
    quantity: f64,
    price: f64,
    date: NaiveDate,
) -> Fill {
    let held = position.quantity.max(0.0);
    let total = held + quantity;
    if total > 0.0 {
        position.entry_price = (position.entry_price * held + price * quantity) / total;
    }
    if position.entry_date.is_none() {
        position.entry_date = Some(date);
    }
    position.quantity = total;
    position.highest_price = position.highest_price.max(price);

    let cash_delta = -quantity * price;
    *cash += cash_delta;

    Fill {
        symbol: position.symbol.clone(),
        date,
        side: OrderSide::Buy,
        action: FillAction::Open,
        quantity,
        price,
        cash_delta,
    }
}

/// Close the whole position at `price`, returning the fill and the completed trade.
///
/// Returns `None` for a flat slot. The slot is reset to blank afterwards.
pub fn close_position(
    position: &mut Position,
    cash: &mut f64,
    price: f64,
    date: NaiveDate,
    reason: ExitReason,
) -> Option<(Fill, TradeRecord)> {
    let side = position.side()?;
    let quantity = position.quantity.abs();
    let entry = position.entry_price;

    let cash_delta = match side {
        PositionSide::Long => quantity * price,
        PositionSide::Short => (entry - price) * quantity,
    };
    *cash += cash_delta;

    let fill = Fill {
        symbol: position.symbol.clone(),
        date,
        side: match side {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        },
        action: FillAction::Close,
        quantity,
        price,
        cash_delta,
    };
    let trade = TradeRecord {
        symbol: position.symbol.clone(),
        side,
        entry_date: position.entry_date,
        entry_price: entry,
        exit_date: date,
        exit_price: price,
        quantity,
        return_pct: trade_return(side, entry, price),
        exit_reason: reason,
    };

    position.reset();
    Some((fill, trade))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn long_round_trip_moves_cash() {
        let mut pos = Position::flat("SPY");
        let mut cash = 10_000.0;
        let fill = open_position(&mut pos, &mut cash, PositionSide::Long, 10.0, 100.0, d(2));
        assert_eq!(cash, 9_000.0);
        assert_eq!(fill.cash_delta, -1_000.0);
        assert_eq!(pos.quantity, 10.0);

        let (fill, trade) =
            close_position(&mut pos, &mut cash, 110.0, d(5), ExitReason::Signal).unwrap();
        assert_eq!(cash, 10_100.0);
        assert_eq!(fill.side, OrderSide::Sell);
        assert!((trade.return_pct - 0.10).abs() < 1e-12);
        assert!(pos.is_flat());
        assert_eq!(pos, Position::flat("SPY"));
    }

    #[test]
    fn short_is_margin_accounted() {
        let mut pos = Position::flat("SPY");
        let mut cash = 10_000.0;
        open_position(&mut pos, &mut cash, PositionSide::Short, 10.0, 100.0, d(2));
        assert_eq!(cash, 10_000.0);
        assert_eq!(pos.quantity, -10.0);

        let (fill, trade) =
            close_position(&mut pos, &mut cash, 90.0, d(3), ExitReason::Signal).unwrap();
        assert_eq!(cash, 10_100.0);
        assert_eq!(fill.side, OrderSide::Buy);
        assert_eq!(trade.side, PositionSide::Short);
        assert!((trade.return_pct - 0.10).abs() < 1e-12);
    }

    #[test]
    fn closing_flat_is_a_no_op() {
        let mut pos = Position::flat("SPY");
        let mut cash = 1_000.0;
        assert!(close_position(&mut pos, &mut cash, 10.0, d(2), ExitReason::Signal).is_none());
        assert_eq!(cash, 1_000.0);
    }

    #[test]
    fn increase_averages_entry() {
        let mut pos = Position::flat("SPY");
        let mut cash = 10_000.0;
        open_position(&mut pos, &mut cash, PositionSide::Long, 10.0, 100.0, d(2));
        increase_position(&mut pos, &mut cash, 10.0, 110.0, d(3));
        assert_eq!(pos.quantity, 20.0);
        assert!((pos.entry_price - 105.0).abs() < 1e-12);
        assert_eq!(pos.entry_date, Some(d(2)));
        assert_eq!(cash, 10_000.0 - 1_000.0 - 1_100.0);
    }
}
