//! Fill engine: the per-instrument, per-bar decision of what trades.
//!
//! Each call to [`FillEngine::step`] looks at one instrument on one bar and
//! applies at most one action, in priority order:
//!
//! 1. trailing stop, 2. take profit, 3. stop loss (long positions, today's range)
//! 4. scalar signal opposing the held side (tomorrow's open)
//! 5. order descriptor (triggered on tomorrow's bar)
//! 6. new entry when flat (tomorrow's open)
//!
//! Today's signal never sees tomorrow's close. Tomorrow's bar only supplies
//! the execution price.

pub mod ledger;
pub mod orders;

pub use ledger::{close_position, increase_position, open_position};
pub use orders::{marketable, order_fill_price};

use crate::domain::{
    Bar, Direction, ExitReason, Fill, OrderDescriptor, OrderSide, Position, PositionSide, Signal,
    TradeRecord,
};
use crate::sizers::{lot_quantity, size_quantity, Sizer, SizingError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Protective exit thresholds, as fractions of the entry price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitRules {
    #[serde(default)]
    pub stop_loss_pct: Option<f64>,
    #[serde(default)]
    pub take_profit_pct: Option<f64>,
    #[serde(default)]
    pub trailing_stop_pct: Option<f64>,
}

/// Inputs for one instrument on one bar.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub signal: Signal,
    pub today: &'a Bar,
    pub tomorrow: &'a Bar,
    pub lot_size: f64,
}

/// What happened on one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub fill: Option<Fill>,
    /// Completed trade when the step closed a position.
    pub trade: Option<TradeRecord>,
    /// True once any exit fired; nothing else may fire for this bar.
    pub exit_executed: bool,
}

impl StepOutcome {
    fn exit(fill: Fill, trade: TradeRecord) -> Self {
        Self {
            fill: Some(fill),
            trade: Some(trade),
            exit_executed: true,
        }
    }

    fn entry(fill: Fill) -> Self {
        Self {
            fill: Some(fill),
            trade: None,
            exit_executed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FillEngine {
    pub rules: ExitRules,
    pub allow_short: bool,
}

impl FillEngine {
    pub fn new(rules: ExitRules, allow_short: bool) -> Self {
        Self { rules, allow_short }
    }

    /// Advance one instrument by one bar.
    pub fn step(
        &self,
        ctx: StepContext<'_>,
        position: &mut Position,
        cash: &mut f64,
        sizer: &dyn Sizer,
    ) -> StepOutcome {
        match position.side() {
            Some(side) => self.manage_open(ctx, side, position, cash),
            None => self.enter(ctx, position, cash, sizer),
        }
    }

    fn manage_open(
        &self,
        ctx: StepContext<'_>,
        side: PositionSide,
        position: &mut Position,
        cash: &mut f64,
    ) -> StepOutcome {
        if side == PositionSide::Long {
            if let Some((price, reason)) = self.protective_exit(position, ctx.today) {
                return close(position, cash, price, ctx.today.date, reason);
            }
        }

        match ctx.signal {
            Signal::Scalar(value) => {
                if side.is_opposed_by(Direction::from_scalar(value)) {
                    return close(
                        position,
                        cash,
                        ctx.tomorrow.open,
                        ctx.tomorrow.date,
                        ExitReason::Signal,
                    );
                }
            }
            Signal::Order(order) => {
                if !side.is_opposed_by(order.side.direction()) {
                    // Same side: no pyramiding.
                    return StepOutcome::default();
                }
                if let Some(price) = order_fill_price(&order, ctx.tomorrow) {
                    return close(position, cash, price, ctx.tomorrow.date, ExitReason::Signal);
                }
            }
        }
        StepOutcome::default()
    }

    /// Rules 1-3 for an open long, evaluated on today's range.
    fn protective_exit(&self, position: &mut Position, today: &Bar) -> Option<(f64, ExitReason)> {
        let entry = position.entry_price;

        if let Some(trail) = self.rules.trailing_stop_pct {
            let stop = position.ratchet_trailing(today.high, trail);
            if today.low <= stop {
                return Some((stop, ExitReason::TrailingStop));
            }
        }
        if entry <= 0.0 {
            return None;
        }
        if let Some(tp) = self.rules.take_profit_pct {
            if (today.high - entry) / entry >= tp {
                return Some((entry * (1.0 + tp), ExitReason::TakeProfit));
            }
        }
        if let Some(sl) = self.rules.stop_loss_pct {
            if (entry - today.low) / entry >= sl {
                return Some((entry * (1.0 - sl), ExitReason::StopLoss));
            }
        }
        None
    }

    fn enter(
        &self,
        ctx: StepContext<'_>,
        position: &mut Position,
        cash: &mut f64,
        sizer: &dyn Sizer,
    ) -> StepOutcome {
        let (side, price, explicit) = match ctx.signal {
            Signal::Scalar(value) => match Direction::from_scalar(value) {
                Direction::Long => (PositionSide::Long, ctx.tomorrow.open, None),
                Direction::Short => (PositionSide::Short, ctx.tomorrow.open, None),
                Direction::Neutral => return StepOutcome::default(),
            },
            Signal::Order(order) => match self.triggered(&order, ctx.tomorrow) {
                Some(price) => (side_of(order.side), price, order.quantity),
                None => return StepOutcome::default(),
            },
        };

        if side == PositionSide::Short && !self.allow_short {
            return StepOutcome::default();
        }

        let quantity = match explicit {
            Some(q) => lot_quantity(q, ctx.lot_size),
            None => size_quantity(sizer, &position.symbol, *cash, price, ctx.lot_size),
        }
        .and_then(|q| affordable(side, q, price, *cash));

        match quantity {
            Ok(quantity) => {
                let fill = open_position(position, cash, side, quantity, price, ctx.tomorrow.date);
                debug!(
                    symbol = %fill.symbol,
                    side = %fill.side,
                    quantity,
                    price,
                    "opened position"
                );
                StepOutcome::entry(fill)
            }
            Err(err) => {
                debug!(symbol = %position.symbol, %err, "entry skipped");
                StepOutcome::default()
            }
        }
    }

    fn triggered(&self, order: &OrderDescriptor, tomorrow: &Bar) -> Option<f64> {
        if let Err(err) = order.validate() {
            warn!(symbol = %tomorrow.symbol, %err, "ignoring invalid order");
            return None;
        }
        order_fill_price(order, tomorrow)
    }
}

fn side_of(side: OrderSide) -> PositionSide {
    match side {
        OrderSide::Buy => PositionSide::Long,
        OrderSide::Sell => PositionSide::Short,
    }
}

fn affordable(side: PositionSide, quantity: f64, price: f64, cash: f64) -> Result<f64, SizingError> {
    let cost = quantity * price;
    if side == PositionSide::Long && cost > cash {
        return Err(SizingError::InsufficientCash { cost, cash });
    }
    Ok(quantity)
}

fn close(
    position: &mut Position,
    cash: &mut f64,
    price: f64,
    date: chrono::NaiveDate,
    reason: ExitReason,
) -> StepOutcome {
    match close_position(position, cash, price, date, reason) {
        Some((fill, trade)) => {
            debug!(
                symbol = %trade.symbol,
                %reason,
                price,
                return_pct = trade.return_pct,
                "closed position"
            );
            StepOutcome::exit(fill, trade)
        }
        None => StepOutcome::default(),
    }
}
