//! Aggregate state of cash and all open positions.

use super::position::Position;
use super::trade::TradeRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Aggregate portfolio state.
///
/// The equity identity must hold at every valuation:
/// `equity == cash + sum(position values)`, with shorts valued by open PnL only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    /// Mark-to-market equity, one entry per valuation.
    pub equity_history: Vec<f64>,
    pub trades: Vec<TradeRecord>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            equity_history: Vec::new(),
            trades: Vec::new(),
        }
    }

    /// Total equity = cash + sum of position values.
    ///
    /// A position without a price in `prices` is valued at its entry price.
    pub fn equity(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .filter(|p| !p.is_flat())
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                pos.value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Gross notional per open position, for exposure checks.
    pub fn exposures(&self, prices: &HashMap<String, f64>) -> HashMap<String, f64> {
        self.positions
            .values()
            .filter(|p| !p.is_flat())
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                (pos.symbol.clone(), pos.notional(price))
            })
            .collect()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.position(symbol).is_some()
    }

    /// Open position for `symbol`, if any.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol).filter(|p| !p.is_flat())
    }

    /// Position slot for `symbol`, created flat if missing.
    pub fn slot_mut(&mut self, symbol: &str) -> &mut Position {
        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol))
    }

    /// Open positions in symbol order.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| !p.is_flat())
    }

    pub fn record_equity(&mut self, equity: f64) {
        self.equity_history.push(equity);
    }
}
