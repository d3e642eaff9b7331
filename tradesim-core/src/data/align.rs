//! Multi-symbol time alignment.
//!
//! Bars for several symbols are placed on the union of their dates. A date a
//! symbol has no bar for repeats that symbol's previous bar (forward fill).
//! Dates before a symbol's first bar stay empty.

use crate::domain::Bar;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// Bar data for multiple symbols on a common timeline.
#[derive(Debug, Clone, Default)]
pub struct AlignedBars {
    /// The common date axis (sorted ascending).
    pub dates: Vec<NaiveDate>,
    /// Symbols in sorted order.
    pub symbols: Vec<String>,
    /// Per symbol, one slot per entry in `dates`.
    bars: HashMap<String, Vec<Option<Bar>>>,
    /// Real (non forward-filled) bars per symbol.
    observed: HashMap<String, usize>,
}

impl AlignedBars {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Bar for `symbol` at index `t`, if the symbol has started trading.
    pub fn bar(&self, symbol: &str, t: usize) -> Option<&Bar> {
        self.bars.get(symbol)?.get(t)?.as_ref()
    }

    pub fn close(&self, symbol: &str, t: usize) -> Option<f64> {
        self.bar(symbol, t).map(|b| b.close)
    }

    /// Closing prices of every symbol with a bar at `t`.
    pub fn closes_at(&self, t: usize) -> HashMap<String, f64> {
        self.symbols
            .iter()
            .filter_map(|s| self.close(s, t).map(|c| (s.clone(), c)))
            .collect()
    }

    pub fn series(&self, symbol: &str) -> Option<&[Option<Bar>]> {
        self.bars.get(symbol).map(|v| v.as_slice())
    }

    /// Number of real bars `symbol` contributed before forward fill.
    pub fn observed_bars(&self, symbol: &str) -> usize {
        self.observed.get(symbol).copied().unwrap_or(0)
    }
}

/// Align multiple symbols to a common, forward-filled timeline.
///
/// Bars failing the sanity check are dropped (and forward-filled over) with a
/// warning. Duplicate dates keep the last bar supplied.
pub fn align_bars(symbol_bars: HashMap<String, Vec<Bar>>) -> AlignedBars {
    let mut by_symbol: BTreeMap<String, BTreeMap<NaiveDate, Bar>> = BTreeMap::new();
    for (symbol, bars) in symbol_bars {
        let entry = by_symbol.entry(symbol).or_default();
        for bar in bars {
            if let Err(err) = bar.validate() {
                warn!(%err, "dropping bar");
                continue;
            }
            entry.insert(bar.date, bar);
        }
    }

    let dates: Vec<NaiveDate> = by_symbol
        .values()
        .flat_map(|m| m.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut bars = HashMap::with_capacity(by_symbol.len());
    let mut observed = HashMap::with_capacity(by_symbol.len());
    for (symbol, date_map) in &by_symbol {
        let mut last: Option<&Bar> = None;
        let aligned: Vec<Option<Bar>> = dates
            .iter()
            .map(|date| match date_map.get(date) {
                Some(bar) => {
                    last = Some(bar);
                    Some(bar.clone())
                }
                None => last.map(|prev| prev.carried_to(*date)),
            })
            .collect();
        observed.insert(symbol.clone(), date_map.len());
        bars.insert(symbol.clone(), aligned);
    }

    AlignedBars {
        dates,
        symbols: by_symbol.keys().cloned().collect(),
        bars,
        observed,
    }
}
