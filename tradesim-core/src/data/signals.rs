//! Per-bar signal table aligned to an `AlignedBars` date axis.

use crate::domain::Signal;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Exactly one signal per symbol per bar. Missing entries read as flat.
#[derive(Debug, Clone, Default)]
pub struct SignalTable {
    len: usize,
    signals: BTreeMap<String, Vec<Signal>>,
}

impl SignalTable {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            signals: BTreeMap::new(),
        }
    }

    /// Attach a full series for `symbol`; it is truncated or padded with flat
    /// signals to the table length.
    pub fn insert(&mut self, symbol: impl Into<String>, mut series: Vec<Signal>) {
        series.resize(self.len, Signal::flat());
        self.signals.insert(symbol.into(), series);
    }

    /// Build a table from dated signals. Signals on dates outside `dates` are ignored.
    pub fn from_dated(
        dates: &[NaiveDate],
        dated: HashMap<String, Vec<(NaiveDate, Signal)>>,
    ) -> Self {
        let index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let mut table = Self::new(dates.len());
        for (symbol, entries) in dated {
            let mut series = vec![Signal::flat(); dates.len()];
            for (date, signal) in entries {
                if let Some(&t) = index.get(&date) {
                    series[t] = signal;
                }
            }
            table.signals.insert(symbol, series);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, symbol: &str, t: usize) -> Signal {
        self.signals
            .get(symbol)
            .and_then(|s| s.get(t))
            .copied()
            .unwrap_or_default()
    }

    /// Full series for `symbol` (flat if the symbol has no signals).
    pub fn series(&self, symbol: &str) -> Vec<Signal> {
        self.signals
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| vec![Signal::flat(); self.len])
    }
}
