//! Bar-by-bar backtest loop.
//!
//! For every bar `t` except the last, each instrument (in sorted symbol order)
//! is stepped through the fill engine with today's bar and tomorrow's bar.
//! After the bar's fills the portfolio is valued at close(t). The last bar only
//! gets a valuation, so the equity curve has one point per bar.

use crate::data::{AlignedBars, SignalTable};
use crate::domain::{Fill, Instrument, Portfolio, Position, DEFAULT_LOT_SIZE};
use crate::fill::{ExitRules, FillEngine, StepContext};
use crate::metrics::PerformanceMetrics;
use crate::sizers::{FixedFractionSizer, Sizer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::report::{position_sign, BacktestReport};

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    /// Fraction of available cash committed to each new position.
    pub position_size_pct: f64,
    #[serde(default)]
    pub position_size_overrides: BTreeMap<String, f64>,
    #[serde(default)]
    pub exits: ExitRules,
    #[serde(default)]
    pub allow_short: bool,
    /// Carried into the report; fills do not charge it.
    #[serde(default)]
    pub commission: f64,
    /// Carried into the report; fills do not apply it.
    #[serde(default)]
    pub slippage: f64,
    #[serde(default)]
    pub instruments: BTreeMap<String, Instrument>,
}

impl SimulatorConfig {
    pub fn new(initial_capital: f64, position_size_pct: f64) -> Self {
        Self {
            initial_capital,
            position_size_pct,
            position_size_overrides: BTreeMap::new(),
            exits: ExitRules::default(),
            allow_short: false,
            commission: 0.0,
            slippage: 0.0,
            instruments: BTreeMap::new(),
        }
    }

    pub fn lot_size(&self, symbol: &str) -> f64 {
        self.instruments
            .get(symbol)
            .map(|i| i.lot_size)
            .unwrap_or(DEFAULT_LOT_SIZE)
    }

    fn sizer(&self) -> FixedFractionSizer {
        FixedFractionSizer {
            default_pct: self.position_size_pct,
            overrides: self.position_size_overrides.clone(),
        }
    }
}

pub struct BacktestSimulator {
    config: SimulatorConfig,
    fill_engine: FillEngine,
    sizer: Box<dyn Sizer>,
}

impl BacktestSimulator {
    /// Simulator with the fixed-fraction sizer described by `config`.
    pub fn new(config: SimulatorConfig) -> Self {
        let sizer = Box::new(config.sizer());
        Self::with_sizer(config, sizer)
    }

    pub fn with_sizer(config: SimulatorConfig, sizer: Box<dyn Sizer>) -> Self {
        let fill_engine = FillEngine::new(config.exits, config.allow_short);
        Self {
            config,
            fill_engine,
            sizer,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Replay `bars` against `signals`.
    ///
    /// Instruments missing a bar today or tomorrow are skipped for that bar.
    /// Positions still open after the last bar stay open and are valued at
    /// the final close.
    pub fn run(&self, bars: &AlignedBars, signals: &SignalTable) -> BacktestReport {
        let initial = self.config.initial_capital;
        let n = bars.len();

        let mut portfolio = Portfolio::new(initial);
        let mut fills: Vec<Fill> = Vec::new();
        let mut position_trace: Vec<i8> = Vec::with_capacity(n);
        let mut skipped_bars = 0usize;

        for t in 0..n {
            if t + 1 < n {
                for symbol in &bars.symbols {
                    let (Some(today), Some(tomorrow)) =
                        (bars.bar(symbol, t), bars.bar(symbol, t + 1))
                    else {
                        skipped_bars += 1;
                        continue;
                    };
                    let ctx = StepContext {
                        signal: signals.get(symbol, t),
                        today,
                        tomorrow,
                        lot_size: self.config.lot_size(symbol),
                    };
                    let position = portfolio
                        .positions
                        .entry(symbol.clone())
                        .or_insert_with(|| Position::flat(symbol.as_str()));
                    let outcome = self.fill_engine.step(
                        ctx,
                        position,
                        &mut portfolio.cash,
                        self.sizer.as_ref(),
                    );
                    if let Some(trade) = outcome.trade {
                        portfolio.trades.push(trade);
                    }
                    if let Some(fill) = outcome.fill {
                        fills.push(fill);
                    }
                }
            }

            let equity = portfolio.equity(&bars.closes_at(t));
            portfolio.record_equity(equity);
            position_trace.push(position_sign(&portfolio));
        }

        if skipped_bars > 0 {
            debug!(skipped_bars, "instrument-bars skipped for missing data");
        }

        let final_value = portfolio.equity_history.last().copied().unwrap_or(initial);
        let total_return = if initial > 0.0 {
            (final_value - initial) / initial
        } else {
            0.0
        };
        let equity_curve: Vec<f64> = portfolio
            .equity_history
            .iter()
            .map(|eq| if initial > 0.0 { eq / initial } else { *eq })
            .collect();
        let metrics = PerformanceMetrics::compute(&equity_curve, &portfolio.trades, total_return);

        let signal_trace = bars
            .symbols
            .iter()
            .map(|s| (s.clone(), signals.series(s)))
            .collect();

        info!(
            bars = n,
            symbols = bars.symbols.len(),
            trades = portfolio.trades.len(),
            final_value,
            total_return,
            sharpe = metrics.sharpe_ratio,
            "backtest complete"
        );

        BacktestReport {
            initial_capital: initial,
            final_value,
            total_return,
            equity_curve,
            signal_trace,
            position_trace,
            trades: portfolio.trades,
            fills,
            metrics,
            bar_count: n,
            skipped_bars,
            sizer: self.sizer.name().to_string(),
            commission: self.config.commission,
            slippage: self.config.slippage,
        }
    }
}
