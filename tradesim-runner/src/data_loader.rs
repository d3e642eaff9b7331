//! Input loading for the runner and the CLI.
//!
//! Bars and signals come from CSV files or, for demos and benchmarks, from a
//! deterministic random walk seeded by the symbol name. Every load produces a
//! BLAKE3 dataset hash so run ids change when the data does.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use tradesim_core::data::{align_bars, AlignedBars, SignalTable};
use tradesim_core::domain::{Bar, OrderDescriptor, OrderKind, OrderSide, Signal};
use tradesim_live::TradeSignal;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: csv::Error },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("no bars loaded")]
    Empty,
}

/// Aligned inputs for one or more backtests.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: AlignedBars,
    pub signals: SignalTable,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

// ─── CSV rows ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BarRow {
    date: NaiveDate,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<u64>,
}

/// Signal columns shared by dated and execution rows: either a scalar
/// (`value`) or an order descriptor (`kind`, `side`, `price`, `quantity`).
struct SignalFields<'a> {
    value: Option<f64>,
    kind: Option<&'a str>,
    side: Option<&'a str>,
    price: Option<f64>,
    quantity: Option<f64>,
}

impl SignalFields<'_> {
    fn to_signal(&self) -> Result<Signal, String> {
        let Some(kind) = self.kind.filter(|k| !k.is_empty()) else {
            return Ok(Signal::Scalar(self.value.unwrap_or(0.0)));
        };
        let kind: OrderKind = kind.parse().map_err(|e| format!("{e}"))?;
        let side: OrderSide = self
            .side
            .ok_or_else(|| "order row without side".to_string())?
            .parse()
            .map_err(|e| format!("{e}"))?;
        let order = OrderDescriptor {
            kind,
            side,
            price: self.price,
            quantity: self.quantity,
        };
        order.validate().map_err(|e| e.to_string())?;
        Ok(Signal::Order(order))
    }
}

#[derive(Debug, Deserialize)]
struct DatedSignalRow {
    date: NaiveDate,
    symbol: String,
    value: Option<f64>,
    kind: Option<String>,
    side: Option<String>,
    price: Option<f64>,
    quantity: Option<f64>,
}

impl DatedSignalRow {
    fn fields(&self) -> SignalFields<'_> {
        SignalFields {
            value: self.value,
            kind: self.kind.as_deref(),
            side: self.side.as_deref(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TradeSignalRow {
    symbol: String,
    value: Option<f64>,
    kind: Option<String>,
    side: Option<String>,
    price: Option<f64>,
    quantity: Option<f64>,
    #[serde(default)]
    sentiment: Option<f64>,
    #[serde(default)]
    win_rate: Option<f64>,
}

impl TradeSignalRow {
    fn fields(&self) -> SignalFields<'_> {
        SignalFields {
            value: self.value,
            kind: self.kind.as_deref(),
            side: self.side.as_deref(),
            price: self.price,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    symbol: String,
    price: f64,
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })
}

// ─── Bars ───────────────────────────────────────────────────────────

/// Bars per symbol from `date,symbol,open,high,low,close,volume` rows.
pub fn read_bars<R: Read>(input: R) -> Result<HashMap<String, Vec<Bar>>, LoadError> {
    bars_from(reader(input))
}

pub fn load_bars_csv(path: &Path) -> Result<HashMap<String, Vec<Bar>>, LoadError> {
    bars_from(open(path)?)
}

fn bars_from<R: Read>(mut rdr: csv::Reader<R>) -> Result<HashMap<String, Vec<Bar>>, LoadError> {
    let mut bars: HashMap<String, Vec<Bar>> = HashMap::new();
    for row in rdr.deserialize() {
        let row: BarRow = row?;
        let bar = Bar::new(
            row.symbol.clone(),
            row.date,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume.unwrap_or(0),
        );
        bars.entry(row.symbol).or_default().push(bar);
    }
    Ok(bars)
}

// ─── Signals ────────────────────────────────────────────────────────

/// Dated signals from `date,symbol,value,kind,side,price,quantity` rows.
///
/// Rows that cannot be turned into a signal are skipped with a warning.
pub fn read_signals<R: Read>(
    input: R,
) -> Result<HashMap<String, Vec<(NaiveDate, Signal)>>, LoadError> {
    signals_from(reader(input))
}

pub fn load_signals_csv(
    path: &Path,
) -> Result<HashMap<String, Vec<(NaiveDate, Signal)>>, LoadError> {
    signals_from(open(path)?)
}

fn signals_from<R: Read>(
    mut rdr: csv::Reader<R>,
) -> Result<HashMap<String, Vec<(NaiveDate, Signal)>>, LoadError> {
    let mut dated: HashMap<String, Vec<(NaiveDate, Signal)>> = HashMap::new();
    for (i, row) in rdr.deserialize().enumerate() {
        let row: DatedSignalRow = row?;
        let parsed = row.fields().to_signal();
        match parsed {
            Ok(signal) => dated.entry(row.symbol).or_default().push((row.date, signal)),
            Err(reason) => warn!(row = i + 2, symbol = %row.symbol, %reason, "signal skipped"),
        }
    }
    Ok(dated)
}

/// Momentum signals for data without a signal file: long above the
/// trailing mean close, exit below it.
pub fn momentum_signals(bars: &AlignedBars, lookback: usize) -> SignalTable {
    let lookback = lookback.max(1);
    let mut table = SignalTable::new(bars.len());
    for symbol in &bars.symbols {
        let closes: Vec<Option<f64>> = (0..bars.len()).map(|t| bars.close(symbol, t)).collect();
        let series = (0..bars.len())
            .map(|t| {
                if t < lookback {
                    return Signal::flat();
                }
                let window: Vec<f64> =
                    closes[t - lookback..t].iter().flatten().copied().collect();
                match closes[t] {
                    Some(close) if !window.is_empty() => {
                        let mean = window.iter().sum::<f64>() / window.len() as f64;
                        Signal::Scalar(if close > mean { 1.0 } else { -1.0 })
                    }
                    _ => Signal::flat(),
                }
            })
            .collect();
        table.insert(symbol.clone(), series);
    }
    table
}

// ─── Execution inputs ───────────────────────────────────────────────

/// Execution batch from `symbol,value,kind,side,price,quantity,sentiment,win_rate` rows.
pub fn read_trade_signals<R: Read>(input: R) -> Result<Vec<TradeSignal>, LoadError> {
    trade_signals_from(reader(input))
}

pub fn load_trade_signals(path: &Path) -> Result<Vec<TradeSignal>, LoadError> {
    trade_signals_from(open(path)?)
}

fn trade_signals_from<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<TradeSignal>, LoadError> {
    let mut batch = Vec::new();
    for (i, row) in rdr.deserialize().enumerate() {
        let row: TradeSignalRow = row?;
        let signal = row
            .fields()
            .to_signal()
            .map_err(|reason| LoadError::InvalidRow { row: i + 2, reason })?;
        batch.push(TradeSignal {
            symbol: row.symbol,
            signal,
            sentiment: row.sentiment.unwrap_or(0.0),
            win_rate: row.win_rate,
        });
    }
    Ok(batch)
}

/// Price map from `symbol,price` rows.
pub fn read_prices<R: Read>(input: R) -> Result<HashMap<String, f64>, LoadError> {
    prices_from(reader(input))
}

pub fn load_prices(path: &Path) -> Result<HashMap<String, f64>, LoadError> {
    prices_from(open(path)?)
}

fn prices_from<R: Read>(mut rdr: csv::Reader<R>) -> Result<HashMap<String, f64>, LoadError> {
    let mut prices = HashMap::new();
    for row in rdr.deserialize() {
        let row: PriceRow = row?;
        prices.insert(row.symbol, row.price);
    }
    Ok(prices)
}

// ─── Loaded datasets ────────────────────────────────────────────────

/// Align CSV bars and attach CSV signals, or momentum signals if none are given.
pub fn load_csv(bars_path: &Path, signals_path: Option<&Path>) -> Result<LoadedData, LoadError> {
    let bars = align_bars(load_bars_csv(bars_path)?);
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    let signals = match signals_path {
        Some(path) => SignalTable::from_dated(&bars.dates, load_signals_csv(path)?),
        None => momentum_signals(&bars, DEFAULT_MOMENTUM_LOOKBACK),
    };
    let dataset_hash = dataset_hash(&bars);
    info!(
        symbols = bars.symbols.len(),
        bars = bars.len(),
        %dataset_hash,
        "loaded CSV data"
    );
    Ok(LoadedData {
        bars,
        signals,
        dataset_hash,
        has_synthetic: false,
    })
}

pub const DEFAULT_MOMENTUM_LOOKBACK: usize = 20;

/// Synthetic random-walk bars with momentum signals.
pub fn load_synthetic(symbols: &[String], start: NaiveDate, end: NaiveDate) -> LoadedData {
    warn!(?symbols, "generating synthetic data; results are tagged as synthetic");
    let raw = symbols
        .iter()
        .map(|s| (s.clone(), synthetic_bars(s, start, end)))
        .collect();
    let bars = align_bars(raw);
    let signals = momentum_signals(&bars, DEFAULT_MOMENTUM_LOOKBACK);
    let dataset_hash = dataset_hash(&bars);
    LoadedData {
        bars,
        signals,
        dataset_hash,
        has_synthetic: true,
    }
}

/// Deterministic BLAKE3 hash over every aligned bar, in symbol order.
pub fn dataset_hash(bars: &AlignedBars) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut symbols: Vec<&String> = bars.symbols.iter().collect();
    symbols.sort();

    for date in &bars.dates {
        hasher.update(date.to_string().as_bytes());
    }
    for symbol in symbols {
        hasher.update(symbol.as_bytes());
        for slot in bars.series(symbol).unwrap_or(&[]) {
            match slot {
                Some(bar) => {
                    hasher.update(&[1]);
                    hasher.update(&bar.open.to_le_bytes());
                    hasher.update(&bar.high.to_le_bytes());
                    hasher.update(&bar.low.to_le_bytes());
                    hasher.update(&bar.close.to_le_bytes());
                    hasher.update(&bar.volume.to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Weekday random walk from 100.0, seeded from the symbol name.
pub fn synthetic_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(Bar::new(symbol, current, open, high, low, close, volume));
        price = close;
        current += chrono::Duration::days(1);
    }
    bars
}
