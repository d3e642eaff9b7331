//! Criterion benchmarks for the simulator hot loop.
//!
//! Benchmarks:
//! 1. Full backtest over one and many symbols
//! 2. Single fill-engine step with protective exits enabled
//! 3. Tail-risk factor over a long equity history

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::HashMap;

use tradesim_core::data::{align_bars, AlignedBars, SignalTable};
use tradesim_core::domain::{Bar, Position, Signal};
use tradesim_core::engine::{BacktestSimulator, SimulatorConfig};
use tradesim_core::fill::{ExitRules, FillEngine, StepContext};
use tradesim_core::risk::cvar_factor;
use tradesim_core::sizers::FixedFractionSizer;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(symbol: &str, n: usize, offset: f64) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + offset + (i as f64 * 0.1).sin() * 10.0;
            Bar::new(
                symbol,
                base_date + chrono::Duration::days(i as i64),
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000_000,
            )
        })
        .collect()
}

fn make_inputs(n: usize, num_symbols: usize) -> (AlignedBars, SignalTable) {
    let mut input = HashMap::new();
    for s in 0..num_symbols {
        let symbol = format!("SYM{s}");
        input.insert(symbol.clone(), make_bars(&symbol, n, s as f64 * 10.0));
    }
    let bars = align_bars(input);
    let mut table = SignalTable::new(bars.len());
    for symbol in &bars.symbols {
        let series = (0..n)
            .map(|i| Signal::Scalar((i as f64 * 0.07).sin()))
            .collect();
        table.insert(symbol.clone(), series);
    }
    (bars, table)
}

fn config() -> SimulatorConfig {
    let mut config = SimulatorConfig::new(1_000_000.0, 0.1);
    config.allow_short = true;
    config.exits = ExitRules {
        stop_loss_pct: Some(0.05),
        take_profit_pct: Some(0.15),
        trailing_stop_pct: Some(0.08),
    };
    config
}

// ── 1. Full backtest ─────────────────────────────────────────────────

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");

    for &bar_count in &[252, 1260, 2520] {
        let (bars, table) = make_inputs(bar_count, 1);
        let sim = BacktestSimulator::new(config());
        group.bench_with_input(BenchmarkId::new("single_symbol", bar_count), &bar_count, |b, _| {
            b.iter(|| black_box(sim.run(&bars, &table)))
        });
    }

    for &symbols in &[5, 20] {
        let (bars, table) = make_inputs(1260, symbols);
        let sim = BacktestSimulator::new(config());
        group.bench_with_input(BenchmarkId::new("multi_symbol", symbols), &symbols, |b, _| {
            b.iter(|| black_box(sim.run(&bars, &table)))
        });
    }

    group.finish();
}

// ── 2. Fill engine step ──────────────────────────────────────────────

fn bench_step(c: &mut Criterion) {
    let bars = make_bars("BENCH", 2, 0.0);
    let engine = FillEngine::new(config().exits, true);
    let sizer = FixedFractionSizer::new(0.1);

    c.bench_function("fill_engine_step", |b| {
        b.iter(|| {
            let mut pos = Position::flat("BENCH");
            let mut cash = 1_000_000.0;
            let ctx = StepContext {
                signal: Signal::Scalar(1.0),
                today: &bars[0],
                tomorrow: &bars[1],
                lot_size: 1.0,
            };
            black_box(engine.step(ctx, &mut pos, &mut cash, &sizer))
        })
    });
}

// ── 3. Tail risk ─────────────────────────────────────────────────────

fn bench_cvar(c: &mut Criterion) {
    let equity: Vec<f64> = (0..5_000)
        .map(|i| 1_000_000.0 + (i as f64 * 0.3).sin() * 20_000.0)
        .collect();
    c.bench_function("cvar_factor_5000", |b| b.iter(|| black_box(cvar_factor(&equity))));
}

criterion_group!(benches, bench_backtest, bench_step, bench_cvar);
criterion_main!(benches);
