//! tradesim CLI: run backtests and paper-trade a batch of signals.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradesim_core::domain::Portfolio;
use tradesim_core::risk::MarketConditions;
use tradesim_live::{
    ExecutionEngine, MarketSnapshot, PaperBroker, ScenarioHandle, StaticFundamentals, StaticHealth,
};
use tradesim_runner::data_loader::{load_prices, load_trade_signals};
use tradesim_runner::export::{execution_json, write};
use tradesim_runner::{
    load_csv, load_synthetic, run_all, save_artifacts, BacktestConfig, LoadedData, RunOutcome,
};

#[derive(Parser)]
#[command(name = "tradesim", about = "Backtest simulator and risk-gated execution")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more backtests over the same data
    Backtest {
        /// TOML config file; repeat for a batch
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Bars CSV (date,symbol,open,high,low,close,volume)
        #[arg(long, conflicts_with = "synthetic")]
        bars: Option<PathBuf>,

        /// Signals CSV; momentum signals are derived when omitted
        #[arg(long, requires = "bars")]
        signals: Option<PathBuf>,

        /// Use deterministic synthetic bars instead of a CSV
        #[arg(long)]
        synthetic: bool,

        /// Symbols for synthetic data
        #[arg(long, value_delimiter = ',', default_value = "SPY")]
        symbols: Vec<String>,

        /// Start date for synthetic data (YYYY-MM-DD)
        #[arg(long, default_value = "2020-01-02")]
        start: String,

        /// End date for synthetic data (YYYY-MM-DD)
        #[arg(long, default_value = "2024-12-31")]
        end: String,

        /// Output directory for artifacts
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Run configs in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Paper-trade one batch of signals through the risk gate
    Execute {
        /// TOML config file (risk and instrument sections)
        #[arg(long)]
        config: PathBuf,

        /// Trade signals CSV (symbol,value,kind,side,price,quantity,sentiment,win_rate)
        #[arg(long)]
        signals: PathBuf,

        /// Prices CSV (symbol,price)
        #[arg(long)]
        prices: PathBuf,

        /// Decision date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Reference index daily change as a fraction
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        index_change: f64,

        /// Volatility index level
        #[arg(long, default_value_t = 0.0)]
        volatility_index: f64,

        /// Starting cash; defaults to the config's initial capital
        #[arg(long)]
        capital: Option<f64>,

        /// Write the execution report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            configs,
            bars,
            signals,
            synthetic,
            symbols,
            start,
            end,
            output_dir,
            parallel,
        } => {
            let data = if synthetic {
                load_synthetic(&symbols, parse_date(&start)?, parse_date(&end)?)
            } else {
                let Some(bars) = bars else {
                    bail!("one of --bars or --synthetic is required");
                };
                load_data(&bars, signals.as_deref())?
            };
            run_backtest_cmd(&configs, &data, &output_dir, parallel)
        }
        Commands::Execute {
            config,
            signals,
            prices,
            date,
            index_change,
            volatility_index,
            capital,
            output,
        } => {
            let conditions = MarketConditions {
                index_change,
                volatility_index,
            };
            run_execute_cmd(
                &config,
                &signals,
                &prices,
                date.as_deref(),
                conditions,
                capital,
                output.as_deref(),
            )
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn load_data(bars: &Path, signals: Option<&Path>) -> Result<LoadedData> {
    load_csv(bars, signals).with_context(|| format!("loading {}", bars.display()))
}

fn run_backtest_cmd(
    config_paths: &[PathBuf],
    data: &LoadedData,
    output_dir: &Path,
    parallel: bool,
) -> Result<()> {
    let configs = config_paths
        .iter()
        .map(|path| {
            BacktestConfig::from_file(path).with_context(|| format!("config {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let outcomes = run_all(&configs, data, parallel)?;
    for (path, outcome) in config_paths.iter().zip(&outcomes) {
        print_summary(path, outcome);
        let run_dir = save_artifacts(outcome, output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn print_summary(path: &Path, outcome: &RunOutcome) {
    let report = &outcome.report;
    println!();
    println!("=== {} ===", path.display());
    println!("Run ID:     {}", &outcome.run_id[..12]);
    println!("Period:     {} .. {}", outcome.start_date, outcome.end_date);
    if outcome.has_synthetic {
        println!("Data:       synthetic");
    }
    println!("Sizer:      {}", report.sizer);
    println!("Summary:    {}", report.summary());
}

fn run_execute_cmd(
    config_path: &Path,
    signals_path: &Path,
    prices_path: &Path,
    date: Option<&str>,
    conditions: MarketConditions,
    capital: Option<f64>,
    output: Option<&Path>,
) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)
        .with_context(|| format!("config {}", config_path.display()))?;
    config.validate()?;
    let scenario = config.scenario()?;

    let signals = load_trade_signals(signals_path)
        .with_context(|| format!("signals {}", signals_path.display()))?;
    let prices =
        load_prices(prices_path).with_context(|| format!("prices {}", prices_path.display()))?;
    let date = match date {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };

    let capital = capital.unwrap_or(config.backtest.initial_capital);
    if !(capital.is_finite() && capital > 0.0) {
        bail!("--capital must be positive, got {capital}");
    }

    let sectors: HashMap<String, String> = config
        .instruments
        .iter()
        .filter_map(|(symbol, inst)| inst.sector.clone().map(|s| (symbol.clone(), s)))
        .collect();

    let engine = ExecutionEngine::new(
        Portfolio::new(capital),
        ScenarioHandle::new(scenario),
        config.execution_config(),
        Arc::new(PaperBroker::new()),
        Arc::new(StaticHealth::default()),
        Arc::new(StaticFundamentals::new(sectors)),
    );
    let market = MarketSnapshot::new(date, prices).with_conditions(conditions);

    info!(signals = signals.len(), scenario = %scenario.name, "executing batch");
    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let report = runtime.block_on(engine.execute_orders(&signals, &market));

    let json = execution_json(&report)?;
    match output {
        Some(path) => {
            write(path, &json)?;
            println!("Execution report saved to: {}", path.display());
        }
        None => println!("{json}"),
    }

    if let Some(reason) = report.halted {
        bail!("batch halted: {reason}");
    }
    Ok(())
}
