//! Export: report JSON, trade ledger and equity CSV, artifact directories.
//!
//! Persisted outcomes carry a `schema_version`; newer versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tradesim_core::domain::TradeRecord;
use tradesim_live::ExecutionReport;

use crate::runner::{RunOutcome, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unsupported schema version {found} (max supported: {max})")]
    UnsupportedSchema { found: u32, max: u32 },
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn outcome_json(outcome: &RunOutcome) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(outcome)?)
}

pub fn import_json(json: &str) -> Result<RunOutcome, ExportError> {
    let outcome: RunOutcome = serde_json::from_str(json)?;
    if outcome.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: outcome.schema_version,
            max: SCHEMA_VERSION,
        });
    }
    Ok(outcome)
}

pub fn execution_json(report: &ExecutionReport) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Trade ledger, one row per closed round trip.
pub fn trades_csv(trades: &[TradeRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "side",
        "entry_date",
        "entry_price",
        "exit_date",
        "exit_price",
        "quantity",
        "return_pct",
        "pnl",
        "exit_reason",
    ])?;
    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            format!("{:?}", t.side),
            t.entry_date.map(|d| d.to_string()).unwrap_or_default(),
            format!("{:.6}", t.entry_price),
            t.exit_date.to_string(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.quantity),
            format!("{:.6}", t.return_pct),
            format!("{:.2}", t.pnl()),
            t.exit_reason.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Normalized equity per bar.
pub fn equity_csv(equity_curve: &[f64]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{eq:.6}")])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr.into_inner().map_err(|e| ExportError::Io {
        path: PathBuf::from("<memory>"),
        source: e.into_error(),
    })?;
    Ok(String::from_utf8(data)?)
}

// ─── Artifact directories ───────────────────────────────────────────

/// Write `report.json`, `trades.csv` and `equity.csv` under
/// `output_dir/<run id prefix>/`. Returns the directory.
pub fn save_artifacts(outcome: &RunOutcome, output_dir: &Path) -> Result<PathBuf, ExportError> {
    let prefix = outcome.run_id.get(..12).unwrap_or(&outcome.run_id);
    let run_dir = output_dir.join(prefix);
    std::fs::create_dir_all(&run_dir).map_err(|source| ExportError::Io {
        path: run_dir.clone(),
        source,
    })?;

    write(&run_dir.join("report.json"), &outcome_json(outcome)?)?;
    write(&run_dir.join("trades.csv"), &trades_csv(&outcome.report.trades)?)?;
    write(
        &run_dir.join("equity.csv"),
        &equity_csv(&outcome.report.equity_curve)?,
    )?;
    Ok(run_dir)
}

pub fn load_artifacts(dir: &Path) -> Result<RunOutcome, ExportError> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    import_json(&json)
}

pub fn write(path: &Path, contents: &str) -> Result<(), ExportError> {
    std::fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
