//! Raw kline dumps in exchange CSV format.
//!
//! Columns are positional: `open_time, open, high, low, close, volume, ...`.
//! Files may or may not carry a header row. `open_time` is epoch
//! milliseconds, or microseconds in newer dumps.

use crate::domain::candle::RawKline;
use crate::domain::error::{PipelineError, Stage};
use crate::ports::candle_port::KlinePort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MICROS_CUTOFF: i64 = 100_000_000_000_000;

const FIELDS: [&str; 5] = ["open_time", "open", "high", "low", "close"];

/// Reads one kline CSV, or every `*.csv` in a directory in file name order.
pub struct KlineCsvAdapter {
    path: PathBuf,
}

impl KlineCsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn source_files(&self) -> Result<Vec<PathBuf>, PipelineError> {
        if !self.path.is_dir() {
            return Ok(vec![self.path.clone()]);
        }
        let mut files = Vec::new();
        let io = |e| PipelineError::io(Stage::Prepare, &self.path, e);
        for entry in fs::read_dir(&self.path).map_err(io)? {
            let path = entry.map_err(io)?.path();
            if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn parse_open_time(raw: i64) -> Option<DateTime<Utc>> {
    if raw.abs() >= MICROS_CUTOFF {
        DateTime::from_timestamp_micros(raw)
    } else {
        DateTime::from_timestamp_millis(raw)
    }
}

fn invalid(row: usize, column: &str, value: &str) -> PipelineError {
    PipelineError::InvalidValue {
        stage: Stage::Prepare,
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn parse_record(record: &csv::StringRecord, row: usize) -> Result<RawKline, PipelineError> {
    if record.len() < FIELDS.len() {
        return Err(PipelineError::InputShape {
            stage: Stage::Prepare,
            column: FIELDS[record.len()].to_string(),
        });
    }
    let field = |idx: usize| record.get(idx).unwrap_or("").trim();
    let price = |idx: usize| -> Result<f64, PipelineError> {
        match field(idx).parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(invalid(row, FIELDS[idx], field(idx))),
        }
    };

    let open_time = field(0)
        .parse::<i64>()
        .ok()
        .and_then(parse_open_time)
        .ok_or_else(|| invalid(row, FIELDS[0], field(0)))?;

    Ok(RawKline {
        open_time,
        open: price(1)?,
        high: price(2)?,
        low: price(3)?,
        close: price(4)?,
    })
}

fn read_file(path: &Path) -> Result<Vec<RawKline>, PipelineError> {
    let content = fs::read(path).map_err(|e| PipelineError::Csv {
        stage: Stage::Prepare,
        path: path.display().to_string(),
        reason: format!("failed to read: {e}"),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_slice());

    let mut klines = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| PipelineError::Csv {
            stage: Stage::Prepare,
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let first = record.get(0).unwrap_or("").trim();
        if row == 0 && first.parse::<i64>().is_err() {
            debug!("skipping header row in {}", path.display());
            continue;
        }
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        klines.push(parse_record(&record, row)?);
    }
    Ok(klines)
}

impl KlinePort for KlineCsvAdapter {
    fn fetch_klines(&self) -> Result<Vec<RawKline>, PipelineError> {
        let files = self.source_files()?;
        if files.is_empty() {
            return Err(PipelineError::InsufficientData {
                stage: Stage::Prepare,
                reason: format!("no kline CSV files in {}", self.path.display()),
            });
        }

        let mut klines = Vec::new();
        for file in &files {
            let batch = read_file(file)?;
            debug!("{}: {} klines", file.display(), batch.len());
            klines.extend(batch);
        }
        info!("read {} klines from {} file(s)", klines.len(), files.len());
        Ok(klines)
    }
}
