//! CSV file adapters for the candle table and the dataset artifacts.

use crate::domain::candle::{Candle, CandleRecord};
use crate::domain::error::{PipelineError, Stage};
use crate::domain::frame::{Cell, Frame};
use crate::domain::pipeline::CleanedDataset;
use crate::ports::candle_port::CandlePort;
use crate::ports::dataset_port::DatasetPort;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column layout of the candle table.
pub const CANDLE_COLUMNS: [&str; 15] = [
    "fecha",
    "hora_inicial",
    "hora_final",
    "entrada_vela_1",
    "salida_vela_1",
    "Max_vela_1",
    "Min_vela_1",
    "porcentaje_retorno_vela_1",
    "porcentaje_retorno_total",
    "velas_alcistas",
    "dia",
    "mes",
    "anio",
    "dia_semana",
    "is_alcista",
];

fn csv_error(stage: Stage, path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::Csv {
        stage,
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn read_csv(stage: Stage, path: &Path) -> Result<csv::Reader<std::io::Cursor<Vec<u8>>>, PipelineError> {
    let content = fs::read(path).map_err(|e| csv_error(stage, path, format!("failed to read: {e}")))?;
    Ok(csv::Reader::from_reader(std::io::Cursor::new(content)))
}

fn create_writer(stage: Stage, path: &Path) -> Result<csv::Writer<fs::File>, PipelineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(stage, parent, e))?;
    }
    csv::Writer::from_path(path).map_err(|e| csv_error(stage, path, e))
}

/// Write a frame with its header row. An empty frame still gets the header.
pub fn write_frame(stage: Stage, path: &Path, frame: &Frame) -> Result<(), PipelineError> {
    let mut wtr = create_writer(stage, path)?;
    wtr.write_record(frame.columns())
        .map_err(|e| csv_error(stage, path, e))?;
    for row in frame.rows() {
        wtr.write_record(row.iter().map(|c| c.to_string()))
            .map_err(|e| csv_error(stage, path, e))?;
    }
    wtr.flush().map_err(|e| PipelineError::io(stage, path, e))?;
    Ok(())
}

/// Read a headed CSV into a frame, parsing every field with [`Cell::parse`].
pub fn read_frame(stage: Stage, path: &Path) -> Result<Frame, PipelineError> {
    let mut rdr = read_csv(stage, path)?;
    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error(stage, path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut frame = Frame::new(columns);
    for result in rdr.records() {
        let record = result.map_err(|e| csv_error(stage, path, e))?;
        frame.push_row(record.iter().map(Cell::parse).collect());
    }
    Ok(frame)
}

/// Candle table stored as a single CSV file.
pub struct CsvCandleAdapter {
    path: PathBuf,
}

impl CsvCandleAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn column(headers: &csv::StringRecord, name: &str) -> Result<usize, PipelineError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| PipelineError::InputShape {
            stage: Stage::Load,
            column: name.to_string(),
        })
}

fn invalid_value(row: usize, column: &str, value: &str) -> PipelineError {
    PipelineError::InvalidValue {
        stage: Stage::Load,
        row,
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

struct CandleColumns {
    date: usize,
    initial_time: usize,
    final_time: usize,
    open: usize,
    close: usize,
    high: usize,
    low: usize,
    return_pct: usize,
}

impl CandleColumns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, PipelineError> {
        Ok(Self {
            date: column(headers, "fecha")?,
            initial_time: column(headers, "hora_inicial")?,
            final_time: column(headers, "hora_final")?,
            open: column(headers, "entrada_vela_1")?,
            close: column(headers, "salida_vela_1")?,
            high: column(headers, "Max_vela_1")?,
            low: column(headers, "Min_vela_1")?,
            return_pct: column(headers, "porcentaje_retorno_vela_1")?,
        })
    }

    fn parse(&self, record: &csv::StringRecord, row: usize) -> Result<Candle, PipelineError> {
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let number = |idx: usize, name: &str| -> Result<f64, PipelineError> {
            let raw = field(idx);
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                _ => Err(invalid_value(row, name, raw)),
            }
        };

        let time = |idx: usize, name: &str| -> Result<NaiveTime, PipelineError> {
            let raw = field(idx);
            NaiveTime::parse_from_str(raw, "%H:%M:%S").map_err(|_| invalid_value(row, name, raw))
        };

        let date = parse_date(field(self.date)).ok_or_else(|| invalid_value(row, "fecha", field(self.date)))?;

        Ok(Candle {
            date,
            initial_time: time(self.initial_time, "hora_inicial")?,
            final_time: time(self.final_time, "hora_final")?,
            open: number(self.open, "entrada_vela_1")?,
            close: number(self.close, "salida_vela_1")?,
            high: number(self.high, "Max_vela_1")?,
            low: number(self.low, "Min_vela_1")?,
            return_pct: number(self.return_pct, "porcentaje_retorno_vela_1")?,
        })
    }
}

impl CandlePort for CsvCandleAdapter {
    fn fetch_candles(&self) -> Result<Vec<Candle>, PipelineError> {
        let mut rdr = read_csv(Stage::Load, &self.path)?;
        let headers = rdr
            .headers()
            .map_err(|e| csv_error(Stage::Load, &self.path, e))?
            .clone();
        let columns = CandleColumns::locate(&headers)?;

        let mut candles = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_error(Stage::Load, &self.path, e))?;
            candles.push(columns.parse(&record, row)?);
        }

        candles.sort_by_key(|c| (c.date, c.initial_time));
        info!("loaded {} candles from {}", candles.len(), self.path.display());
        Ok(candles)
    }

    fn store_candles(&self, records: &[CandleRecord]) -> Result<(), PipelineError> {
        let mut wtr = create_writer(Stage::Prepare, &self.path)?;
        wtr.write_record(CANDLE_COLUMNS)
            .map_err(|e| csv_error(Stage::Prepare, &self.path, e))?;

        for r in records {
            let c = &r.candle;
            wtr.write_record([
                c.date.format("%Y-%m-%d").to_string(),
                c.initial_time.format("%H:%M:%S").to_string(),
                c.final_time.format("%H:%M:%S").to_string(),
                c.open.to_string(),
                c.close.to_string(),
                c.high.to_string(),
                c.low.to_string(),
                c.return_pct.to_string(),
                r.total_return.to_string(),
                r.bullish_count.to_string(),
                c.day().to_string(),
                c.month().to_string(),
                c.year().to_string(),
                c.weekday_name().to_string(),
                u8::from(r.is_bullish).to_string(),
            ])
            .map_err(|e| csv_error(Stage::Prepare, &self.path, e))?;
        }
        wtr.flush()
            .map_err(|e| PipelineError::io(Stage::Prepare, &self.path, e))?;
        info!("wrote {} candles to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Grouped table plus the `x_train`/`y_train`/`x_test`/`y_test` files.
pub struct CsvDatasetAdapter {
    grouped_path: PathBuf,
    output_dir: PathBuf,
}

impl CsvDatasetAdapter {
    pub fn new(grouped_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            grouped_path,
            output_dir,
        }
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{name}.csv"))
    }
}

impl DatasetPort for CsvDatasetAdapter {
    fn write_grouped(&self, grouped: &Frame) -> Result<(), PipelineError> {
        write_frame(Stage::Group, &self.grouped_path, grouped)?;
        info!(
            "wrote {} grouped rows to {}",
            grouped.len(),
            self.grouped_path.display()
        );
        Ok(())
    }

    fn read_grouped(&self) -> Result<Frame, PipelineError> {
        let frame = read_frame(Stage::Load, &self.grouped_path)?;
        info!(
            "loaded {} grouped rows from {}",
            frame.len(),
            self.grouped_path.display()
        );
        Ok(frame)
    }

    fn write_dataset(&self, dataset: &CleanedDataset) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| PipelineError::io(Stage::Persist, &self.output_dir, e))?;
        for (name, frame) in [
            ("x_train", &dataset.train.features),
            ("y_train", &dataset.train.labels),
            ("x_test", &dataset.test.features),
            ("y_test", &dataset.test.labels),
        ] {
            let path = self.artifact_path(name);
            write_frame(Stage::Persist, &path, frame)?;
            info!("saved {} ({} rows)", path.display(), frame.len());
        }
        Ok(())
    }
}
