//! Sliding-window grouping of candles into labeled training rows.
//!
//! A window starting at source index `i` covers candles `[i, i + W)` and is
//! labeled from the open of the candle at `i + W + F - 1`. Windows are built
//! for every `i` in `[0, N - W - F)`, so no window is ever partial.

use crate::domain::candle::Candle;
use crate::domain::error::{PipelineError, Stage};
use crate::domain::frame::{Cell, Frame};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info};

pub const LABEL_COLUMN: &str = "is_alcista";
pub const DATE_COLUMN: &str = "date";

const PROGRESS_EVERY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrouperConfig {
    pub window_size: usize,
    pub future_offset: usize,
    pub bullish_threshold: f64,
}

impl Default for GrouperConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            future_offset: 5,
            bullish_threshold: 0.0001,
        }
    }
}

impl GrouperConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.window_size < 1 {
            return Err(PipelineError::InvalidParameter {
                stage: Stage::Group,
                reason: "window_size must be at least 1".into(),
            });
        }
        if self.future_offset < 1 {
            return Err(PipelineError::InvalidParameter {
                stage: Stage::Group,
                reason: "future_offset must be at least 1".into(),
            });
        }
        if !self.bullish_threshold.is_finite() {
            return Err(PipelineError::InvalidParameter {
                stage: Stage::Group,
                reason: "bullish_threshold must be finite".into(),
            });
        }
        Ok(())
    }

    /// Number of windows `candle_count` candles yield.
    pub fn window_count(&self, candle_count: usize) -> usize {
        candle_count.saturating_sub(self.window_size + self.future_offset)
    }
}

/// Price fields of one in-window candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFeatures {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub return_pct: f64,
}

impl From<&Candle> for PositionFeatures {
    fn from(c: &Candle) -> Self {
        Self {
            open: c.open,
            close: c.close,
            high: c.high,
            low: c.low,
            return_pct: c.return_pct,
        }
    }
}

/// One training row: window features, first-candle date fields and the forward label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub start_index: usize,
    pub positions: Vec<PositionFeatures>,
    pub date: NaiveDate,
    pub initial_time: NaiveTime,
    pub final_time: NaiveTime,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub day_of_week: &'static str,
    pub return_forward: f64,
    pub is_bullish: bool,
}

impl LabeledRow {
    /// `"<fecha> <hora_inicial>"`, the chronological sort key.
    pub fn timestamp(&self) -> String {
        format!(
            "{} {}",
            self.date.format("%Y-%m-%d"),
            self.initial_time.format("%H:%M:%S")
        )
    }
}

/// `(future_open - last_close) / last_close`; a zero close is an error, never coerced.
pub fn forward_return(last_close: f64, future_open: f64, index: usize) -> Result<f64, PipelineError> {
    if last_close == 0.0 {
        return Err(PipelineError::Computation {
            stage: Stage::Group,
            index,
            reason: "last in-window close is zero".into(),
        });
    }
    Ok((future_open - last_close) / last_close)
}

/// Group an ordered candle sequence into labeled rows, in source order.
///
/// Fewer than `W + F + 1` candles yield an empty sequence rather than an error.
pub fn group(candles: &[Candle], config: &GrouperConfig) -> Result<Vec<LabeledRow>, PipelineError> {
    config.validate()?;

    let w = config.window_size;
    let f = config.future_offset;
    let total = config.window_count(candles.len());
    info!(
        "grouping {} candles: window_size={}, future_offset={}, windows={}",
        candles.len(),
        w,
        f,
        total
    );

    let mut rows = Vec::with_capacity(total);
    for i in 0..total {
        let window = &candles[i..i + w];
        let first = &window[0];
        let last_close = window[w - 1].close;
        let future_open = candles[i + w + f - 1].open;
        let return_forward = forward_return(last_close, future_open, i)?;

        rows.push(LabeledRow {
            start_index: i,
            positions: window.iter().map(PositionFeatures::from).collect(),
            date: first.date,
            initial_time: first.initial_time,
            final_time: first.final_time,
            day: first.day(),
            month: first.month(),
            year: first.year(),
            day_of_week: first.weekday_name(),
            return_forward,
            is_bullish: return_forward > config.bullish_threshold,
        });

        if (i + 1) % PROGRESS_EVERY == 0 {
            debug!("processed {}/{} windows", i + 1, total);
        }
    }

    let bullish = rows.iter().filter(|r| r.is_bullish).count();
    info!(
        "grouped {} rows: class 1 = {}, class 0 = {}",
        rows.len(),
        bullish,
        rows.len() - bullish
    );
    Ok(rows)
}

/// Column names of the grouped table for a given window size.
pub fn grouped_columns(window_size: usize) -> Vec<String> {
    let mut columns = Vec::with_capacity(window_size * 5 + 9);
    for p in 1..=window_size {
        columns.push(format!("entrada_vela_{p}"));
        columns.push(format!("salida_vela_{p}"));
        columns.push(format!("Max_vela_{p}"));
        columns.push(format!("Min_vela_{p}"));
        columns.push(format!("porcentaje_retorno_vela_{p}"));
    }
    for name in [
        "fecha",
        "hora_inicial",
        "hora_final",
        "dia",
        "mes",
        "anio",
        "dia_semana",
        LABEL_COLUMN,
        DATE_COLUMN,
    ] {
        columns.push(name.to_string());
    }
    columns
}

/// Lay labeled rows out as the grouped table.
pub fn to_frame(rows: &[LabeledRow], window_size: usize) -> Frame {
    let mut frame = Frame::new(grouped_columns(window_size));
    for row in rows {
        let mut cells = Vec::with_capacity(frame.column_count());
        for p in &row.positions {
            cells.push(Cell::Number(p.open));
            cells.push(Cell::Number(p.close));
            cells.push(Cell::Number(p.high));
            cells.push(Cell::Number(p.low));
            cells.push(Cell::Number(p.return_pct));
        }
        cells.push(Cell::Text(row.date.format("%Y-%m-%d").to_string()));
        cells.push(Cell::Text(row.initial_time.format("%H:%M:%S").to_string()));
        cells.push(Cell::Text(row.final_time.format("%H:%M:%S").to_string()));
        cells.push(Cell::Number(f64::from(row.day)));
        cells.push(Cell::Number(f64::from(row.month)));
        cells.push(Cell::Number(f64::from(row.year)));
        cells.push(Cell::Text(row.day_of_week.to_string()));
        cells.push(Cell::Number(if row.is_bullish { 1.0 } else { 0.0 }));
        cells.push(Cell::Text(row.timestamp()));
        frame.push_row(cells);
    }
    frame
}
