#![allow(dead_code)]

use bitbot_etl::domain::candle::{Candle, CandleRecord, RawKline};
use bitbot_etl::domain::error::{PipelineError, Stage};
use bitbot_etl::domain::frame::Frame;
use bitbot_etl::domain::pipeline::CleanedDataset;
use bitbot_etl::ports::candle_port::{CandlePort, KlinePort};
use bitbot_etl::ports::dataset_port::DatasetPort;
use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::cell::RefCell;

pub struct MockCandlePort {
    pub candles: Vec<Candle>,
    pub error: Option<String>,
    pub stored: RefCell<Vec<CandleRecord>>,
}

impl MockCandlePort {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles,
            error: None,
            stored: RefCell::new(Vec::new()),
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl CandlePort for MockCandlePort {
    fn fetch_candles(&self) -> Result<Vec<Candle>, PipelineError> {
        if let Some(reason) = &self.error {
            return Err(PipelineError::Csv {
                stage: Stage::Load,
                path: "mock".into(),
                reason: reason.clone(),
            });
        }
        Ok(self.candles.clone())
    }

    fn store_candles(&self, records: &[CandleRecord]) -> Result<(), PipelineError> {
        self.stored.borrow_mut().extend_from_slice(records);
        Ok(())
    }
}

pub struct MockKlinePort {
    pub klines: Vec<RawKline>,
}

impl KlinePort for MockKlinePort {
    fn fetch_klines(&self) -> Result<Vec<RawKline>, PipelineError> {
        Ok(self.klines.clone())
    }
}

/// In-memory dataset store: `read_grouped` returns whatever was last written.
#[derive(Default)]
pub struct MockDatasetPort {
    pub grouped: RefCell<Option<Frame>>,
    pub dataset: RefCell<Option<CleanedDataset>>,
}

impl MockDatasetPort {
    pub fn with_grouped(frame: Frame) -> Self {
        Self {
            grouped: RefCell::new(Some(frame)),
            dataset: RefCell::new(None),
        }
    }
}

impl DatasetPort for MockDatasetPort {
    fn write_grouped(&self, grouped: &Frame) -> Result<(), PipelineError> {
        *self.grouped.borrow_mut() = Some(grouped.clone());
        Ok(())
    }

    fn read_grouped(&self) -> Result<Frame, PipelineError> {
        self.grouped
            .borrow()
            .clone()
            .ok_or_else(|| PipelineError::InsufficientData {
                stage: Stage::Load,
                reason: "nothing grouped yet".into(),
            })
    }

    fn write_dataset(&self, dataset: &CleanedDataset) -> Result<(), PipelineError> {
        *self.dataset.borrow_mut() = Some(dataset.clone());
        Ok(())
    }
}

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// One-minute candles from 2024-01-01 00:00 with the given (open, close) prices.
pub fn candles_from_prices(prices: &[(f64, f64)]) -> Vec<Candle> {
    prices
        .iter()
        .enumerate()
        .map(|(i, &(open, close))| {
            let t = start() + Duration::minutes(i as i64);
            Candle {
                date: t.date(),
                initial_time: t.time(),
                final_time: t.time(),
                open,
                close,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                return_pct: bitbot_etl::domain::candle::return_percentage(open, close),
            }
        })
        .collect()
}

/// Sawtooth prices with period 7, so the forward label takes both values.
pub fn sawtooth_candles(n: usize) -> Vec<Candle> {
    let prices: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let p = 100.0 + (i % 7) as f64;
            (p, p + 0.5)
        })
        .collect();
    candles_from_prices(&prices)
}

/// Sawtooth candles `hours` apart, so day, month and weekday vary across rows.
pub fn spaced_candles(n: usize, hours: i64) -> Vec<Candle> {
    let mut candles = sawtooth_candles(n);
    for (i, c) in candles.iter_mut().enumerate() {
        let t = start() + Duration::hours(hours * i as i64);
        c.date = t.date();
        c.initial_time = t.time();
        c.final_time = t.time();
    }
    candles
}

pub fn flat_candles(n: usize) -> Vec<Candle> {
    candles_from_prices(&vec![(100.0, 100.0); n])
}

pub fn kline(minute: i64, open: f64, close: f64) -> RawKline {
    RawKline {
        open_time: Utc.timestamp_opt(1_704_067_200 + minute * 60, 0).unwrap(),
        open,
        high: open.max(close),
        low: open.min(close),
        close,
    }
}
