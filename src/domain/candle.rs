//! Candle representation and per-candle feature derivation.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};

/// Spanish weekday labels, Monday first.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

/// One fixed-interval OHLC observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub date: NaiveDate,
    pub initial_time: NaiveTime,
    pub final_time: NaiveTime,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    /// Percentage return of this candle, as produced by the feature stage.
    pub return_pct: f64,
}

impl Candle {
    pub fn day(&self) -> u32 {
        self.date.day()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn weekday_name(&self) -> &'static str {
        weekday_name(self.date.weekday())
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAY_NAMES[day.num_days_from_monday() as usize]
}

/// `(close - open) / open * 100`, rounded to 4 decimals. A zero open is a 0% return.
pub fn return_percentage(open: f64, close: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    round4((close - open) / open * 100.0)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// A raw exchange kline before feature derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawKline {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// A candle plus the row-level summary columns written to the candle table.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleRecord {
    pub candle: Candle,
    pub total_return: f64,
    pub bullish_count: u32,
    pub is_bullish: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureConfig {
    /// `is_alcista` threshold on the summed percentage return.
    pub percentage_return_threshold: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            percentage_return_threshold: 0.05,
        }
    }
}

/// Derive per-candle features from raw klines, sorted by open time.
///
/// Each kline becomes one single-position candle row: its return percentage,
/// the total return and bullish count over its positions, the date parts and
/// a bullish flag against `config.percentage_return_threshold`.
pub fn derive_candles(mut klines: Vec<RawKline>, config: &FeatureConfig) -> Vec<CandleRecord> {
    klines.sort_by_key(|k| k.open_time);

    klines
        .into_iter()
        .map(|k| {
            let naive = k.open_time.naive_utc();
            let return_pct = return_percentage(k.open, k.close);
            let candle = Candle {
                date: naive.date(),
                initial_time: naive.time(),
                final_time: naive.time(),
                open: k.open,
                close: k.close,
                high: k.high,
                low: k.low,
                return_pct,
            };
            let bullish_count = u32::from(candle.is_bullish());
            CandleRecord {
                candle,
                total_return: return_pct,
                bullish_count,
                is_bullish: return_pct > config.percentage_return_threshold,
            }
        })
        .collect()
}
