//! Candle table access port.

use crate::domain::candle::{Candle, CandleRecord, RawKline};
use crate::domain::error::PipelineError;

/// Ordered candle source consumed by the grouper, and the sink the feature stage writes to.
pub trait CandlePort {
    /// Candles in strict time order.
    fn fetch_candles(&self) -> Result<Vec<Candle>, PipelineError>;

    fn store_candles(&self, records: &[CandleRecord]) -> Result<(), PipelineError>;
}

/// Raw exchange klines, before feature derivation.
pub trait KlinePort {
    fn fetch_klines(&self) -> Result<Vec<RawKline>, PipelineError>;
}
