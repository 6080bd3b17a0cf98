//! Chronological train/test partitioning. Never shuffles.

use crate::domain::error::{PipelineError, Stage};
use crate::domain::frame::Frame;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Frame,
    pub test: Frame,
    pub split_index: usize,
}

/// `floor(total * (1 - test_fraction))`.
pub fn split_index(total: usize, test_fraction: f64) -> usize {
    let idx = (total as f64 * (1.0 - test_fraction)).floor() as usize;
    idx.min(total)
}

/// Stable-sort `rows` ascending by `sort_key`, then cut once.
///
/// A `test_fraction` of 0 or 1 gives an empty test or train split.
pub fn split(mut rows: Frame, sort_key: &str, test_fraction: f64) -> Result<Split, PipelineError> {
    if !(0.0..=1.0).contains(&test_fraction) {
        return Err(PipelineError::InvalidParameter {
            stage: Stage::Split,
            reason: format!("test_fraction must be within [0, 1], got {test_fraction}"),
        });
    }
    let key = rows.require_column(Stage::Split, sort_key)?;

    rows.sort_by_column(key);
    let at = split_index(rows.len(), test_fraction);
    let test = rows.split_off(at);

    info!(
        "partitioned chronologically: train = {}, test = {} ({:.1}% test), columns = {}",
        rows.len(),
        test.len(),
        test_fraction * 100.0,
        rows.column_count()
    );

    Ok(Split {
        train: rows,
        test,
        split_index: at,
    })
}
