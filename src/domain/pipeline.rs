//! Pipeline orchestration: group → split → encode → filter → balance → persist.
//!
//! Stages run strictly in order and each takes ownership of its input. The
//! first failing stage aborts the run; its error already names the stage.

use crate::domain::balancer::{self, BalanceParams, BalanceReport, Balancer};
use crate::domain::candle::{self, Candle, FeatureConfig};
use crate::domain::encoder::{self, OrdinalMapping, DAY_OF_WEEK_COLUMN};
use crate::domain::error::{PipelineError, Stage};
use crate::domain::frame::Frame;
use crate::domain::grouper::{self, GrouperConfig, DATE_COLUMN, LABEL_COLUMN};
use crate::domain::splitter;
use crate::domain::temporal_filter;
use crate::ports::candle_port::{CandlePort, KlinePort};
use crate::ports::dataset_port::DatasetPort;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleaningConfig {
    pub test_fraction: f64,
    pub keep_temporal_columns: bool,
    pub balance: BalanceParams,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            keep_temporal_columns: false,
            balance: BalanceParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PipelineConfig {
    pub features: FeatureConfig,
    pub grouper: GrouperConfig,
    pub cleaning: CleaningConfig,
}

/// Feature columns and the matching single-column label table.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSplit {
    pub features: Frame,
    pub labels: Frame,
}

impl LabeledSplit {
    fn from_frame(frame: Frame) -> Result<Self, PipelineError> {
        let (features, labels) = frame.take_column(Stage::Persist, LABEL_COLUMN)?;
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedDataset {
    pub train: LabeledSplit,
    pub test: LabeledSplit,
    pub balance: BalanceReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub candles: usize,
    pub grouped_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub balance: BalanceReport,
}

fn banner(step: &str) {
    info!("{}", "=".repeat(60));
    info!("{}", step);
    info!("{}", "=".repeat(60));
}

/// Derive candle features from raw klines and store the candle table.
pub fn prepare_candles(
    klines: &dyn KlinePort,
    candles: &dyn CandlePort,
    config: &FeatureConfig,
) -> Result<usize, PipelineError> {
    banner("preparing candle table");
    let raw = klines.fetch_klines()?;
    info!("loaded {} raw klines", raw.len());
    let records = candle::derive_candles(raw, config);
    candles.store_candles(&records)?;
    info!("stored {} candles", records.len());
    Ok(records.len())
}

/// Group candles into the grouped table. Zero windows is an error here.
pub fn run_grouping(candles: &[Candle], config: &GrouperConfig) -> Result<Frame, PipelineError> {
    let rows = grouper::group(candles, config)?;
    if rows.is_empty() {
        return Err(PipelineError::InsufficientData {
            stage: Stage::Group,
            reason: format!(
                "{} candles cannot form a window of {} with future offset {}",
                candles.len(),
                config.window_size,
                config.future_offset
            ),
        });
    }
    Ok(grouper::to_frame(&rows, config.window_size))
}

/// Split, encode, filter and balance a grouped table.
pub fn run_cleaning(
    grouped: Frame,
    config: &CleaningConfig,
    technique: &dyn Balancer,
) -> Result<CleanedDataset, PipelineError> {
    info!(
        "cleaning input: {} rows x {} columns {:?}",
        grouped.len(),
        grouped.column_count(),
        grouped.columns()
    );
    grouped.require_column(Stage::Split, LABEL_COLUMN)?;

    let split = splitter::split(grouped, DATE_COLUMN, config.test_fraction)?;

    let mapping = OrdinalMapping::day_of_week();
    let train = encoder::encode(split.train, DAY_OF_WEEK_COLUMN, &mapping);
    let test = encoder::encode(split.test, DAY_OF_WEEK_COLUMN, &mapping);

    let train = temporal_filter::filter(train, config.keep_temporal_columns);
    let test = temporal_filter::filter(test, config.keep_temporal_columns);

    info!("balancing training split ({} rows)", train.len());
    let balanced = balancer::balance(
        train,
        LABEL_COLUMN,
        &temporal_filter::TEMPORAL_COLUMNS,
        &config.balance,
        technique,
    )?;

    Ok(CleanedDataset {
        train: LabeledSplit::from_frame(balanced.rows)?,
        test: LabeledSplit::from_frame(test)?,
        balance: balanced.report,
    })
}

/// Load candles, group them and persist the grouped table.
pub fn run_group_stage(
    candles: &dyn CandlePort,
    datasets: &dyn DatasetPort,
    config: &GrouperConfig,
) -> Result<(usize, usize), PipelineError> {
    banner("grouping candles into training windows");
    let source = candles.fetch_candles()?;
    let grouped = run_grouping(&source, config)?;
    datasets.write_grouped(&grouped)?;
    Ok((source.len(), grouped.len()))
}

/// Read the grouped table, clean it and persist the train/test artifacts.
pub fn run_clean_stage(
    datasets: &dyn DatasetPort,
    config: &CleaningConfig,
    technique: &dyn Balancer,
) -> Result<CleanedDataset, PipelineError> {
    banner("cleaning grouped dataset");
    let grouped = datasets.read_grouped()?;
    let cleaned = run_cleaning(grouped, config, technique)?;
    datasets.write_dataset(&cleaned)?;
    info!(
        "train = {} rows, test = {} rows, {} features",
        cleaned.train.len(),
        cleaned.test.len(),
        cleaned.train.features.column_count()
    );
    Ok(cleaned)
}

/// Run grouping then cleaning end to end.
pub fn run_pipeline(
    candles: &dyn CandlePort,
    datasets: &dyn DatasetPort,
    config: &PipelineConfig,
    technique: &dyn Balancer,
) -> Result<PipelineSummary, PipelineError> {
    let result = run_group_stage(candles, datasets, &config.grouper).and_then(
        |(candle_count, grouped_rows)| {
            let cleaned = run_clean_stage(datasets, &config.cleaning, technique)?;
            Ok(PipelineSummary {
                candles: candle_count,
                grouped_rows,
                train_rows: cleaned.train.len(),
                test_rows: cleaned.test.len(),
                balance: cleaned.balance,
            })
        },
    );

    match &result {
        Ok(_) => banner("pipeline completed"),
        Err(e) => error!(stage = ?e.stage(), "pipeline failed: {e}"),
    }
    result
}
