//! Configuration validation.
//!
//! Reads the `[features]`, `[grouper]` and `[cleaning]` sections, applies
//! defaults for absent keys and rejects values no stage could run with.

use crate::domain::balancer::BalanceParams;
use crate::domain::candle::FeatureConfig;
use crate::domain::error::PipelineError;
use crate::domain::grouper::GrouperConfig;
use crate::domain::pipeline::{CleaningConfig, PipelineConfig};
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

pub fn load_pipeline_config(config: &dyn ConfigPort) -> Result<PipelineConfig, PipelineError> {
    Ok(PipelineConfig {
        features: load_feature_config(config)?,
        grouper: load_grouper_config(config)?,
        cleaning: load_cleaning_config(config)?,
    })
}

fn invalid(section: &str, key: &str, reason: &str) -> PipelineError {
    PipelineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// A key that is present must parse as `T`; absent keys take the default.
fn check_parses<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), PipelineError> {
    match config.get_string(section, key) {
        Some(raw) if raw.parse::<T>().is_err() => Err(invalid(
            section,
            key,
            &format!("cannot parse {raw:?}"),
        )),
        _ => Ok(()),
    }
}

/// A present boolean key must use a recognised spelling. An unrecognised one
/// is the only case where `get_bool` echoes back its default.
fn check_flag(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), PipelineError> {
    match config.get_string(section, key) {
        Some(raw) if config.get_bool(section, key, true) != config.get_bool(section, key, false) => {
            Err(invalid(
                section,
                key,
                &format!("expected true or false, got {raw:?}"),
            ))
        }
        _ => Ok(()),
    }
}

pub fn load_feature_config(config: &dyn ConfigPort) -> Result<FeatureConfig, PipelineError> {
    let defaults = FeatureConfig::default();
    check_parses::<f64>(config, "features", "percentage_return_threshold")?;
    let threshold = config.get_double(
        "features",
        "percentage_return_threshold",
        defaults.percentage_return_threshold,
    );
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(invalid(
            "features",
            "percentage_return_threshold",
            "percentage_return_threshold must be a non-negative number",
        ));
    }
    Ok(FeatureConfig {
        percentage_return_threshold: threshold,
    })
}

pub fn load_grouper_config(config: &dyn ConfigPort) -> Result<GrouperConfig, PipelineError> {
    let defaults = GrouperConfig::default();
    check_parses::<i64>(config, "grouper", "window_size")?;
    check_parses::<i64>(config, "grouper", "future_offset")?;
    check_parses::<f64>(config, "grouper", "bullish_threshold")?;

    let window_size = match config.get_count("grouper", "window_size", defaults.window_size) {
        Some(v) if v >= 1 => v,
        _ => {
            return Err(invalid(
                "grouper",
                "window_size",
                "window_size must be at least 1",
            ))
        }
    };

    let future_offset = match config.get_count("grouper", "future_offset", defaults.future_offset)
    {
        Some(v) if v >= 1 => v,
        _ => {
            return Err(invalid(
                "grouper",
                "future_offset",
                "future_offset must be at least 1",
            ))
        }
    };

    let bullish_threshold =
        config.get_double("grouper", "bullish_threshold", defaults.bullish_threshold);
    if !bullish_threshold.is_finite() {
        return Err(invalid(
            "grouper",
            "bullish_threshold",
            "bullish_threshold must be a finite number",
        ));
    }

    Ok(GrouperConfig {
        window_size,
        future_offset,
        bullish_threshold,
    })
}

pub fn load_cleaning_config(config: &dyn ConfigPort) -> Result<CleaningConfig, PipelineError> {
    let defaults = CleaningConfig::default();
    check_parses::<f64>(config, "cleaning", "test_fraction")?;
    check_flag(config, "cleaning", "keep_temporal_columns")?;
    check_parses::<f64>(config, "cleaning", "balance_target_ratio")?;
    check_parses::<i64>(config, "cleaning", "balance_k_neighbors")?;
    check_parses::<i64>(config, "cleaning", "random_seed")?;

    let test_fraction = config.get_double("cleaning", "test_fraction", defaults.test_fraction);
    if !(0.0..=1.0).contains(&test_fraction) {
        return Err(invalid(
            "cleaning",
            "test_fraction",
            "test_fraction must be between 0 and 1",
        ));
    }

    let keep_temporal_columns = config.get_bool(
        "cleaning",
        "keep_temporal_columns",
        defaults.keep_temporal_columns,
    );

    let target_ratio = config.get_double(
        "cleaning",
        "balance_target_ratio",
        defaults.balance.target_ratio,
    );
    if !(target_ratio > 0.0 && target_ratio <= 1.0) {
        return Err(invalid(
            "cleaning",
            "balance_target_ratio",
            "balance_target_ratio must be in (0, 1]",
        ));
    }

    let k_neighbors = match config.get_count(
        "cleaning",
        "balance_k_neighbors",
        defaults.balance.k_neighbors,
    ) {
        Some(v) if v >= 1 => v,
        _ => {
            return Err(invalid(
                "cleaning",
                "balance_k_neighbors",
                "balance_k_neighbors must be at least 1",
            ))
        }
    };

    let seed = config.get_int("cleaning", "random_seed", defaults.balance.seed as i64);
    let seed = u64::try_from(seed)
        .map_err(|_| invalid("cleaning", "random_seed", "random_seed must be non-negative"))?;

    Ok(CleaningConfig {
        test_fraction,
        keep_temporal_columns,
        balance: BalanceParams {
            target_ratio,
            k_neighbors,
            seed,
        },
    })
}
