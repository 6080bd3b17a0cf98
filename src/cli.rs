//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvCandleAdapter, CsvDatasetAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::kline_csv_adapter::KlineCsvAdapter;
use crate::domain::balancer::{BalanceDecision, BalanceReport, Smote};
use crate::domain::config_validation::load_pipeline_config;
use crate::domain::error::PipelineError;
use crate::domain::pipeline::{self, PipelineConfig};
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(
    name = "bitbot-etl",
    about = "Turn BTC candles into a leakage-free training dataset"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Derive the candle table from raw kline CSV exports
    Prepare {
        #[arg(short, long)]
        config: PathBuf,
        /// Kline CSV file or directory, overrides [paths] klines
        #[arg(long)]
        klines: Option<PathBuf>,
        /// Candle CSV to write, overrides [paths] candles
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Group candles into labeled windows
    Group {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Split, encode, filter and balance the grouped table
    Clean {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run grouping and cleaning end to end
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file and print the resolved parameters
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// File locations from the `[paths]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    pub klines: PathBuf,
    pub candles: PathBuf,
    pub grouped: PathBuf,
    pub output_dir: PathBuf,
}

impl PathsConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let path = |key: &str, default: &str| {
            PathBuf::from(
                config
                    .get_string("paths", key)
                    .unwrap_or_else(|| default.to_string()),
            )
        };
        Self {
            klines: path("klines", "data/raw"),
            candles: path("candles", "data/candles.csv"),
            grouped: path("grouped", "data/grouped.csv"),
            output_dir: path("output_dir", "data/processed"),
        }
    }

    fn dataset_adapter(&self) -> CsvDatasetAdapter {
        CsvDatasetAdapter::new(self.grouped.clone(), self.output_dir.clone())
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Prepare {
            config,
            klines,
            output,
        } => run_prepare(&config, klines, output),
        Command::Group { config } => run_group(&config),
        Command::Clean { config } => run_clean(&config),
        Command::Run { config } => run_all(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn fail(err: &PipelineError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

/// Load the INI file and resolve it into paths and pipeline parameters.
pub fn load_settings(path: &Path) -> Result<(PathsConfig, PipelineConfig), ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    let config = load_pipeline_config(&adapter).map_err(|e| fail(&e))?;
    Ok((PathsConfig::from_config(&adapter), config))
}

fn run_prepare(
    config_path: &Path,
    klines_override: Option<PathBuf>,
    output_override: Option<PathBuf>,
) -> ExitCode {
    let (paths, config) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let klines = klines_override.unwrap_or(paths.klines);
    let output = output_override.unwrap_or(paths.candles);

    eprintln!("Reading klines from {}", klines.display());
    let source = KlineCsvAdapter::new(klines);
    let sink = CsvCandleAdapter::new(output.clone());
    match pipeline::prepare_candles(&source, &sink, &config.features) {
        Ok(count) => {
            eprintln!("Wrote {} candles to {}", count, output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_group(config_path: &Path) -> ExitCode {
    let (paths, config) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let candles = CsvCandleAdapter::new(paths.candles.clone());
    match pipeline::run_group_stage(&candles, &paths.dataset_adapter(), &config.grouper) {
        Ok((candle_count, rows)) => {
            eprintln!(
                "Grouped {} candles into {} rows -> {}",
                candle_count,
                rows,
                paths.grouped.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_clean(config_path: &Path) -> ExitCode {
    let (paths, config) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match pipeline::run_clean_stage(&paths.dataset_adapter(), &config.cleaning, &Smote) {
        Ok(cleaned) => {
            print_balance(&cleaned.balance);
            eprintln!(
                "Train: {} rows, test: {} rows -> {}",
                cleaned.train.len(),
                cleaned.test.len(),
                paths.output_dir.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_all(config_path: &Path) -> ExitCode {
    let (paths, config) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let candles = CsvCandleAdapter::new(paths.candles.clone());
    match pipeline::run_pipeline(&candles, &paths.dataset_adapter(), &config, &Smote) {
        Ok(summary) => {
            eprintln!("\nPipeline summary:");
            eprintln!("  candles:      {}", summary.candles);
            eprintln!("  grouped rows: {}", summary.grouped_rows);
            eprintln!("  train rows:   {}", summary.train_rows);
            eprintln!("  test rows:    {}", summary.test_rows);
            print_balance(&summary.balance);
            eprintln!("Artifacts written to {}", paths.output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_balance(report: &BalanceReport) {
    match &report.decision {
        BalanceDecision::Empty => eprintln!("  balancing:    skipped, empty training split"),
        BalanceDecision::AlreadyBalanced { ratio } => {
            eprintln!("  balancing:    not needed (ratio {ratio:.3})")
        }
        BalanceDecision::Oversampled {
            minority_label,
            k_neighbors,
            generated,
        } => eprintln!(
            "  balancing:    +{generated} synthetic rows of class {minority_label} (k = {k_neighbors})"
        ),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let (paths, config) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    eprintln!("\nPaths:");
    eprintln!("  klines:     {}", paths.klines.display());
    eprintln!("  candles:    {}", paths.candles.display());
    eprintln!("  grouped:    {}", paths.grouped.display());
    eprintln!("  output_dir: {}", paths.output_dir.display());

    eprintln!("\nFeatures:");
    eprintln!(
        "  percentage_return_threshold: {}",
        config.features.percentage_return_threshold
    );

    eprintln!("\nGrouper:");
    eprintln!("  window_size:       {}", config.grouper.window_size);
    eprintln!("  future_offset:     {}", config.grouper.future_offset);
    eprintln!("  bullish_threshold: {}", config.grouper.bullish_threshold);

    let cleaning = &config.cleaning;
    eprintln!("\nCleaning:");
    eprintln!("  test_fraction:         {}", cleaning.test_fraction);
    eprintln!("  keep_temporal_columns: {}", cleaning.keep_temporal_columns);
    eprintln!("  balance_target_ratio:  {}", cleaning.balance.target_ratio);
    eprintln!("  balance_k_neighbors:   {}", cleaning.balance.k_neighbors);
    eprintln!("  random_seed:           {}", cleaning.balance.seed);

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
