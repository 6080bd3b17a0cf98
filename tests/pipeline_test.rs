//! Stage-level and end-to-end tests for the dataset pipeline.

mod common;

use approx::assert_relative_eq;
use bitbot_etl::domain::balancer::{self, BalanceDecision, BalanceParams, Smote};
use bitbot_etl::domain::encoder::{self, OrdinalMapping, DAY_OF_WEEK_COLUMN};
use bitbot_etl::domain::error::{PipelineError, Stage};
use bitbot_etl::domain::frame::{Cell, Frame};
use bitbot_etl::domain::grouper::{self, GrouperConfig, DATE_COLUMN, LABEL_COLUMN};
use bitbot_etl::domain::pipeline::{self, CleaningConfig, PipelineConfig};
use bitbot_etl::domain::splitter;
use bitbot_etl::domain::temporal_filter::{self, TEMPORAL_COLUMNS};
use common::*;
use proptest::prelude::*;

fn dated_frame(dates: &[String]) -> Frame {
    let rows = dates
        .iter()
        .enumerate()
        .map(|(i, d)| vec![Cell::Text(d.clone()), Cell::Number(i as f64)])
        .collect();
    Frame::from_rows(vec![DATE_COLUMN.into(), "id".into()], rows).unwrap()
}

fn date_text(frame: &Frame, row: usize) -> String {
    frame.get(row, DATE_COLUMN).unwrap().to_string()
}

mod grouping {
    use super::*;

    proptest! {
        #[test]
        fn window_count_is_n_minus_w_minus_f(n in 0usize..80, w in 1usize..8, f in 1usize..8) {
            let config = GrouperConfig { window_size: w, future_offset: f, bullish_threshold: 0.0001 };
            let rows = grouper::group(&flat_candles(n), &config).unwrap();
            prop_assert_eq!(rows.len(), n.saturating_sub(w + f));
            for (i, row) in rows.iter().enumerate() {
                prop_assert_eq!(row.start_index, i);
                prop_assert_eq!(row.positions.len(), w);
            }
        }
    }

    #[test]
    fn forward_return_against_threshold() {
        let mut prices = vec![(100.0, 100.0); 11];
        prices[9].0 = 100.02;
        let rows = grouper::group(&candles_from_prices(&prices), &GrouperConfig::default()).unwrap();
        assert_relative_eq!(rows[0].return_forward, 0.0002, epsilon = 1e-12);
        assert!(rows[0].is_bullish);

        prices[9].0 = 100.005;
        let rows = grouper::group(&candles_from_prices(&prices), &GrouperConfig::default()).unwrap();
        assert_relative_eq!(rows[0].return_forward, 0.00005, epsilon = 1e-12);
        assert!(!rows[0].is_bullish);
    }

    #[test]
    fn zero_close_aborts_with_window_index() {
        let mut prices = vec![(100.0, 100.0); 30];
        prices[12].1 = 0.0;
        let err = pipeline::run_grouping(&candles_from_prices(&prices), &GrouperConfig::default())
            .unwrap_err();
        // first window whose last candle is 12 starts at 8
        assert!(matches!(err, PipelineError::Computation { stage: Stage::Group, index: 8, .. }));
        assert!(err.to_string().starts_with("[group]"));
    }
}

mod splitting {
    use super::*;

    #[test]
    fn hundred_rows_split_eighty_twenty_deterministically() {
        let dates: Vec<String> = (0..100)
            .map(|i| format!("2024-01-01 {:02}:{:02}:00", i / 60, i % 60))
            .collect();
        let first = splitter::split(dated_frame(&dates), DATE_COLUMN, 0.2).unwrap();
        let second = splitter::split(dated_frame(&dates), DATE_COLUMN, 0.2).unwrap();

        assert_eq!(first.train.len(), 80);
        assert_eq!(first.test.len(), 20);
        assert_eq!(first.train.get(79, "id"), Some(&Cell::Number(79.0)));
        assert_eq!(first.test.get(0, "id"), Some(&Cell::Number(80.0)));
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn train_never_sees_the_future(
            minutes in prop::collection::vec(0u32..1440, 1..120),
            fraction in 0.0f64..=1.0,
        ) {
            let dates: Vec<String> = minutes
                .iter()
                .map(|m| format!("2024-02-01 {:02}:{:02}:00", m / 60, m % 60))
                .collect();
            let split = splitter::split(dated_frame(&dates), DATE_COLUMN, fraction).unwrap();
            prop_assert_eq!(split.train.len() + split.test.len(), dates.len());
            if !split.train.is_empty() && !split.test.is_empty() {
                let max_train = (0..split.train.len()).map(|r| date_text(&split.train, r)).max().unwrap();
                let min_test = (0..split.test.len()).map(|r| date_text(&split.test, r)).min().unwrap();
                prop_assert!(max_train <= min_test);
            }
        }
    }
}

mod encoding_and_filtering {
    use super::*;

    #[test]
    fn encoded_day_column_is_stable() {
        let frame = Frame::from_rows(
            vec![DAY_OF_WEEK_COLUMN.into()],
            vec![vec!["Lunes".into()], vec!["Domingo".into()], vec!["Jueves".into()]],
        )
        .unwrap();
        let mapping = OrdinalMapping::day_of_week();
        let once = encoder::encode(frame, DAY_OF_WEEK_COLUMN, &mapping);
        assert_eq!(once.get(0, DAY_OF_WEEK_COLUMN), Some(&Cell::Number(0.0)));
        assert_eq!(once.get(1, DAY_OF_WEEK_COLUMN), Some(&Cell::Number(6.0)));
        assert_eq!(encoder::encode(once.clone(), DAY_OF_WEEK_COLUMN, &mapping), once);
    }

    #[test]
    fn filter_drops_only_present_columns() {
        let columns = vec!["entrada_vela_1".to_string(), "fecha".into(), "anio".into()];
        let frame = Frame::from_rows(
            columns,
            vec![vec![Cell::Number(1.0), "2024-01-01".into(), Cell::Number(2024.0)]],
        )
        .unwrap();
        let out = temporal_filter::filter(frame, false);
        assert_eq!(out.columns(), &["entrada_vela_1".to_string()]);
        assert!(TEMPORAL_COLUMNS.iter().all(|c| !out.has_column(c)));
    }
}

mod balancing {
    use super::*;

    fn imbalanced(majority: usize, minority: usize) -> Frame {
        let mut rows = Vec::new();
        for i in 0..majority {
            rows.push(vec![Cell::Number(i as f64), Cell::Number((i % 5) as f64), Cell::Number(0.0)]);
        }
        for i in 0..minority {
            rows.push(vec![
                Cell::Number(100.0 + i as f64),
                Cell::Number(50.0 - i as f64),
                Cell::Number(1.0),
            ]);
        }
        Frame::from_rows(vec!["a".into(), "b".into(), LABEL_COLUMN.into()], rows).unwrap()
    }

    #[test]
    fn originals_are_kept_and_minority_is_topped_up() {
        let input = imbalanced(50, 10);
        let out = balancer::balance(input.clone(), LABEL_COLUMN, &[], &BalanceParams::default(), &Smote)
            .unwrap();

        // floor(50 * 0.8) - 10
        assert_eq!(out.report.synthetic_rows(), 30);
        assert_eq!(out.rows.len(), 90);
        assert_eq!(&out.rows.rows()[..60], input.rows());
        assert_eq!(out.report.after.count(1), 40);
        assert_relative_eq!(out.report.before.classes[1].percentage, 100.0 / 6.0, epsilon = 1e-9);
        assert!(out.rows.rows()[60..]
            .iter()
            .all(|r| r[2] == Cell::Number(1.0) && r[0].as_number().unwrap() >= 100.0));
    }

    #[test]
    fn balanced_input_is_returned_unchanged() {
        let input = imbalanced(10, 9);
        let out = balancer::balance(input.clone(), LABEL_COLUMN, &[], &BalanceParams::default(), &Smote)
            .unwrap();
        assert_eq!(out.rows, input);
        assert!(matches!(out.report.decision, BalanceDecision::AlreadyBalanced { .. }));
    }

    #[test]
    fn same_seed_same_synthetic_rows() {
        let params = BalanceParams { seed: 7, ..BalanceParams::default() };
        let a = balancer::balance(imbalanced(40, 6), LABEL_COLUMN, &[], &params, &Smote).unwrap();
        let b = balancer::balance(imbalanced(40, 6), LABEL_COLUMN, &[], &params, &Smote).unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn single_minority_row_is_insufficient() {
        let err = balancer::balance(imbalanced(20, 1), LABEL_COLUMN, &[], &BalanceParams::default(), &Smote)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { stage: Stage::Balance, .. }));
    }
}

mod orchestration {
    use super::*;

    #[test]
    fn full_run_persists_features_and_labels() {
        let candles = MockCandlePort::new(sawtooth_candles(200));
        let datasets = MockDatasetPort::default();
        let summary =
            pipeline::run_pipeline(&candles, &datasets, &PipelineConfig::default(), &Smote).unwrap();

        assert_eq!(summary.candles, 200);
        assert_eq!(summary.grouped_rows, 190);
        assert_eq!(summary.test_rows, 38);
        assert!(summary.train_rows >= 152);

        let dataset = datasets.dataset.borrow().clone().unwrap();
        assert_eq!(dataset.train.features.len(), dataset.train.labels.len());
        assert_eq!(dataset.test.labels.columns(), &[LABEL_COLUMN.to_string()]);
        assert!(!dataset.train.features.has_column(LABEL_COLUMN));
        assert!(!dataset.train.features.has_column(DATE_COLUMN));
        assert_eq!(dataset.train.features.column_count(), 25);
    }

    #[test]
    fn grouped_table_is_written_before_cleaning() {
        let candles = MockCandlePort::new(sawtooth_candles(40));
        let datasets = MockDatasetPort::default();
        pipeline::run_group_stage(&candles, &datasets, &GrouperConfig::default()).unwrap();

        let grouped = datasets.grouped.borrow().clone().unwrap();
        assert_eq!(grouped.len(), 30);
        assert_eq!(grouped.columns().last().map(String::as_str), Some(DATE_COLUMN));
        assert_eq!(grouped.get(0, DATE_COLUMN), Some(&Cell::Text("2024-01-01 00:00:00".into())));
    }

    #[test]
    fn too_few_candles_stops_at_grouping() {
        let candles = MockCandlePort::new(sawtooth_candles(10));
        let datasets = MockDatasetPort::default();
        let err = pipeline::run_pipeline(&candles, &datasets, &PipelineConfig::default(), &Smote)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { stage: Stage::Group, .. }));
        assert!(datasets.grouped.borrow().is_none());
        assert!(datasets.dataset.borrow().is_none());
    }

    #[test]
    fn load_failure_propagates() {
        let candles = MockCandlePort::new(Vec::new()).with_error("disk on fire");
        let datasets = MockDatasetPort::default();
        let err = pipeline::run_pipeline(&candles, &datasets, &PipelineConfig::default(), &Smote)
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Load));
    }

    #[test]
    fn whole_test_fraction_leaves_empty_train() {
        let datasets = MockDatasetPort::with_grouped(
            pipeline::run_grouping(&sawtooth_candles(30), &GrouperConfig::default()).unwrap(),
        );
        let config = CleaningConfig { test_fraction: 1.0, ..CleaningConfig::default() };
        let cleaned = pipeline::run_clean_stage(&datasets, &config, &Smote).unwrap();
        assert!(cleaned.train.is_empty());
        assert_eq!(cleaned.test.len(), 20);
        assert!(matches!(cleaned.balance.decision, BalanceDecision::Empty));
    }

    #[test]
    fn kept_temporal_columns_are_missing_in_synthetic_rows() {
        let grouped =
            pipeline::run_grouping(&spaced_candles(300, 5), &GrouperConfig::default()).unwrap();
        let config = CleaningConfig { keep_temporal_columns: true, ..CleaningConfig::default() };
        let cleaned = pipeline::run_cleaning(grouped, &config, &Smote).unwrap();

        assert!(matches!(cleaned.balance.decision, BalanceDecision::Oversampled { .. }));
        let features = &cleaned.train.features;
        let originals = cleaned.balance.before.total;
        assert!(features.len() > originals);
        for column in TEMPORAL_COLUMNS.iter().filter(|c| features.has_column(c)) {
            for row in 0..originals {
                assert_ne!(features.get(row, column), Some(&Cell::Missing), "{column} at {row}");
            }
            for row in originals..features.len() {
                assert_eq!(features.get(row, column), Some(&Cell::Missing), "{column} at {row}");
            }
        }
        assert!(features.has_column(DAY_OF_WEEK_COLUMN));
        assert!(features.get(originals, "entrada_vela_1").unwrap().as_number().is_some());
    }

    #[test]
    fn prepare_derives_and_stores_candles() {
        let klines = MockKlinePort {
            klines: vec![kline(1, 100.0, 101.0), kline(0, 100.0, 99.0)],
        };
        let store = MockCandlePort::new(Vec::new());
        let count = pipeline::prepare_candles(&klines, &store, &Default::default()).unwrap();

        assert_eq!(count, 2);
        let stored = store.stored.borrow();
        assert_relative_eq!(stored[0].candle.return_pct, -1.0);
        assert_relative_eq!(stored[1].candle.return_pct, 1.0);
        assert!(stored[1].is_bullish);
        assert_eq!(stored[0].bullish_count, 0);
    }
}
