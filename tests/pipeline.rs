//! End-to-end scenario over a synthetic constant-price ticker: features →
//! model stages → merge, all inside a temp data directory.

use chrono::NaiveDate;
use tickercast::config::{LstmConfig, ModelsConfig};
use tickercast::storage::{ALL_PRICES_FILE, FEATURES_FILE, StorageManager, results_file};
use tickercast::types::{ArimaProphetRow, IndicatorRow, MergedRow, PriceRow, SarimaRow};
use tickercast::{forecast, indicators, merge};

const TICKER: &str = "TEST";
const PRICE: f64 = 100.0;
const ROWS: usize = 400;
const HORIZON: usize = 7;

fn constant_price_rows() -> Vec<PriceRow> {
    let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    (0..ROWS)
        .map(|i| PriceRow {
            date: start + chrono::Days::new(i as u64),
            open: PRICE,
            high: PRICE,
            low: PRICE,
            close: PRICE,
            volume: 10_000.0,
            ticker: TICKER.to_string(),
        })
        .collect()
}

fn test_models_config() -> ModelsConfig {
    ModelsConfig {
        horizons: vec![HORIZON],
        lstm: LstmConfig {
            time_steps: 10,
            hidden_units: 8,
            epochs: 2,
            batch_size: 32,
            patience: 2,
            learning_rate: 1e-3,
            seed: 1,
            scale_on_train_only: false,
        },
    }
}

#[tokio::test]
async fn constant_price_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageManager::new(dir.path()).await.unwrap();
    storage
        .save_csv(ALL_PRICES_FILE, &constant_price_rows())
        .await
        .unwrap();

    // Features stage.
    indicators::run(&storage).await.unwrap();
    let features: Vec<IndicatorRow> = storage.load_csv(FEATURES_FILE).await.unwrap();
    assert_eq!(features.len(), ROWS);
    // Warm-up rows stay undefined.
    assert!(features[..19].iter().all(|r| r.sma_20.is_none()));
    assert!(features[..49].iter().all(|r| r.sma_50.is_none()));
    // From row 50 on, all averages sit on the constant and the bands
    // collapse onto the middle.
    for row in &features[49..] {
        assert_eq!(row.sma_20, Some(PRICE));
        assert_eq!(row.sma_50, Some(PRICE));
        assert!((row.ema_20 - PRICE).abs() < 1e-9);
        assert_eq!(row.volatility_20, Some(0.0));
        assert_eq!(row.bb_upper, Some(PRICE));
        assert_eq!(row.bb_lower, Some(PRICE));
    }

    // Model stages.
    let cfg = test_models_config();
    forecast::run_arima_prophet(&cfg, &storage).await.unwrap();
    forecast::run_sarima(&cfg, &storage).await.unwrap();
    forecast::run_lstm(&cfg, &storage).await.unwrap();

    let arima_prophet: Vec<ArimaProphetRow> = storage
        .load_csv(&results_file(TICKER, "arima_prophet", HORIZON))
        .await
        .unwrap();
    assert_eq!(arima_prophet.len(), HORIZON);
    for row in &arima_prophet {
        assert_eq!(row.actual, PRICE);
        assert!((row.arima_forecast - PRICE).abs() < 1e-3);
        assert!((row.prophet_forecast - PRICE).abs() < 0.5);
    }

    let sarima: Vec<SarimaRow> = storage
        .load_csv(&results_file(TICKER, "sarima", HORIZON))
        .await
        .unwrap();
    assert_eq!(sarima.len(), HORIZON);
    for row in &sarima {
        assert!((row.sarima_forecast - PRICE).abs() < 1e-3);
    }

    let lstm: Vec<tickercast::types::LstmRow> = storage
        .load_csv(&results_file(TICKER, "lstm", HORIZON))
        .await
        .unwrap();
    assert_eq!(lstm.len(), HORIZON);
    // Zero scaler range maps every prediction back onto the constant.
    assert!(lstm.iter().all(|r| r.lstm_forecast == PRICE));

    // The train/test boundary: test dates are the last HORIZON dates.
    let expected_first_test_date = features[ROWS - HORIZON].date;
    assert_eq!(arima_prophet[0].date, expected_first_test_date);
    assert_eq!(sarima[0].date, expected_first_test_date);

    // Merge stage.
    merge::run(&cfg, &storage).await.unwrap();
    let merged: Vec<MergedRow> = storage
        .load_csv(&results_file(TICKER, "all_models", HORIZON))
        .await
        .unwrap();
    assert_eq!(merged.len(), arima_prophet.len());
    for (m, s) in merged.iter().zip(&sarima) {
        assert_eq!(m.date, s.date);
        assert_eq!(m.sarima_forecast, Some(s.sarima_forecast));
    }

    // Forecast plots landed next to the result CSVs.
    assert!(storage.exists("model_outputs/TEST_arima_prophet_forecast_7.png"));
    assert!(storage.exists("model_outputs/TEST_sarima_forecast_7.png"));
    assert!(storage.exists("model_outputs/TEST_lstm_forecast_7.png"));
}

#[tokio::test]
async fn merge_without_sarima_results_skips_quietly() {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageManager::new(dir.path()).await.unwrap();
    storage
        .save_csv(ALL_PRICES_FILE, &constant_price_rows())
        .await
        .unwrap();
    indicators::run(&storage).await.unwrap();

    let cfg = test_models_config();
    forecast::run_arima_prophet(&cfg, &storage).await.unwrap();

    merge::run(&cfg, &storage).await.unwrap();
    assert!(!storage.exists(&results_file(TICKER, "all_models", HORIZON)));
}
