//! The three model stages. Each iterates (ticker × horizon), catches
//! per-unit failures, writes one results CSV and one plot image per unit,
//! and ends with an aggregated run report.

use crate::config::{LstmConfig, ModelsConfig};
use crate::models::arima::Arima;
use crate::models::prophet::Prophet;
use crate::models::sarima::Sarima;
use crate::models::{self, Forecaster, Metrics, ModelScore, RunReport, TimeSeries, lstm};
use crate::plot::{self, Series};
use crate::storage::{StorageManager, forecast_plot_file, results_file};
use crate::types::{ArimaProphetRow, LstmRow, SarimaRow};
use anyhow::Result;
use tracing::info;

pub async fn run_arima_prophet(cfg: &ModelsConfig, storage: &StorageManager) -> Result<()> {
    let series = models::load_close_series(storage).await?;
    let mut report = RunReport::new("arima_prophet");
    for (ticker, ts) in &series {
        info!("processing {ticker}");
        for &horizon in &cfg.horizons {
            let outcome = arima_prophet_unit(ticker, ts, horizon, storage).await;
            report.record(ticker, horizon, outcome);
        }
    }
    report.print();
    Ok(())
}

async fn arima_prophet_unit(
    ticker: &str,
    ts: &TimeSeries,
    horizon: usize,
    storage: &StorageManager,
) -> Result<Vec<ModelScore>> {
    let (train, test) = ts.split_train_test(horizon)?;

    let mut arima = Arima::new(5, 1);
    arima.fit(&train)?;
    let arima_forecast = arima.forecast(&test.dates)?;

    let mut prophet = Prophet::new();
    prophet.fit(&train)?;
    let prophet_forecast = prophet.forecast(&test.dates)?;

    let rows: Vec<ArimaProphetRow> = test
        .dates
        .iter()
        .enumerate()
        .map(|(i, &date)| ArimaProphetRow {
            date,
            actual: test.values[i],
            arima_forecast: arima_forecast[i],
            prophet_forecast: prophet_forecast[i],
        })
        .collect();
    storage
        .save_csv(&results_file(ticker, "arima_prophet", horizon), &rows)
        .await?;

    plot::forecast_plot(
        &storage.path(&forecast_plot_file(ticker, "arima_prophet", horizon)),
        &format!("{ticker} Close Price Forecast (ARIMA & Prophet, {horizon} days)"),
        &[
            Series {
                label: "Train",
                color: plot::TRAIN_COLOR,
                dates: &train.dates,
                values: &train.values,
            },
            Series {
                label: "Test",
                color: plot::TEST_COLOR,
                dates: &test.dates,
                values: &test.values,
            },
            Series {
                label: "ARIMA Forecast",
                color: plot::ARIMA_COLOR,
                dates: &test.dates,
                values: &arima_forecast,
            },
            Series {
                label: "Prophet Forecast",
                color: plot::PROPHET_COLOR,
                dates: &test.dates,
                values: &prophet_forecast,
            },
        ],
    )?;

    Ok(vec![
        ModelScore {
            model: "ARIMA",
            metrics: Metrics::compute(&test.values, &arima_forecast),
        },
        ModelScore {
            model: "Prophet",
            metrics: Metrics::compute(&test.values, &prophet_forecast),
        },
    ])
}

pub async fn run_sarima(cfg: &ModelsConfig, storage: &StorageManager) -> Result<()> {
    let series = models::load_close_series(storage).await?;
    let mut report = RunReport::new("sarima");
    for (ticker, ts) in &series {
        info!("processing {ticker}");
        for &horizon in &cfg.horizons {
            let outcome = sarima_unit(ticker, ts, horizon, storage).await;
            report.record(ticker, horizon, outcome);
        }
    }
    report.print();
    Ok(())
}

async fn sarima_unit(
    ticker: &str,
    ts: &TimeSeries,
    horizon: usize,
    storage: &StorageManager,
) -> Result<Vec<ModelScore>> {
    let (train, test) = ts.split_train_test(horizon)?;

    let mut model = Sarima::new();
    model.fit(&train)?;
    let forecast = model.forecast(&test.dates)?;

    let rows: Vec<SarimaRow> = test
        .dates
        .iter()
        .enumerate()
        .map(|(i, &date)| SarimaRow {
            date,
            actual: test.values[i],
            sarima_forecast: forecast[i],
        })
        .collect();
    storage
        .save_csv(&results_file(ticker, "sarima", horizon), &rows)
        .await?;

    plot::forecast_plot(
        &storage.path(&forecast_plot_file(ticker, "sarima", horizon)),
        &format!("{ticker} Close Price Forecast (SARIMA, {horizon} days)"),
        &[
            Series {
                label: "Train",
                color: plot::TRAIN_COLOR,
                dates: &train.dates,
                values: &train.values,
            },
            Series {
                label: "Test",
                color: plot::TEST_COLOR,
                dates: &test.dates,
                values: &test.values,
            },
            Series {
                label: "SARIMA Forecast",
                color: plot::SARIMA_COLOR,
                dates: &test.dates,
                values: &forecast,
            },
        ],
    )?;

    Ok(vec![ModelScore {
        model: "SARIMA",
        metrics: Metrics::compute(&test.values, &forecast),
    }])
}

pub async fn run_lstm(cfg: &ModelsConfig, storage: &StorageManager) -> Result<()> {
    if !cfg.lstm.scale_on_train_only {
        tracing::warn!(
            "LSTM scaler is fitted on the full series including the holdout \
             tail; set models.lstm.scale_on_train_only for the leak-free mode"
        );
    }
    let series = models::load_close_series(storage).await?;
    let mut report = RunReport::new("lstm");
    for (ticker, ts) in &series {
        info!("processing {ticker}");
        for &horizon in &cfg.horizons {
            let outcome = lstm_unit(ticker, ts, horizon, &cfg.lstm, storage).await;
            report.record(ticker, horizon, outcome);
        }
    }
    report.print();
    Ok(())
}

async fn lstm_unit(
    ticker: &str,
    ts: &TimeSeries,
    horizon: usize,
    cfg: &LstmConfig,
    storage: &StorageManager,
) -> Result<Vec<ModelScore>> {
    let forecast = lstm::forecast_series(cfg, &ts.values, horizon)?;
    let cut = ts.len() - horizon;
    let test_dates = &ts.dates[cut..];
    let actual = &ts.values[cut..];

    let rows: Vec<LstmRow> = test_dates
        .iter()
        .enumerate()
        .map(|(i, &date)| LstmRow {
            date,
            actual: actual[i],
            lstm_forecast: forecast[i],
        })
        .collect();
    storage
        .save_csv(&results_file(ticker, "lstm", horizon), &rows)
        .await?;

    // Only the context window feeding the forecast is drawn as train.
    let context_start = ts.len() - horizon - cfg.time_steps;
    plot::forecast_plot(
        &storage.path(&forecast_plot_file(ticker, "lstm", horizon)),
        &format!("{ticker} Close Price Forecast (LSTM, {horizon} days)"),
        &[
            Series {
                label: "Train",
                color: plot::TRAIN_COLOR,
                dates: &ts.dates[context_start..cut],
                values: &ts.values[context_start..cut],
            },
            Series {
                label: "Test",
                color: plot::TEST_COLOR,
                dates: test_dates,
                values: actual,
            },
            Series {
                label: "LSTM Forecast",
                color: plot::LSTM_COLOR,
                dates: test_dates,
                values: &forecast,
            },
        ],
    )?;

    Ok(vec![ModelScore {
        model: "LSTM",
        metrics: Metrics::compute(actual, &forecast),
    }])
}
