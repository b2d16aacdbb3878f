//! Result merger: left-joins the SARIMA forecast column onto the
//! ARIMA/Prophet results by date, per (ticker, horizon). LSTM results stay
//! separate.

use crate::config::ModelsConfig;
use crate::models;
use crate::storage::{StorageManager, results_file};
use crate::types::{ArimaProphetRow, MergedRow, SarimaRow};
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{info, warn};

/// Merge stage entry point; tickers come from the features file so the
/// stage sees the same universe the model stages did.
pub async fn run(cfg: &ModelsConfig, storage: &StorageManager) -> Result<()> {
    let series = models::load_close_series(storage).await?;
    let mut merged_count = 0usize;
    for (ticker, _) in &series {
        for &horizon in &cfg.horizons {
            if merge_unit(ticker, horizon, storage).await? {
                merged_count += 1;
            }
        }
    }
    info!("merge complete, {merged_count} combined result files written");
    Ok(())
}

/// Returns whether a merged file was produced. Both source files must
/// exist; otherwise the unit is skipped with a log line and no output.
pub async fn merge_unit(ticker: &str, horizon: usize, storage: &StorageManager) -> Result<bool> {
    let arima_prophet_path = results_file(ticker, "arima_prophet", horizon);
    let sarima_path = results_file(ticker, "sarima", horizon);
    if !storage.exists(&arima_prophet_path) || !storage.exists(&sarima_path) {
        warn!("skipping {ticker} ({horizon}d): missing ARIMA/Prophet or SARIMA results");
        return Ok(false);
    }

    let arima_prophet: Vec<ArimaProphetRow> = storage.load_csv(&arima_prophet_path).await?;
    let sarima: Vec<SarimaRow> = storage.load_csv(&sarima_path).await?;
    let sarima_by_date: HashMap<NaiveDate, f64> = sarima
        .into_iter()
        .map(|row| (row.date, row.sarima_forecast))
        .collect();

    let merged: Vec<MergedRow> = arima_prophet
        .into_iter()
        .map(|row| MergedRow {
            date: row.date,
            actual: row.actual,
            arima_forecast: row.arima_forecast,
            prophet_forecast: row.prophet_forecast,
            sarima_forecast: sarima_by_date.get(&row.date).copied(),
        })
        .collect();

    let out_path = results_file(ticker, "all_models", horizon);
    storage.save_csv(&out_path, &merged).await?;
    info!("merged model results saved as {}", storage.path(&out_path).display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, day).unwrap()
    }

    fn arima_prophet_rows() -> Vec<ArimaProphetRow> {
        (1..=5)
            .map(|day| ArimaProphetRow {
                date: date(day),
                actual: 100.0 + day as f64,
                arima_forecast: 101.0 + day as f64,
                prophet_forecast: 99.0 + day as f64,
            })
            .collect()
    }

    #[tokio::test]
    async fn joins_sarima_values_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        storage
            .save_csv(&results_file("T", "arima_prophet", 5), &arima_prophet_rows())
            .await
            .unwrap();
        // SARIMA covers only three of the five dates.
        let sarima: Vec<SarimaRow> = [1u32, 3, 5]
            .iter()
            .map(|&day| SarimaRow {
                date: date(day),
                actual: 100.0 + day as f64,
                sarima_forecast: 200.0 + day as f64,
            })
            .collect();
        storage
            .save_csv(&results_file("T", "sarima", 5), &sarima)
            .await
            .unwrap();

        assert!(merge_unit("T", 5, &storage).await.unwrap());
        let merged: Vec<MergedRow> = storage
            .load_csv(&results_file("T", "all_models", 5))
            .await
            .unwrap();
        // Row count equals the ARIMA/Prophet side of the join.
        assert_eq!(merged.len(), 5);
        assert_eq!(merged[0].sarima_forecast, Some(201.0));
        assert_eq!(merged[1].sarima_forecast, None);
        assert_eq!(merged[4].sarima_forecast, Some(205.0));
        assert_eq!(merged[2].arima_forecast, 104.0);
    }

    #[tokio::test]
    async fn missing_source_produces_no_file_and_no_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        storage
            .save_csv(&results_file("T", "arima_prophet", 5), &arima_prophet_rows())
            .await
            .unwrap();

        assert!(!merge_unit("T", 5, &storage).await.unwrap());
        assert!(!storage.exists(&results_file("T", "all_models", 5)));
    }
}
