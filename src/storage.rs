//! Artifact storage shared by every pipeline stage.
//!
//! The data directory is the hand-off point between stages: one stage's CSV
//! output is the next stage's required input. All writes go through a
//! temp-file-then-rename so a crash mid-write leaves a missing artifact, never
//! a torn one.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MODEL_OUTPUT_DIR: &str = "model_outputs";
pub const EXPORT_DIR: &str = "exports";

pub struct StorageManager {
    pub base_dir: PathBuf,
}

impl StorageManager {
    /// Creates the manager and the directory itself, so later saves never
    /// have to check for it.
    pub async fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Serializes `rows` as CSV (header from the row struct) and writes the
    /// file atomically.
    pub async fn save_csv<T: Serialize>(&self, relative: &str, rows: &[T]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for row in rows {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush CSV buffer: {e}"))?;
        self.write_atomic(relative, &bytes).await
    }

    /// Reads a CSV artifact back into typed rows.
    pub async fn load_csv<T: DeserializeOwned>(&self, relative: &str) -> Result<Vec<T>> {
        let path = self.path(relative);
        let content = fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut reader = csv::Reader::from_reader(content.as_slice());
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            rows.push(row.with_context(|| format!("bad row in {}", path.display()))?);
        }
        Ok(rows)
    }

    /// Writes raw bytes via a `.tmp` sibling and an atomic rename.
    pub async fn write_atomic(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let final_path = self.path(relative);
        if let Some(parent) = final_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }
        let tmp_path = final_path.with_extension("tmp");
        fs::write(&tmp_path, bytes).await?;
        fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }
}

/// `data/{TICKER}_10y.csv`
pub fn ticker_prices_file(ticker: &str) -> String {
    format!("{ticker}_10y.csv")
}

pub const ALL_PRICES_FILE: &str = "all_stocks_10y.csv";
pub const FEATURES_FILE: &str = "all_stocks_10y_features.csv";
pub const CLOSING_PRICES_PLOT: &str = "closing_prices_all_stocks.png";
pub const CORRELATION_PLOT: &str = "correlation_heatmap.png";

/// `data/model_outputs/{TICKER}_{model}_results_{horizon}.csv`
pub fn results_file(ticker: &str, model: &str, horizon: usize) -> String {
    format!("{MODEL_OUTPUT_DIR}/{ticker}_{model}_results_{horizon}.csv")
}

/// `data/model_outputs/{TICKER}_{model}_forecast_{horizon}.png`
pub fn forecast_plot_file(ticker: &str, model: &str, horizon: usize) -> String {
    format!("{MODEL_OUTPUT_DIR}/{ticker}_{model}_forecast_{horizon}.png")
}

/// `data/exports/{ticker}_forecast_{horizon}d.csv` (dashboard download)
pub fn export_file(ticker: &str, horizon: usize) -> String {
    format!("{EXPORT_DIR}/{ticker}_forecast_{horizon}d.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SarimaRow;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn csv_round_trip_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        let rows = vec![
            SarimaRow {
                date: NaiveDate::from_ymd_opt(2023, 7, 3).unwrap(),
                actual: 192.46,
                sarima_forecast: 191.02,
            },
            SarimaRow {
                date: NaiveDate::from_ymd_opt(2023, 7, 5).unwrap(),
                actual: 191.33,
                sarima_forecast: 190.87,
            },
        ];
        storage
            .save_csv(&results_file("AAPL", "sarima", 7), &rows)
            .await
            .unwrap();

        let loaded: Vec<SarimaRow> = storage
            .load_csv(&results_file("AAPL", "sarima", 7))
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].date, rows[0].date);
        assert_eq!(loaded[1].sarima_forecast, rows[1].sarima_forecast);
    }

    #[test]
    fn artifact_names_follow_the_layout() {
        assert_eq!(ticker_prices_file("AAPL"), "AAPL_10y.csv");
        assert_eq!(
            results_file("MSFT", "arima_prophet", 30),
            "model_outputs/MSFT_arima_prophet_results_30.csv"
        );
        assert_eq!(export_file("TSLA", 90), "exports/TSLA_forecast_90d.csv");
    }
}
