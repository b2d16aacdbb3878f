//! Application configuration.
//!
//! An optional `config.json` in the working directory overrides the built-in
//! defaults; every field falls back individually, so a partial file is fine.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    /// Symbols to fetch, Yahoo Finance notation ("^GSPC" for indices).
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            tickers: [
                "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "JPM", "NFLX", "^NSEI", "^GSPC",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            start: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LstmConfig {
    /// Input window length, in trading days.
    pub time_steps: usize,
    pub hidden_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    /// Early-stopping patience on the training loss.
    pub patience: usize,
    pub learning_rate: f64,
    /// Weight-init seed, fixed so runs are reproducible.
    pub seed: u64,
    /// When false (the default) the min-max scaler is fitted on the entire
    /// series including the held-out tail, leaking the test range into the
    /// scaling. Set true for the corrected fit-on-train-only mode.
    pub scale_on_train_only: bool,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            time_steps: 30,
            hidden_units: 50,
            epochs: 30,
            batch_size: 32,
            patience: 5,
            learning_rate: 1e-3,
            seed: 42,
            scale_on_train_only: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    /// Trailing days held out as the test/forecast target.
    pub horizons: Vec<usize>,
    pub lstm: LstmConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            horizons: vec![7, 30, 90, 180],
            lstm: LstmConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the artifact directory tree shared by all stages.
    pub data_dir: PathBuf,
    pub download: DownloadConfig,
    pub models: ModelsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            download: DownloadConfig::default(),
            models: ModelsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads `config.json` from the working directory, or the defaults when
    /// the file is absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no {} found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = serde_json::from_slice(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_parameters() {
        let config = AppConfig::default();
        assert_eq!(config.download.tickers.len(), 10);
        assert_eq!(config.models.horizons, vec![7, 30, 90, 180]);
        assert_eq!(config.models.lstm.time_steps, 30);
        assert_eq!(config.models.lstm.epochs, 30);
        assert_eq!(config.models.lstm.batch_size, 32);
        assert!(!config.models.lstm.scale_on_train_only);
    }

    #[test]
    fn partial_config_falls_back_per_field() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"models": {"horizons": [7]}}"#).unwrap();
        assert_eq!(parsed.models.horizons, vec![7]);
        assert_eq!(parsed.models.lstm.hidden_units, 50);
        assert_eq!(parsed.download.tickers.len(), 10);
    }
}
