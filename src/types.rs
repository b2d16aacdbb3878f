//! Typed rows for every CSV artifact the pipeline stages hand to each other.
//!
//! Each stage reads and writes these structs through [`crate::storage`], so
//! column names and ordering live in exactly one place.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of (adjusted) OHLCV data for a single ticker.
///
/// Rows are immutable once fetched; the ingestion stage writes them ordered
/// by date, one file per ticker plus a combined all-tickers file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PriceRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Ticker")]
    pub ticker: String,
}

/// A [`PriceRow`] enriched with the derived indicator columns.
///
/// Windowed indicators are `None` (an empty CSV cell) until their warm-up
/// window is full; the exponentially-smoothed columns are defined from the
/// first row of each ticker's series.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndicatorRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "SMA_20")]
    pub sma_20: Option<f64>,
    #[serde(rename = "SMA_50")]
    pub sma_50: Option<f64>,
    #[serde(rename = "EMA_20")]
    pub ema_20: f64,
    #[serde(rename = "RSI_14")]
    pub rsi_14: Option<f64>,
    #[serde(rename = "MACD")]
    pub macd: f64,
    #[serde(rename = "MACD_Signal")]
    pub macd_signal: f64,
    #[serde(rename = "BB_Middle")]
    pub bb_middle: Option<f64>,
    #[serde(rename = "BB_Std")]
    pub bb_std: Option<f64>,
    #[serde(rename = "BB_Upper")]
    pub bb_upper: Option<f64>,
    #[serde(rename = "BB_Lower")]
    pub bb_lower: Option<f64>,
    #[serde(rename = "Volatility_20")]
    pub volatility_20: Option<f64>,
}

/// Held-out tail row produced by the ARIMA + Prophet stage.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ArimaProphetRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Actual")]
    pub actual: f64,
    #[serde(rename = "ARIMA_Forecast")]
    pub arima_forecast: f64,
    #[serde(rename = "Prophet_Forecast")]
    pub prophet_forecast: f64,
}

/// Held-out tail row produced by the SARIMA stage.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SarimaRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Actual")]
    pub actual: f64,
    #[serde(rename = "SARIMA_Forecast")]
    pub sarima_forecast: f64,
}

/// Held-out tail row produced by the LSTM stage. Not merged downstream.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LstmRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Actual")]
    pub actual: f64,
    #[serde(rename = "LSTM_Forecast")]
    pub lstm_forecast: f64,
}

/// ARIMA/Prophet row with the SARIMA forecast left-joined on date.
///
/// `sarima_forecast` stays `None` for dates the SARIMA file does not cover.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MergedRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Actual")]
    pub actual: f64,
    #[serde(rename = "ARIMA_Forecast")]
    pub arima_forecast: f64,
    #[serde(rename = "Prophet_Forecast")]
    pub prophet_forecast: f64,
    #[serde(rename = "SARIMA_Forecast")]
    pub sarima_forecast: Option<f64>,
}
