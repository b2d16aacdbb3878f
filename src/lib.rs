//! Batch pipeline over daily stock prices: ingestion, technical indicators,
//! ARIMA/Prophet/SARIMA/LSTM forecasts per (ticker, horizon), a result
//! merger, and an interactive terminal dashboard over the CSV artifacts.

pub mod config;
pub mod dashboard;
pub mod download;
pub mod forecast;
pub mod indicators;
pub mod merge;
pub mod models;
pub mod plot;
pub mod storage;
pub mod types;
