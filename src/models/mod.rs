//! Forecasting models and the plumbing every model stage shares: series
//! preparation, the train/test split, fit metrics and the per-unit run
//! report.

pub mod arima;
pub mod least_squares;
pub mod lstm;
pub mod prophet;
pub mod sarima;
pub mod scaler;

use crate::storage::{FEATURES_FILE, StorageManager};
use crate::types::IndicatorRow;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use comfy_table::{
    Attribute, Cell, CellAlignment, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};
use tracing::{error, info};

/// A date-ordered univariate series (one ticker's Close history).
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Last `horizon` rows become the test tail, everything before is train.
    /// Never randomized; train immediately precedes test.
    pub fn split_train_test(&self, horizon: usize) -> Result<(TimeSeries, TimeSeries)> {
        if horizon == 0 {
            bail!("horizon must be positive");
        }
        if self.len() <= horizon {
            bail!(
                "series has {} rows, not enough for a {horizon}-day holdout",
                self.len()
            );
        }
        let cut = self.len() - horizon;
        let train = TimeSeries {
            dates: self.dates[..cut].to_vec(),
            values: self.values[..cut].to_vec(),
        };
        let test = TimeSeries {
            dates: self.dates[cut..].to_vec(),
            values: self.values[cut..].to_vec(),
        };
        Ok((train, test))
    }
}

/// The seam all statistical models sit behind: fit on the train series, then
/// produce one value per future date. Fitting never peeks past the train
/// tail, and forecasting never re-fits (no walk-forward).
pub trait Forecaster {
    fn name(&self) -> &'static str;
    fn fit(&mut self, train: &TimeSeries) -> Result<()>;
    fn forecast(&self, future_dates: &[NaiveDate]) -> Result<Vec<f64>>;
}

/// Holdout-tail error metrics for one fitted model.
#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub mape: f64,
}

impl Metrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let n = actual.len().min(predicted.len()).max(1) as f64;
        let mut abs_sum = 0.0;
        let mut sq_sum = 0.0;
        let mut pct_sum = 0.0;
        let mut pct_n = 0usize;
        for (a, p) in actual.iter().zip(predicted) {
            let err = a - p;
            abs_sum += err.abs();
            sq_sum += err * err;
            if a.abs() > f64::EPSILON {
                pct_sum += (err / a).abs();
                pct_n += 1;
            }
        }
        Self {
            mae: abs_sum / n,
            rmse: (sq_sum / n).sqrt(),
            mape: if pct_n > 0 {
                100.0 * pct_sum / pct_n as f64
            } else {
                f64::NAN
            },
        }
    }
}

#[derive(Debug)]
pub struct ModelScore {
    pub model: &'static str,
    pub metrics: Metrics,
}

/// What happened to one (ticker, horizon) unit of work.
#[derive(Debug)]
pub struct UnitOutcome {
    pub ticker: String,
    pub horizon: usize,
    pub outcome: Result<Vec<ModelScore>, String>,
}

/// Aggregated per-stage report, replacing silent per-unit exception
/// swallowing with an explicit success/failure table.
#[derive(Debug)]
pub struct RunReport {
    pub stage: &'static str,
    pub units: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            units: Vec::new(),
        }
    }

    pub fn record(&mut self, ticker: &str, horizon: usize, outcome: Result<Vec<ModelScore>>) {
        match &outcome {
            Ok(_) => info!("{}: {ticker} {horizon}d done", self.stage),
            Err(e) => error!("{}: {ticker} {horizon}d failed: {e:#}", self.stage),
        }
        self.units.push(UnitOutcome {
            ticker: ticker.to_string(),
            horizon,
            outcome: outcome.map_err(|e| format!("{e:#}")),
        });
    }

    pub fn failed(&self) -> usize {
        self.units.iter().filter(|u| u.outcome.is_err()).count()
    }

    /// Renders the report table to stdout.
    pub fn print(&self) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Ticker").add_attribute(Attribute::Bold),
                Cell::new("Horizon").add_attribute(Attribute::Bold),
                Cell::new("Model").add_attribute(Attribute::Bold),
                Cell::new("MAE")
                    .add_attribute(Attribute::Bold)
                    .set_alignment(CellAlignment::Right),
                Cell::new("RMSE")
                    .add_attribute(Attribute::Bold)
                    .set_alignment(CellAlignment::Right),
                Cell::new("MAPE %")
                    .add_attribute(Attribute::Bold)
                    .set_alignment(CellAlignment::Right),
                Cell::new("Status").add_attribute(Attribute::Bold),
            ]);
        for unit in &self.units {
            match &unit.outcome {
                Ok(scores) => {
                    for score in scores {
                        table.add_row(vec![
                            Cell::new(&unit.ticker),
                            Cell::new(format!("{}d", unit.horizon)),
                            Cell::new(score.model),
                            Cell::new(format!("{:.3}", score.metrics.mae))
                                .set_alignment(CellAlignment::Right),
                            Cell::new(format!("{:.3}", score.metrics.rmse))
                                .set_alignment(CellAlignment::Right),
                            Cell::new(format!("{:.2}", score.metrics.mape))
                                .set_alignment(CellAlignment::Right),
                            Cell::new("ok").fg(comfy_table::Color::Green),
                        ]);
                    }
                }
                Err(reason) => {
                    table.add_row(vec![
                        Cell::new(&unit.ticker),
                        Cell::new(format!("{}d", unit.horizon)),
                        Cell::new("-"),
                        Cell::new("-").set_alignment(CellAlignment::Right),
                        Cell::new("-").set_alignment(CellAlignment::Right),
                        Cell::new("-").set_alignment(CellAlignment::Right),
                        Cell::new(format!("failed: {reason}")).fg(comfy_table::Color::Red),
                    ]);
                }
            }
        }
        println!("\n{} run report\n{table}", self.stage);
        info!(
            "{}: {} units, {} failed",
            self.stage,
            self.units.len(),
            self.failed()
        );
    }
}

/// Loads the enriched features CSV and returns each ticker's Close series,
/// first-appearance ticker order, dates ascending. The shared preparation
/// step all three model stages start from.
pub async fn load_close_series(storage: &StorageManager) -> Result<Vec<(String, TimeSeries)>> {
    let rows: Vec<IndicatorRow> = storage.load_csv(FEATURES_FILE).await?;
    if rows.is_empty() {
        bail!("{FEATURES_FILE} is empty; run the features stage first");
    }
    let mut series: Vec<(String, TimeSeries)> = Vec::new();
    for row in &rows {
        match series.iter_mut().find(|(t, _)| *t == row.ticker) {
            Some((_, ts)) => {
                ts.dates.push(row.date);
                ts.values.push(row.close);
            }
            None => series.push((
                row.ticker.clone(),
                TimeSeries {
                    dates: vec![row.date],
                    values: vec![row.close],
                },
            )),
        }
    }
    for (_, ts) in &mut series {
        let mut idx: Vec<usize> = (0..ts.len()).collect();
        idx.sort_by_key(|&i| ts.dates[i]);
        ts.dates = idx.iter().map(|&i| ts.dates[i]).collect();
        ts.values = idx.iter().map(|&i| ts.values[i]).collect();
    }
    Ok(series)
}

#[cfg(test)]
pub(crate) fn synthetic_series(values: Vec<f64>) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    TimeSeries {
        dates: (0..values.len())
            .map(|i| start + chrono::Days::new(i as u64))
            .collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_test_length_and_contiguity() {
        let ts = synthetic_series((0..100).map(|v| v as f64).collect());
        for horizon in [7usize, 30, 90] {
            let (train, test) = ts.split_train_test(horizon).unwrap();
            assert_eq!(test.len(), horizon);
            assert_eq!(train.len() + test.len(), ts.len());
            // Train tail and test head are adjacent rows of the original.
            assert_eq!(train.values.last(), Some(&ts.values[ts.len() - horizon - 1]));
            assert_eq!(test.values[0], ts.values[ts.len() - horizon]);
            assert!(train.dates.last().unwrap() < &test.dates[0]);
        }
    }

    #[test]
    fn split_rejects_short_series() {
        let ts = synthetic_series(vec![1.0; 7]);
        assert!(ts.split_train_test(7).is_err());
        assert!(ts.split_train_test(0).is_err());
    }

    #[test]
    fn metrics_on_perfect_forecast_are_zero() {
        let actual = [10.0, 11.0, 12.0];
        let m = Metrics::compute(&actual, &actual);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mape, 0.0);
    }

    #[test]
    fn metrics_capture_constant_offset() {
        let actual = [10.0, 10.0, 10.0, 10.0];
        let predicted = [12.0, 12.0, 12.0, 12.0];
        let m = Metrics::compute(&actual, &predicted);
        assert!((m.mae - 2.0).abs() < 1e-12);
        assert!((m.rmse - 2.0).abs() < 1e-12);
        assert!((m.mape - 20.0).abs() < 1e-12);
    }

    #[test]
    fn report_counts_failures() {
        let mut report = RunReport::new("test");
        report.record("AAPL", 7, Ok(vec![]));
        report.record("MSFT", 7, Err(anyhow::anyhow!("boom")));
        assert_eq!(report.failed(), 1);
        assert_eq!(report.units.len(), 2);
    }
}
