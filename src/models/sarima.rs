//! SARIMA (2,1,2)×(1,1,1,s) with s = 5 (trading week).
//!
//! Estimation is the Hannan–Rissanen two-stage approximation: a long AR fit
//! on the doubly-differenced series supplies residual proxies, then the
//! AR and MA terms (multiplicative lag sets {1, 2, s, s+1, s+2}) are
//! estimated jointly by least squares. Forecasts run recursively with zero
//! future shocks, then both differencings are inverted.

use super::arima::difference;
use super::least_squares;
use super::{Forecaster, TimeSeries};
use anyhow::{Result, bail, ensure};
use chrono::NaiveDate;

const SEASONAL_PERIOD: usize = 5;
const LONG_AR_ORDER: usize = 12;
/// Lags of the expanded (1 - φ₁B - φ₂B²)(1 - ΦBˢ) style polynomials.
const LAGS: [usize; 5] = [1, 2, SEASONAL_PERIOD, SEASONAL_PERIOD + 1, SEASONAL_PERIOD + 2];

pub struct Sarima {
    /// [intercept, ar over LAGS.., ma over LAGS..].
    coeffs: Vec<f64>,
    /// Doubly-differenced history tail, most recent last.
    w_tail: Vec<f64>,
    /// Residual-proxy tail aligned with `w_tail`.
    e_tail: Vec<f64>,
    /// Last value of the seasonally-differenced series.
    seasonal_last: f64,
    /// Last `s` original values, for the seasonal re-integration.
    y_tail: Vec<f64>,
}

impl Sarima {
    pub fn new() -> Self {
        Self {
            coeffs: Vec::new(),
            w_tail: Vec::new(),
            e_tail: Vec::new(),
            seasonal_last: 0.0,
            y_tail: Vec::new(),
        }
    }
}

impl Default for Sarima {
    fn default() -> Self {
        Self::new()
    }
}

fn seasonal_difference(values: &[f64], period: usize) -> Vec<f64> {
    (period..values.len())
        .map(|t| values[t] - values[t - period])
        .collect()
}

impl Forecaster for Sarima {
    fn name(&self) -> &'static str {
        "SARIMA"
    }

    fn fit(&mut self, train: &TimeSeries) -> Result<()> {
        let max_lag = LAGS[LAGS.len() - 1];
        let min_rows = SEASONAL_PERIOD + 1 + LONG_AR_ORDER + max_lag + 20;
        ensure!(
            train.len() >= min_rows,
            "train series too short for SARIMA: {} rows, need {min_rows}",
            train.len()
        );

        let y = &train.values;
        let seasonal = seasonal_difference(y, SEASONAL_PERIOD);
        let w = difference(&seasonal);

        // Stage one: long AR for residual proxies.
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for t in LONG_AR_ORDER..w.len() {
            let mut row = Vec::with_capacity(LONG_AR_ORDER + 1);
            row.push(1.0);
            for lag in 1..=LONG_AR_ORDER {
                row.push(w[t - lag]);
            }
            rows.push(row);
            targets.push(w[t]);
        }
        let long_ar = least_squares::solve(&rows, &targets)?;
        let mut residuals = vec![0.0; w.len()];
        for (idx, t) in (LONG_AR_ORDER..w.len()).enumerate() {
            residuals[t] = targets[idx] - least_squares::dot(&rows[idx], &long_ar);
        }

        // Stage two: joint AR + MA least squares on the lag sets.
        let start = LONG_AR_ORDER + max_lag;
        ensure!(w.len() > start + LAGS.len() * 2, "not enough differenced rows");
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for t in start..w.len() {
            let mut row = Vec::with_capacity(1 + 2 * LAGS.len());
            row.push(1.0);
            for &lag in &LAGS {
                row.push(w[t - lag]);
            }
            for &lag in &LAGS {
                row.push(residuals[t - lag]);
            }
            rows.push(row);
            targets.push(w[t]);
        }
        self.coeffs = least_squares::solve(&rows, &targets)?;

        self.w_tail = w[w.len() - max_lag..].to_vec();
        self.e_tail = residuals[residuals.len() - max_lag..].to_vec();
        self.seasonal_last = *seasonal.last().unwrap();
        self.y_tail = y[y.len() - SEASONAL_PERIOD..].to_vec();
        Ok(())
    }

    fn forecast(&self, future_dates: &[NaiveDate]) -> Result<Vec<f64>> {
        if self.coeffs.is_empty() {
            bail!("SARIMA model is not fitted");
        }
        let mut w_tail = self.w_tail.clone();
        let mut e_tail = self.e_tail.clone();
        let mut seasonal_last = self.seasonal_last;
        let mut y_hist = self.y_tail.clone();
        let mut out = Vec::with_capacity(future_dates.len());

        for _ in future_dates {
            let mut w_hat = self.coeffs[0];
            for (i, &lag) in LAGS.iter().enumerate() {
                w_hat += self.coeffs[1 + i] * w_tail[w_tail.len() - lag];
                w_hat += self.coeffs[1 + LAGS.len() + i] * e_tail[e_tail.len() - lag];
            }
            w_tail.push(w_hat);
            w_tail.remove(0);
            // Future shocks are their expectation, zero.
            e_tail.push(0.0);
            e_tail.remove(0);

            let seasonal_hat = seasonal_last + w_hat;
            seasonal_last = seasonal_hat;
            let y_hat = y_hist[y_hist.len() - SEASONAL_PERIOD] + seasonal_hat;
            y_hist.push(y_hat);
            out.push(y_hat);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::synthetic_series;

    #[test]
    fn flat_series_forecasts_the_constant() {
        let ts = synthetic_series(vec![100.0; 250]);
        let mut model = Sarima::new();
        model.fit(&ts).unwrap();
        let dates = &ts.dates[..30];
        for value in model.forecast(dates).unwrap() {
            assert!((value - 100.0).abs() < 1e-3, "got {value}");
        }
    }

    #[test]
    fn linear_trend_stays_on_the_line() {
        let ts = synthetic_series((0..300).map(|i| 10.0 + 2.0 * i as f64).collect());
        let mut model = Sarima::new();
        model.fit(&ts).unwrap();
        let dates = &ts.dates[..10];
        let forecast = model.forecast(dates).unwrap();
        let last = 10.0 + 2.0 * 299.0;
        for (step, value) in forecast.iter().enumerate() {
            let expected = last + 2.0 * (step as f64 + 1.0);
            assert!(
                (value - expected).abs() < 0.5,
                "step {step}: {value} vs {expected}"
            );
        }
    }

    #[test]
    fn seasonal_difference_removes_a_weekly_pattern() {
        let pattern = [1.0, 2.0, 3.0, 4.0, 5.0];
        let values: Vec<f64> = (0..30).map(|i| pattern[i % 5]).collect();
        let diffed = seasonal_difference(&values, 5);
        assert_eq!(diffed.len(), 25);
        assert!(diffed.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn forecast_before_fit_is_an_error() {
        let model = Sarima::new();
        assert!(model.forecast(&[]).is_err());
    }
}
