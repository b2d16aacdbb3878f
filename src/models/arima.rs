//! ARIMA(p, d, 0): difference `d` times, fit an AR(p) by least squares,
//! forecast recursively, re-integrate. The pipeline uses (5, 1, 0) and never
//! re-fits inside the forecast window.

use super::least_squares;
use super::{Forecaster, TimeSeries};
use anyhow::{Result, bail, ensure};
use chrono::NaiveDate;

pub struct Arima {
    p: usize,
    d: usize,
    /// [intercept, phi_1, .., phi_p] once fitted.
    coeffs: Vec<f64>,
    /// Last `p` values of the differenced series, most recent last.
    tail: Vec<f64>,
    /// Last value of each differencing level, for re-integration.
    level_lasts: Vec<f64>,
}

impl Arima {
    pub fn new(p: usize, d: usize) -> Self {
        Self {
            p,
            d,
            coeffs: Vec::new(),
            tail: Vec::new(),
            level_lasts: Vec::new(),
        }
    }

    fn predict_next(&self, tail: &[f64]) -> f64 {
        let mut value = self.coeffs[0];
        for (i, phi) in self.coeffs[1..].iter().enumerate() {
            value += phi * tail[tail.len() - 1 - i];
        }
        value
    }
}

pub fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

impl Forecaster for Arima {
    fn name(&self) -> &'static str {
        "ARIMA"
    }

    fn fit(&mut self, train: &TimeSeries) -> Result<()> {
        ensure!(
            train.len() > self.d + 2 * self.p + 1,
            "train series too short for ARIMA({},{},0): {} rows",
            self.p,
            self.d,
            train.len()
        );

        let mut z = train.values.clone();
        self.level_lasts.clear();
        for _ in 0..self.d {
            self.level_lasts.push(*z.last().unwrap());
            z = difference(&z);
        }

        let mut rows = Vec::with_capacity(z.len() - self.p);
        let mut targets = Vec::with_capacity(z.len() - self.p);
        for t in self.p..z.len() {
            let mut row = Vec::with_capacity(self.p + 1);
            row.push(1.0);
            for lag in 1..=self.p {
                row.push(z[t - lag]);
            }
            rows.push(row);
            targets.push(z[t]);
        }
        self.coeffs = least_squares::solve(&rows, &targets)?;
        self.tail = z[z.len() - self.p..].to_vec();
        Ok(())
    }

    fn forecast(&self, future_dates: &[NaiveDate]) -> Result<Vec<f64>> {
        if self.coeffs.is_empty() {
            bail!("ARIMA model is not fitted");
        }
        let mut tail = self.tail.clone();
        let mut level_lasts = self.level_lasts.clone();
        let mut out = Vec::with_capacity(future_dates.len());
        for _ in future_dates {
            let mut value = self.predict_next(&tail);
            tail.push(value);
            tail.remove(0);
            // Undo each differencing level, innermost first.
            for last in level_lasts.iter_mut().rev() {
                value += *last;
                *last = value;
            }
            out.push(value);
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
        let ts = synthetic_series(vec![100.0; 200]);
        let mut model = Arima::new(5, 1);
        model.fit(&ts).unwrap();
        let dates = &ts.dates[..7];
        for value in model.forecast(dates).unwrap() {
            assert!((value - 100.0).abs() < 1e-3, "got {value}");
        }
    }

    #[test]
    fn linear_trend_is_continued() {
        let ts = synthetic_series((0..300).map(|i| 50.0 + 0.5 * i as f64).collect());
        let mut model = Arima::new(5, 1);
        model.fit(&ts).unwrap();
        let dates = &ts.dates[..10];
        let forecast = model.forecast(dates).unwrap();
        let last = 50.0 + 0.5 * 299.0;
        for (step, value) in forecast.iter().enumerate() {
            let expected = last + 0.5 * (step as f64 + 1.0);
            assert!(
                (value - expected).abs() < 0.05,
                "step {step}: {value} vs {expected}"
            );
        }
    }

    #[test]
    fn forecast_before_fit_is_an_error() {
        let model = Arima::new(5, 1);
        assert!(model.forecast(&[]).is_err());
    }

    #[test]
    fn difference_shrinks_by_one() {
        assert_eq!(difference(&[1.0, 4.0, 9.0]), vec![3.0, 5.0]);
    }
}
