//! Prophet-style decomposable forecaster: a linear trend plus weekly and
//! yearly Fourier seasonality, fitted jointly by least squares on the
//! (date, value) pairs and extrapolated over the forecast dates.

use super::least_squares;
use super::{Forecaster, TimeSeries};
use anyhow::{Result, bail, ensure};
use chrono::NaiveDate;
use std::f64::consts::TAU;

const WEEKLY_PERIOD: f64 = 7.0;
const WEEKLY_ORDER: usize = 3;
const YEARLY_PERIOD: f64 = 365.25;
const YEARLY_ORDER: usize = 10;

pub struct Prophet {
    origin: Option<NaiveDate>,
    /// Trend time unit, so the slope feature stays O(1) over long histories.
    time_scale: f64,
    coeffs: Vec<f64>,
}

impl Prophet {
    pub fn new() -> Self {
        Self {
            origin: None,
            time_scale: 1.0,
            coeffs: Vec::new(),
        }
    }

    fn features(&self, date: NaiveDate) -> Vec<f64> {
        let days = (date - self.origin.expect("fitted")).num_days() as f64;
        let mut row = Vec::with_capacity(2 + 2 * (WEEKLY_ORDER + YEARLY_ORDER));
        row.push(1.0);
        row.push(days / self.time_scale);
        for k in 1..=WEEKLY_ORDER {
            let arg = TAU * k as f64 * days / WEEKLY_PERIOD;
            row.push(arg.sin());
            row.push(arg.cos());
        }
        for k in 1..=YEARLY_ORDER {
            let arg = TAU * k as f64 * days / YEARLY_PERIOD;
            row.push(arg.sin());
            row.push(arg.cos());
        }
        row
    }
}

impl Default for Prophet {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for Prophet {
    fn name(&self) -> &'static str {
        "Prophet"
    }

    fn fit(&mut self, train: &TimeSeries) -> Result<()> {
        let feature_count = 2 + 2 * (WEEKLY_ORDER + YEARLY_ORDER);
        ensure!(
            train.len() > feature_count,
            "train series too short for the seasonal fit: {} rows",
            train.len()
        );
        self.origin = Some(train.dates[0]);
        self.time_scale = ((train.dates[train.len() - 1] - train.dates[0]).num_days() as f64)
            .max(1.0);

        let rows: Vec<Vec<f64>> = train.dates.iter().map(|&d| self.features(d)).collect();
        self.coeffs = least_squares::solve(&rows, &train.values)?;
        Ok(())
    }

    fn forecast(&self, future_dates: &[NaiveDate]) -> Result<Vec<f64>> {
        if self.coeffs.is_empty() {
            bail!("Prophet model is not fitted");
        }
        Ok(future_dates
            .iter()
            .map(|&d| least_squares::dot(&self.features(d), &self.coeffs))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::synthetic_series;
    use chrono::Days;

    #[test]
    fn flat_series_forecasts_the_constant() {
        let ts = synthetic_series(vec![100.0; 200]);
        let mut model = Prophet::new();
        model.fit(&ts).unwrap();
        let future: Vec<NaiveDate> = (0..7)
            .map(|i| *ts.dates.last().unwrap() + Days::new(i + 1))
            .collect();
        for value in model.forecast(&future).unwrap() {
            assert!((value - 100.0).abs() < 0.5, "got {value}");
        }
    }

    #[test]
    fn recovers_a_weekly_cycle_on_top_of_a_trend() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let value_at = |days: i64| {
            120.0 + 0.1 * days as f64 + 5.0 * (TAU * days as f64 / 7.0).sin()
        };
        let ts = TimeSeries {
            dates: (0..400).map(|i| start + Days::new(i)).collect(),
            values: (0..400).map(|i| value_at(i as i64)).collect(),
        };
        let mut model = Prophet::new();
        model.fit(&ts).unwrap();

        let future: Vec<NaiveDate> = (400..414).map(|i| start + Days::new(i)).collect();
        let forecast = model.forecast(&future).unwrap();
        for (date, value) in future.iter().zip(&forecast) {
            let days = (*date - start).num_days();
            assert!(
                (value - value_at(days)).abs() < 1.0,
                "{date}: {value} vs {}",
                value_at(days)
            );
        }
    }

    #[test]
    fn forecast_before_fit_is_an_error() {
        let model = Prophet::new();
        assert!(model.forecast(&[]).is_err());
    }
}
