//! Min-max scaling of a price series onto [0, 1].

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            bail!("cannot fit a scaler on an empty series");
        }
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            bail!("series contains non-finite values");
        }
        Ok(Self { min, max })
    }

    /// A zero-range series maps to the midpoint; the inverse still recovers
    /// the original constant.
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        let range = self.max - self.min;
        if range == 0.0 {
            return vec![0.5; values.len()];
        }
        values.iter().map(|v| (v - self.min) / range).collect()
    }

    pub fn inverse(&self, values: &[f64]) -> Vec<f64> {
        let range = self.max - self.min;
        values.iter().map(|v| v * range + self.min).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_onto_the_unit_interval() {
        let values = [10.0, 15.0, 20.0];
        let scaler = MinMaxScaler::fit(&values).unwrap();
        let scaled = scaler.transform(&values);
        assert_eq!(scaled, vec![0.0, 0.5, 1.0]);
        let back = scaler.inverse(&scaled);
        for (a, b) in values.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_series_survives_the_round_trip() {
        let values = [100.0; 5];
        let scaler = MinMaxScaler::fit(&values).unwrap();
        let scaled = scaler.transform(&values);
        assert!(scaled.iter().all(|&v| v == 0.5));
        assert!(scaler.inverse(&scaled).iter().all(|&v| v == 100.0));
    }

    #[test]
    fn values_outside_the_fit_range_extrapolate() {
        let scaler = MinMaxScaler::fit(&[0.0, 10.0]).unwrap();
        assert_eq!(scaler.transform(&[20.0]), vec![2.0]);
        assert_eq!(scaler.inverse(&[-0.5]), vec![-5.0]);
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(MinMaxScaler::fit(&[]).is_err());
    }
}
