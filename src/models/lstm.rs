//! Single-layer LSTM regressor over sliding windows of the scaled Close
//! series: LSTM(hidden) into a dense scalar head, trained with Adam on MSE
//! and early stopping on the training loss.
//!
//! Inference is deliberately non-autoregressive: each of the `h` forecast
//! windows is built from known scaled history shifted by one step, never
//! from the model's own predictions.

use super::scaler::MinMaxScaler;
use crate::config::LstmConfig;
use anyhow::{Result, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GATES: usize = 4; // input, forget, cell, output blocks in that order

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// All trainable parameters; also reused as the gradient and Adam-moment
/// accumulator shape.
#[derive(Clone)]
struct Weights {
    hidden: usize,
    /// Input weights, `GATES * hidden` (scalar input).
    wx: Vec<f64>,
    /// Recurrent weights, `GATES * hidden` rows of `hidden`.
    wh: Vec<f64>,
    /// Gate biases, `GATES * hidden`.
    b: Vec<f64>,
    /// Dense head weights, `hidden`.
    wy: Vec<f64>,
    by: f64,
}

impl Weights {
    fn zeros(hidden: usize) -> Self {
        Self {
            hidden,
            wx: vec![0.0; GATES * hidden],
            wh: vec![0.0; GATES * hidden * hidden],
            b: vec![0.0; GATES * hidden],
            wy: vec![0.0; hidden],
            by: 0.0,
        }
    }

    fn glorot(hidden: usize, rng: &mut StdRng) -> Self {
        let mut w = Self::zeros(hidden);
        let limit_x = (6.0 / (1 + hidden) as f64).sqrt();
        let limit_h = (6.0 / (2 * hidden) as f64).sqrt();
        let limit_y = (6.0 / (hidden + 1) as f64).sqrt();
        for v in &mut w.wx {
            *v = rng.gen_range(-limit_x..limit_x);
        }
        for v in &mut w.wh {
            *v = rng.gen_range(-limit_h..limit_h);
        }
        for v in &mut w.wy {
            *v = rng.gen_range(-limit_y..limit_y);
        }
        // Forget gates start open so gradients survive early epochs.
        for v in &mut w.b[hidden..2 * hidden] {
            *v = 1.0;
        }
        w
    }
}

/// Per-timestep activations kept for backprop-through-time.
struct StepCache {
    x: f64,
    h_prev: Vec<f64>,
    c_prev: Vec<f64>,
    gi: Vec<f64>,
    gf: Vec<f64>,
    gg: Vec<f64>,
    go: Vec<f64>,
    tc: Vec<f64>,
}

impl Weights {
    fn forward(&self, xs: &[f64]) -> (f64, Vec<StepCache>) {
        let hl = self.hidden;
        let mut h = vec![0.0; hl];
        let mut c = vec![0.0; hl];
        let mut caches = Vec::with_capacity(xs.len());

        for &x in xs {
            let h_prev = h.clone();
            let c_prev = c.clone();
            let mut gi = vec![0.0; hl];
            let mut gf = vec![0.0; hl];
            let mut gg = vec![0.0; hl];
            let mut go = vec![0.0; hl];
            for j in 0..hl {
                let pre = |u: usize| {
                    self.wx[u] * x + self.b[u] + dot(&self.wh[u * hl..(u + 1) * hl], &h_prev)
                };
                gi[j] = sigmoid(pre(j));
                gf[j] = sigmoid(pre(hl + j));
                gg[j] = pre(2 * hl + j).tanh();
                go[j] = sigmoid(pre(3 * hl + j));
            }
            let mut tc = vec![0.0; hl];
            for j in 0..hl {
                c[j] = gf[j] * c_prev[j] + gi[j] * gg[j];
                tc[j] = c[j].tanh();
                h[j] = go[j] * tc[j];
            }
            caches.push(StepCache {
                x,
                h_prev,
                c_prev,
                gi,
                gf,
                gg,
                go,
                tc,
            });
        }
        (dot(&self.wy, &h) + self.by, caches)
    }

    /// Accumulates parameter gradients for one sequence, given dLoss/dPred.
    fn backward(&self, caches: &[StepCache], d_pred: f64, grads: &mut Weights) {
        let hl = self.hidden;
        let last = caches.last().expect("non-empty sequence");
        let mut dh = vec![0.0; hl];
        for j in 0..hl {
            grads.wy[j] += d_pred * last.go[j] * last.tc[j];
            dh[j] = d_pred * self.wy[j];
        }
        grads.by += d_pred;

        let mut dc = vec![0.0; hl];
        for cache in caches.iter().rev() {
            let mut dpre = vec![0.0; GATES * hl];
            for j in 0..hl {
                let d_out = dh[j] * cache.tc[j];
                let d_tc = dh[j] * cache.go[j];
                let d_c = dc[j] + d_tc * (1.0 - cache.tc[j] * cache.tc[j]);
                let d_in = d_c * cache.gg[j];
                let d_g = d_c * cache.gi[j];
                let d_f = d_c * cache.c_prev[j];
                dc[j] = d_c * cache.gf[j];
                dpre[j] = d_in * cache.gi[j] * (1.0 - cache.gi[j]);
                dpre[hl + j] = d_f * cache.gf[j] * (1.0 - cache.gf[j]);
                dpre[2 * hl + j] = d_g * (1.0 - cache.gg[j] * cache.gg[j]);
                dpre[3 * hl + j] = d_out * cache.go[j] * (1.0 - cache.go[j]);
            }
            for u in 0..GATES * hl {
                grads.wx[u] += dpre[u] * cache.x;
                grads.b[u] += dpre[u];
                let row = &mut grads.wh[u * hl..(u + 1) * hl];
                for (j, slot) in row.iter_mut().enumerate() {
                    *slot += dpre[u] * cache.h_prev[j];
                }
            }
            for (j, slot) in dh.iter_mut().enumerate() {
                *slot = (0..GATES * hl)
                    .map(|u| dpre[u] * self.wh[u * hl + j])
                    .sum();
            }
        }
    }
}

struct Adam {
    m: Weights,
    v: Weights,
    t: i32,
    lr: f64,
}

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

impl Adam {
    fn new(hidden: usize, lr: f64) -> Self {
        Self {
            m: Weights::zeros(hidden),
            v: Weights::zeros(hidden),
            t: 0,
            lr,
        }
    }

    fn step(&mut self, weights: &mut Weights, grads: &Weights) {
        self.t += 1;
        let bc1 = 1.0 - BETA1.powi(self.t);
        let bc2 = 1.0 - BETA2.powi(self.t);
        let lr = self.lr;
        let update = |p: &mut [f64], g: &[f64], m: &mut [f64], v: &mut [f64]| {
            for i in 0..p.len() {
                m[i] = BETA1 * m[i] + (1.0 - BETA1) * g[i];
                v[i] = BETA2 * v[i] + (1.0 - BETA2) * g[i] * g[i];
                p[i] -= lr * (m[i] / bc1) / ((v[i] / bc2).sqrt() + ADAM_EPS);
            }
        };
        update(&mut weights.wx, &grads.wx, &mut self.m.wx, &mut self.v.wx);
        update(&mut weights.wh, &grads.wh, &mut self.m.wh, &mut self.v.wh);
        update(&mut weights.b, &grads.b, &mut self.m.b, &mut self.v.b);
        update(&mut weights.wy, &grads.wy, &mut self.m.wy, &mut self.v.wy);
        self.m.by = BETA1 * self.m.by + (1.0 - BETA1) * grads.by;
        self.v.by = BETA2 * self.v.by + (1.0 - BETA2) * grads.by * grads.by;
        weights.by -= lr * (self.m.by / bc1) / ((self.v.by / bc2).sqrt() + ADAM_EPS);
    }
}

pub struct TrainOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub patience: usize,
    pub learning_rate: f64,
}

pub struct LstmNetwork {
    weights: Weights,
    rng: StdRng,
}

impl LstmNetwork {
    pub fn new(hidden: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            weights: Weights::glorot(hidden, &mut rng),
            rng,
        }
    }

    pub fn predict(&self, window: &[f64]) -> f64 {
        self.weights.forward(window).0
    }

    /// Mini-batch training with per-epoch shuffling and early stopping on
    /// the training loss (best weights restored). Returns the epoch losses.
    pub fn train(&mut self, inputs: &[Vec<f64>], targets: &[f64], opts: &TrainOptions) -> Vec<f64> {
        let n = inputs.len();
        let batch_size = opts.batch_size.max(1);
        let mut adam = Adam::new(self.weights.hidden, opts.learning_rate);
        let mut best_loss = f64::INFINITY;
        let mut best_weights = self.weights.clone();
        let mut stall = 0usize;
        let mut epoch_losses = Vec::with_capacity(opts.epochs);

        for _ in 0..opts.epochs {
            let mut order: Vec<usize> = (0..n).collect();
            for i in (1..n).rev() {
                let j = self.rng.gen_range(0..=i);
                order.swap(i, j);
            }

            let mut epoch_loss = 0.0;
            for batch in order.chunks(batch_size) {
                let mut grads = Weights::zeros(self.weights.hidden);
                for &idx in batch {
                    let (pred, caches) = self.weights.forward(&inputs[idx]);
                    let err = pred - targets[idx];
                    epoch_loss += err * err;
                    self.weights
                        .backward(&caches, 2.0 * err / batch.len() as f64, &mut grads);
                }
                adam.step(&mut self.weights, &grads);
            }
            let epoch_loss = epoch_loss / n as f64;
            epoch_losses.push(epoch_loss);

            if epoch_loss < best_loss - 1e-12 {
                best_loss = epoch_loss;
                best_weights = self.weights.clone();
                stall = 0;
            } else {
                stall += 1;
                if stall >= opts.patience {
                    break;
                }
            }
        }
        self.weights = best_weights;
        epoch_losses
    }
}

/// Fits and forecasts one (ticker, horizon) unit: scale, window, train,
/// roll the known history forward, inverse-transform.
pub fn forecast_series(cfg: &LstmConfig, series: &[f64], horizon: usize) -> Result<Vec<f64>> {
    let steps = cfg.time_steps;
    ensure!(horizon > 0, "horizon must be positive");
    ensure!(
        series.len() > horizon + steps,
        "series has {} rows, need more than {} for a {horizon}-day horizon",
        series.len(),
        horizon + steps
    );
    let train_len = series.len() - horizon;

    let scaler = if cfg.scale_on_train_only {
        MinMaxScaler::fit(&series[..train_len])?
    } else {
        // Default mode: the scaler sees the held-out tail too.
        MinMaxScaler::fit(series)?
    };
    let scaled = scaler.transform(series);

    let mut inputs = Vec::with_capacity(train_len - steps);
    let mut targets = Vec::with_capacity(train_len - steps);
    for t in steps..train_len {
        inputs.push(scaled[t - steps..t].to_vec());
        targets.push(scaled[t]);
    }

    let mut network = LstmNetwork::new(cfg.hidden_units, cfg.seed);
    network.train(
        &inputs,
        &targets,
        &TrainOptions {
            epochs: cfg.epochs,
            batch_size: cfg.batch_size,
            patience: cfg.patience,
            learning_rate: cfg.learning_rate,
        },
    );

    let context = &scaled[scaled.len() - horizon - steps..];
    let predictions: Vec<f64> = (0..horizon)
        .map(|i| network.predict(&context[i..i + steps]))
        .collect();
    Ok(scaler.inverse(&predictions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_cfg() -> LstmConfig {
        LstmConfig {
            time_steps: 5,
            hidden_units: 6,
            epochs: 5,
            batch_size: 8,
            patience: 3,
            learning_rate: 1e-3,
            seed: 7,
            scale_on_train_only: false,
        }
    }

    #[test]
    fn backprop_matches_numerical_gradients() {
        let mut weights = {
            let mut rng = StdRng::seed_from_u64(11);
            Weights::glorot(3, &mut rng)
        };
        let xs = [0.2, 0.7, 0.4, 0.9];
        let target = 0.5;

        let (pred, caches) = weights.forward(&xs);
        let mut grads = Weights::zeros(3);
        weights.backward(&caches, 2.0 * (pred - target), &mut grads);

        let eps = 1e-6;
        let mut check = |analytic: f64, get: &mut dyn FnMut(&mut Weights) -> &mut f64| {
            let orig = *get(&mut weights);
            *get(&mut weights) = orig + eps;
            let (p_hi, _) = weights.forward(&xs);
            *get(&mut weights) = orig - eps;
            let (p_lo, _) = weights.forward(&xs);
            *get(&mut weights) = orig;
            let loss = |p: f64| (p - target) * (p - target);
            let numeric = (loss(p_hi) - loss(p_lo)) / (2.0 * eps);
            assert!(
                (analytic - numeric).abs() < 1e-5 * numeric.abs().max(1.0),
                "analytic {analytic} vs numeric {numeric}"
            );
        };

        check(grads.wx[2], &mut |w: &mut Weights| &mut w.wx[2]);
        check(grads.wx[7], &mut |w: &mut Weights| &mut w.wx[7]);
        check(grads.wh[5], &mut |w: &mut Weights| &mut w.wh[5]);
        check(grads.wh[20], &mut |w: &mut Weights| &mut w.wh[20]);
        check(grads.b[4], &mut |w: &mut Weights| &mut w.b[4]);
        check(grads.wy[1], &mut |w: &mut Weights| &mut w.wy[1]);
        check(grads.by, &mut |w: &mut Weights| &mut w.by);
    }

    #[test]
    fn training_reduces_the_loss() {
        // Noiseless sine pattern, clearly learnable from a 5-step window.
        let series: Vec<f64> = (0..80)
            .map(|i| 0.5 + 0.4 * (i as f64 * 0.4).sin())
            .collect();
        let steps = 5;
        let mut inputs = Vec::new();
        let mut targets = Vec::new();
        for t in steps..series.len() {
            inputs.push(series[t - steps..t].to_vec());
            targets.push(series[t]);
        }
        let mut network = LstmNetwork::new(8, 3);
        let losses = network.train(
            &inputs,
            &targets,
            &TrainOptions {
                epochs: 25,
                batch_size: 8,
                patience: 25,
                learning_rate: 3e-3,
            },
        );
        assert!(losses.len() > 1);
        assert!(
            losses.last().unwrap() < losses.first().unwrap(),
            "losses did not decrease: {losses:?}"
        );
    }

    #[test]
    fn flat_series_forecasts_the_constant_exactly() {
        // Zero scaler range collapses every prediction back onto the level.
        let series = vec![100.0; 60];
        let forecast = forecast_series(&tiny_cfg(), &series, 7).unwrap();
        assert_eq!(forecast.len(), 7);
        assert!(forecast.iter().all(|&v| v == 100.0));
    }

    #[test]
    fn short_series_is_rejected() {
        let series = vec![1.0; 10];
        assert!(forecast_series(&tiny_cfg(), &series, 7).is_err());
    }

    #[test]
    fn corrected_scaler_mode_ignores_the_holdout_tail() {
        let mut cfg = tiny_cfg();
        cfg.scale_on_train_only = true;
        // Train part flat at 100, tail spikes; the corrected scaler's range
        // comes from train only so the forecast still inverts to 100.
        let mut series = vec![100.0; 40];
        series.extend([500.0; 7]);
        let forecast = forecast_series(&cfg, &series, 7).unwrap();
        assert!(forecast.iter().all(|&v| v == 100.0));
    }
}
