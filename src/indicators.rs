//! Technical-indicator engine.
//!
//! Every derived value at row `i` depends only on rows `<= i` of the same
//! ticker's Close series. Windowed indicators (SMA, rolling std, RSI) are
//! undefined until their window fills; exponentially-smoothed ones run from
//! the first row, seeded with the first Close and no bias adjustment.

use crate::storage::{ALL_PRICES_FILE, FEATURES_FILE, StorageManager};
use crate::types::{IndicatorRow, PriceRow};
use anyhow::{Result, bail};
use ta::Next;
use ta::indicators::ExponentialMovingAverage;
use tracing::info;

pub const SMA_SHORT: usize = 20;
pub const SMA_LONG: usize = 50;
pub const EMA_SPAN: usize = 20;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL_SPAN: usize = 9;
pub const BB_WINDOW: usize = 20;
pub const BB_WIDTH: f64 = 2.0;

/// Trailing arithmetic mean; `None` for the first `window - 1` rows.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    let mut sum: f64 = values[..window].iter().sum();
    out[window - 1] = Some(sum / window as f64);
    for i in window..values.len() {
        sum += values[i] - values[i - window];
        out[i] = Some(sum / window as f64);
    }
    out
}

/// Trailing sample standard deviation (ddof = 1), `None` during warm-up.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window < 2 || values.len() < window {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
        out[i] = Some(var.sqrt());
    }
    out
}

/// Span-smoothed EMA over the whole series, defined from row 0.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let mut indicator = ExponentialMovingAverage::new(span).expect("EMA span must be positive");
    values.iter().map(|&v| indicator.next(v)).collect()
}

/// RSI from trailing means of positive and negative one-day deltas.
///
/// A window with no losses but some gains is pinned to 100; a fully flat
/// window (no gains either) has no defined strength and stays `None`.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }
    let mut gains = vec![0.0; values.len()];
    let mut losses = vec![0.0; values.len()];
    for i in 1..values.len() {
        let delta = values[i] - values[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else {
            losses[i] = -delta;
        }
    }
    for i in period..values.len() {
        let window = i + 1 - period..=i;
        let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window].iter().sum::<f64>() / period as f64;
        out[i] = if avg_loss > 0.0 {
            let rs = avg_gain / avg_loss;
            Some(100.0 - 100.0 / (1.0 + rs))
        } else if avg_gain > 0.0 {
            Some(100.0)
        } else {
            None
        };
    }
    out
}

/// Computes the full indicator set for one ticker's date-ordered price rows.
pub fn enrich(rows: &[PriceRow]) -> Vec<IndicatorRow> {
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();

    let sma_20 = rolling_mean(&closes, SMA_SHORT);
    let sma_50 = rolling_mean(&closes, SMA_LONG);
    let ema_20 = ema(&closes, EMA_SPAN);
    let rsi_14 = rsi(&closes, RSI_PERIOD);

    let ema_fast = ema(&closes, MACD_FAST);
    let ema_slow = ema(&closes, MACD_SLOW);
    let macd: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(fast, slow)| fast - slow)
        .collect();
    let macd_signal = ema(&macd, MACD_SIGNAL_SPAN);

    let bb_middle = rolling_mean(&closes, BB_WINDOW);
    let bb_std = rolling_std(&closes, BB_WINDOW);

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let (bb_upper, bb_lower) = match (bb_middle[i], bb_std[i]) {
                (Some(mid), Some(std)) => (Some(mid + BB_WIDTH * std), Some(mid - BB_WIDTH * std)),
                _ => (None, None),
            };
            IndicatorRow {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                ticker: row.ticker.clone(),
                sma_20: sma_20[i],
                sma_50: sma_50[i],
                ema_20: ema_20[i],
                rsi_14: rsi_14[i],
                macd: macd[i],
                macd_signal: macd_signal[i],
                bb_middle: bb_middle[i],
                bb_std: bb_std[i],
                bb_upper,
                bb_lower,
                volatility_20: bb_std[i],
            }
        })
        .collect()
}

/// Groups rows per ticker preserving first-appearance order, each group
/// sorted by date.
pub fn group_by_ticker(rows: Vec<PriceRow>) -> Vec<(String, Vec<PriceRow>)> {
    let mut groups: Vec<(String, Vec<PriceRow>)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(ticker, _)| *ticker == row.ticker) {
            Some((_, group)) => group.push(row),
            None => groups.push((row.ticker.clone(), vec![row])),
        }
    }
    for (_, group) in &mut groups {
        group.sort_by_key(|r| r.date);
    }
    groups
}

/// Feature-engineering stage: combined prices in, enriched CSV out.
pub async fn run(storage: &StorageManager) -> Result<()> {
    let rows: Vec<PriceRow> = storage.load_csv(ALL_PRICES_FILE).await?;
    if rows.is_empty() {
        bail!("{ALL_PRICES_FILE} is empty; run the download stage first");
    }

    let mut enriched: Vec<IndicatorRow> = Vec::with_capacity(rows.len());
    for (ticker, group) in group_by_ticker(rows) {
        info!("computing indicators for {ticker} ({} rows)", group.len());
        enriched.extend(enrich(&group));
    }

    storage.save_csv(FEATURES_FILE, &enriched).await?;
    info!(
        "feature engineering complete, enhanced dataset saved as {}",
        storage.path(FEATURES_FILE).display()
    );
    Ok(())
}
