//! Ingestion stage: daily OHLCV history per ticker from the Yahoo Finance
//! chart endpoint, persisted as one CSV per ticker plus the combined
//! all-tickers CSV, with a console EDA summary and two overview plots.

use crate::config::DownloadConfig;
use crate::plot;
use crate::storage::{
    ALL_PRICES_FILE, CLOSING_PRICES_PLOT, CORRELATION_PLOT, StorageManager, ticker_prices_file,
};
use crate::types::PriceRow;
use anyhow::{Result, bail};
use chrono::NaiveDate;
use comfy_table::{
    Attribute, Cell, CellAlignment, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartPayload,
}

#[derive(Deserialize)]
struct ChartPayload {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

/// The endpoint pads holidays with nulls, so every field is `Option`.
#[derive(Deserialize, Default)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
}

/// Fetches one ticker's daily bars; `None` on any failure so the batch can
/// keep going.
async fn fetch_ticker(
    client: &Client,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<Vec<PriceRow>> {
    let url = format!("{CHART_URL}/{ticker}");
    let query = [
        ("period1", epoch_seconds(start).to_string()),
        ("period2", epoch_seconds(end).to_string()),
        ("interval", "1d".to_string()),
        ("events", "div,split".to_string()),
    ];

    let response = match client.get(&url).query(&query).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("{ticker}: request failed: {e}");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!("{ticker}: HTTP {}", response.status());
        return None;
    }
    let envelope: ChartEnvelope = match response.json().await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("{ticker}: bad chart payload: {e}");
            return None;
        }
    };
    if let Some(error) = envelope.chart.error {
        warn!("{ticker}: chart error: {error}");
        return None;
    }

    let result = envelope.chart.result?.into_iter().next()?;
    let quote = result.indicators.quote.into_iter().next()?;
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|mut a| a.pop())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let mut rows = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)?.date_naive();
        let (open, high, low, close) = match (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
        ) {
            (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
            // Holiday padding row, drop it.
            _ => continue,
        };
        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);

        // Adjust OHLC onto the dividend/split-adjusted close scale.
        let (open, high, low, close) = match adjclose.get(i).copied().flatten() {
            Some(adj) if close != 0.0 => {
                let factor = adj / close;
                (open * factor, high * factor, low * factor, adj)
            }
            _ => (open, high, low, close),
        };

        rows.push(PriceRow {
            date,
            open,
            high,
            low,
            close,
            volume,
            ticker: ticker.to_string(),
        });
    }
    rows.sort_by_key(|r| r.date);
    if rows.is_empty() {
        warn!("{ticker}: no usable rows in range");
        return None;
    }
    Some(rows)
}

/// Download stage entry point.
pub async fn run(config: &DownloadConfig, storage: &StorageManager) -> Result<()> {
    info!(
        "downloading {} tickers, {} to {}",
        config.tickers.len(),
        config.start,
        config.end
    );
    let client = Client::builder()
        .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
        .pool_max_idle_per_host(10)
        .build()?;

    let tasks: Vec<_> = config
        .tickers
        .iter()
        .map(|ticker| fetch_ticker(&client, ticker, config.start, config.end))
        .collect();
    let results = futures::future::join_all(tasks).await;

    let mut combined: Vec<PriceRow> = Vec::new();
    for (ticker, rows) in config.tickers.iter().zip(results) {
        match rows {
            Some(rows) => {
                info!("{ticker}: {} rows", rows.len());
                storage.save_csv(&ticker_prices_file(ticker), &rows).await?;
                combined.extend(rows);
            }
            None => warn!("{ticker}: skipped"),
        }
    }
    if combined.is_empty() {
        bail!("no price data was downloaded");
    }

    storage.save_csv(ALL_PRICES_FILE, &combined).await?;
    info!(
        "combined all stocks into {}",
        storage.path(ALL_PRICES_FILE).display()
    );

    print_eda_summary(&combined);
    render_overview_plots(&combined, storage)?;
    Ok(())
}

struct TickerStats {
    ticker: String,
    rows: usize,
    first: NaiveDate,
    last: NaiveDate,
    mean_close: f64,
    min_close: f64,
    max_close: f64,
}

fn ticker_stats(rows: &[PriceRow]) -> Vec<TickerStats> {
    let mut stats: Vec<TickerStats> = Vec::new();
    for row in rows {
        match stats.iter_mut().find(|s| s.ticker == row.ticker) {
            Some(s) => {
                s.rows += 1;
                s.first = s.first.min(row.date);
                s.last = s.last.max(row.date);
                s.mean_close += row.close;
                s.min_close = s.min_close.min(row.close);
                s.max_close = s.max_close.max(row.close);
            }
            None => stats.push(TickerStats {
                ticker: row.ticker.clone(),
                rows: 1,
                first: row.date,
                last: row.date,
                mean_close: row.close,
                min_close: row.close,
                max_close: row.close,
            }),
        }
    }
    for s in &mut stats {
        s.mean_close /= s.rows as f64;
    }
    stats
}

/// Console stand-in for the exploratory describe/value_counts pass.
fn print_eda_summary(rows: &[PriceRow]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Ticker").add_attribute(Attribute::Bold),
            Cell::new("Rows").add_attribute(Attribute::Bold),
            Cell::new("First").add_attribute(Attribute::Bold),
            Cell::new("Last").add_attribute(Attribute::Bold),
            Cell::new("Mean Close")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Min Close")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
            Cell::new("Max Close")
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        ]);
    for s in ticker_stats(rows) {
        table.add_row(vec![
            Cell::new(&s.ticker),
            Cell::new(s.rows),
            Cell::new(s.first),
            Cell::new(s.last),
            Cell::new(format!("{:.2}", s.mean_close)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", s.min_close)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", s.max_close)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("\n{table}");
}

fn render_overview_plots(rows: &[PriceRow], storage: &StorageManager) -> Result<()> {
    let mut per_ticker: Vec<(String, Vec<(NaiveDate, f64)>)> = Vec::new();
    for row in rows {
        match per_ticker.iter_mut().find(|(t, _)| *t == row.ticker) {
            Some((_, points)) => points.push((row.date, row.close)),
            None => per_ticker.push((row.ticker.clone(), vec![(row.date, row.close)])),
        }
    }
    for (_, points) in &mut per_ticker {
        points.sort_by_key(|(d, _)| *d);
    }

    plot::closing_prices_plot(&storage.path(CLOSING_PRICES_PLOT), &per_ticker)?;
    info!("saved {}", storage.path(CLOSING_PRICES_PLOT).display());

    let tickers: Vec<String> = per_ticker.iter().map(|(t, _)| t.clone()).collect();
    let matrix = correlation_matrix(&per_ticker);
    plot::correlation_heatmap(&storage.path(CORRELATION_PLOT), &tickers, &matrix)?;
    info!("saved {}", storage.path(CORRELATION_PLOT).display());
    Ok(())
}

/// Pearson correlation over the dates each pair has in common.
fn correlation_matrix(per_ticker: &[(String, Vec<(NaiveDate, f64)>)]) -> Vec<Vec<f64>> {
    let maps: Vec<HashMap<NaiveDate, f64>> = per_ticker
        .iter()
        .map(|(_, points)| points.iter().copied().collect())
        .collect();
    let n = maps.len();
    let mut matrix = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in 0..n {
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for (date, &x) in &maps[i] {
                if let Some(&y) = maps[j].get(date) {
                    xs.push(x);
                    ys.push(y);
                }
            }
            matrix[j][i] = pearson(&xs, &ys).unwrap_or(f64::NAN);
        }
    }
    matrix
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 {
        return None;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_on_identical_series_is_one() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&xs, &xs).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_on_opposed_series_is_minus_one() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&xs, &ys).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_rejects_flat_or_short_input() {
        assert!(pearson(&[1.0], &[1.0]).is_none());
        assert!(pearson(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]).is_none());
    }

    #[test]
    fn stats_aggregate_per_ticker() {
        let d = |day| NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let row = |ticker: &str, day, close| PriceRow {
            date: d(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
            ticker: ticker.to_string(),
        };
        let stats = ticker_stats(&[
            row("A", 1, 10.0),
            row("A", 2, 20.0),
            row("B", 1, 5.0),
        ]);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].rows, 2);
        assert_eq!(stats[0].mean_close, 15.0);
        assert_eq!(stats[0].last, d(2));
        assert_eq!(stats[1].ticker, "B");
    }
}
