//! Interactive terminal dashboard over the pipeline artifacts.
//!
//! Pure presentation: it reads the enriched features CSV and the merged
//! per-horizon result CSVs, renders charts and summary metrics, and computes
//! nothing beyond the last-versus-previous trend sign. Its only write is the
//! user-initiated CSV export.

pub mod ui;

use crate::config::AppConfig;
use crate::storage::{FEATURES_FILE, MODEL_OUTPUT_DIR, StorageManager, export_file, results_file};
use crate::types::{IndicatorRow, MergedRow};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::io;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Indicators,
    Forecasts,
    Summary,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Indicators, Page::Forecasts, Page::Summary];

    pub fn title(self) -> &'static str {
        match self {
            Page::Indicators => "EDA & Indicators",
            Page::Forecasts => "Forecasting",
            Page::Summary => "Summary & Insights",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum IndicatorChart {
    PriceMa,
    Rsi,
    Macd,
    Bollinger,
    Volatility,
}

impl IndicatorChart {
    pub const ALL: [IndicatorChart; 5] = [
        IndicatorChart::PriceMa,
        IndicatorChart::Rsi,
        IndicatorChart::Macd,
        IndicatorChart::Bollinger,
        IndicatorChart::Volatility,
    ];

    pub fn title(self) -> &'static str {
        match self {
            IndicatorChart::PriceMa => "Close Price with SMA & EMA",
            IndicatorChart::Rsi => "RSI (14)",
            IndicatorChart::Macd => "MACD",
            IndicatorChart::Bollinger => "Bollinger Bands",
            IndicatorChart::Volatility => "20-day Rolling Volatility",
        }
    }
}

/// Display names for the default ticker set; unknown tickers fall back to
/// the raw symbol.
pub fn company_name(ticker: &str) -> &str {
    match ticker {
        "AAPL" => "Apple Inc.",
        "MSFT" => "Microsoft Corporation",
        "GOOGL" => "Alphabet Inc. (Google)",
        "AMZN" => "Amazon.com, Inc.",
        "TSLA" => "Tesla, Inc.",
        "META" => "Meta Platforms, Inc. (Facebook)",
        "JPM" => "JPMorgan Chase & Co.",
        "NFLX" => "Netflix, Inc.",
        "^NSEI" => "Nifty 50 Index",
        "^GSPC" => "S&P 500 Index",
        other => other,
    }
}

/// Trend sign of the forecast tail: strictly greater is "Up", anything else
/// (including a tie) reads "Down".
pub fn trend_label(last: f64, previous: f64) -> &'static str {
    if last > previous { "Up" } else { "Down" }
}

pub fn trend_arrow(last: f64, previous: f64) -> &'static str {
    if last > previous { "↑" } else { "↓" }
}

pub struct App {
    storage: StorageManager,
    pub horizons: Vec<usize>,
    pub tickers: Vec<String>,
    pub selected_ticker: usize,
    pub selected_horizon: usize,
    pub page: Page,
    pub chart: IndicatorChart,
    features: Vec<IndicatorRow>,
    /// Merged results for the current (ticker, horizon), if produced.
    pub merged: Option<Vec<MergedRow>>,
    merged_available: HashSet<(String, usize)>,
    pub status: Option<String>,
}

impl App {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let storage = StorageManager::new(&config.data_dir).await?;
        let features: Vec<IndicatorRow> = match storage.load_csv(FEATURES_FILE).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("no features artifact: {e:#}");
                Vec::new()
            }
        };

        let mut tickers: Vec<String> = Vec::new();
        for row in &features {
            if !tickers.contains(&row.ticker) {
                tickers.push(row.ticker.clone());
            }
        }
        tickers.sort();

        let horizons = config.models.horizons.clone();
        // Start on the 30-day horizon when it is configured.
        let selected_horizon = horizons.iter().position(|&h| h == 30).unwrap_or(0);
        let merged_available = scan_merged_artifacts(&storage);

        let mut app = Self {
            storage,
            horizons,
            tickers,
            selected_ticker: 0,
            selected_horizon,
            page: Page::Indicators,
            chart: IndicatorChart::PriceMa,
            features,
            merged: None,
            merged_available,
            status: None,
        };
        app.reload_merged().await;
        Ok(app)
    }

    pub fn ticker(&self) -> Option<&str> {
        self.tickers.get(self.selected_ticker).map(String::as_str)
    }

    pub fn horizon(&self) -> usize {
        self.horizons.get(self.selected_horizon).copied().unwrap_or(30)
    }

    /// Rows of the currently selected ticker, date ascending.
    pub fn ticker_rows(&self) -> Vec<&IndicatorRow> {
        let Some(ticker) = self.ticker() else {
            return Vec::new();
        };
        let mut rows: Vec<&IndicatorRow> =
            self.features.iter().filter(|r| r.ticker == ticker).collect();
        rows.sort_by_key(|r| r.date);
        rows
    }

    pub async fn reload_merged(&mut self) {
        self.merged = None;
        let Some(ticker) = self.ticker().map(str::to_string) else {
            return;
        };
        let horizon = self.horizon();
        if !self.merged_available.contains(&(ticker.clone(), horizon)) {
            return;
        }
        match self
            .storage
            .load_csv(&results_file(&ticker, "all_models", horizon))
            .await
        {
            Ok(rows) => self.merged = Some(rows),
            Err(e) => warn!("failed to load merged results for {ticker}: {e:#}"),
        }
    }

    /// Writes the displayed result table under `exports/`.
    pub async fn export_current(&mut self) {
        let (Some(ticker), Some(merged)) = (self.ticker().map(str::to_string), &self.merged)
        else {
            self.status = Some("nothing to export".to_string());
            return;
        };
        let path = export_file(&ticker, self.horizon());
        match self.storage.save_csv(&path, merged).await {
            Ok(()) => {
                self.status = Some(format!("exported {}", self.storage.path(&path).display()));
            }
            Err(e) => self.status = Some(format!("export failed: {e:#}")),
        }
    }
}

/// One directory scan up front instead of probing per selection.
fn scan_merged_artifacts(storage: &StorageManager) -> HashSet<(String, usize)> {
    let pattern = Regex::new(r"^(.+)_all_models_results_(\d+)\.csv$").unwrap();
    let mut available = HashSet::new();
    let dir = storage.path(MODEL_OUTPUT_DIR);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return available;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = pattern.captures(name) {
            if let Ok(horizon) = caps[2].parse::<usize>() {
                available.insert((caps[1].to_string(), horizon));
            }
        }
    }
    available
}

/// Dashboard entry point: raw-mode terminal setup, the event loop, teardown.
pub async fn run(config: &AppConfig) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, config).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, config: &AppConfig) -> Result<()> {
    let mut app = App::new(config).await?;
    loop {
        terminal.draw(|f| ui::draw(f, &app))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    if !handle_key_event(key, &mut app).await {
                        return Ok(());
                    }
                }
                Event::Resize(_, _) => {
                    // Next draw picks up the new size.
                }
                _ => {}
            }
        }
    }
}

/// Returns false when the user quits.
async fn handle_key_event(key: KeyEvent, app: &mut App) -> bool {
    app.status = None;
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Tab => {
            let idx = Page::ALL.iter().position(|&p| p == app.page).unwrap_or(0);
            app.page = Page::ALL[(idx + 1) % Page::ALL.len()];
        }
        KeyCode::Char(c @ '1'..='3') => {
            app.page = Page::ALL[c as usize - '1' as usize];
        }
        KeyCode::Up => {
            if !app.tickers.is_empty() {
                app.selected_ticker = app
                    .selected_ticker
                    .checked_sub(1)
                    .unwrap_or(app.tickers.len() - 1);
                app.reload_merged().await;
            }
        }
        KeyCode::Down => {
            if !app.tickers.is_empty() {
                app.selected_ticker = (app.selected_ticker + 1) % app.tickers.len();
                app.reload_merged().await;
            }
        }
        KeyCode::Left if app.page == Page::Indicators => {
            let idx = IndicatorChart::ALL
                .iter()
                .position(|&c| c == app.chart)
                .unwrap_or(0);
            app.chart =
                IndicatorChart::ALL[(idx + IndicatorChart::ALL.len() - 1) % IndicatorChart::ALL.len()];
        }
        KeyCode::Right if app.page == Page::Indicators => {
            let idx = IndicatorChart::ALL
                .iter()
                .position(|&c| c == app.chart)
                .unwrap_or(0);
            app.chart = IndicatorChart::ALL[(idx + 1) % IndicatorChart::ALL.len()];
        }
        KeyCode::Char('h') | KeyCode::Left | KeyCode::Right => {
            if !app.horizons.is_empty() {
                app.selected_horizon = match key.code {
                    KeyCode::Left => {
                        (app.selected_horizon + app.horizons.len() - 1) % app.horizons.len()
                    }
                    _ => (app.selected_horizon + 1) % app.horizons.len(),
                };
                app.reload_merged().await;
            }
        }
        KeyCode::Char('e') => app.export_current().await,
        _ => {}
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_is_up_only_when_strictly_greater() {
        assert_eq!(trend_label(101.0, 100.0), "Up");
        assert_eq!(trend_label(99.0, 100.0), "Down");
        // Documented tie-break: equality resolves to Down.
        assert_eq!(trend_label(100.0, 100.0), "Down");
        assert_eq!(trend_arrow(101.0, 100.0), "↑");
        assert_eq!(trend_arrow(100.0, 100.0), "↓");
    }

    #[test]
    fn company_names_cover_the_default_universe() {
        assert_eq!(company_name("AAPL"), "Apple Inc.");
        assert_eq!(company_name("^GSPC"), "S&P 500 Index");
        assert_eq!(company_name("ZZZZ"), "ZZZZ");
    }

    #[tokio::test]
    async fn merged_artifact_scan_matches_the_naming_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).await.unwrap();
        storage
            .write_atomic("model_outputs/AAPL_all_models_results_30.csv", b"x")
            .await
            .unwrap();
        storage
            .write_atomic("model_outputs/AAPL_sarima_results_30.csv", b"x")
            .await
            .unwrap();
        storage
            .write_atomic("model_outputs/AAPL_lstm_forecast_30.png", b"x")
            .await
            .unwrap();
        let available = scan_merged_artifacts(&storage);
        assert_eq!(available.len(), 1);
        assert!(available.contains(&("AAPL".to_string(), 30)));
    }
}
