use anyhow::Result;
use clap::{Parser, Subcommand};
use tickercast::config::AppConfig;
use tickercast::storage::StorageManager;
use tickercast::{dashboard, download, forecast, indicators, merge};

#[derive(Parser)]
#[command(
    name = "tickercast",
    about = "Stock indicator and forecasting pipeline with a terminal dashboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch daily price history and write the raw CSV artifacts
    Download,
    /// Compute technical indicators over the combined prices
    Features,
    /// Fit ARIMA and Prophet per (ticker, horizon)
    Arima,
    /// Fit SARIMA per (ticker, horizon)
    Sarima,
    /// Train the LSTM regressor per (ticker, horizon)
    Lstm,
    /// Join ARIMA/Prophet and SARIMA results per (ticker, horizon)
    Merge,
    /// Run every batch stage in pipeline order
    Pipeline,
    /// Interactive dashboard over the produced artifacts
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let storage = StorageManager::new(&config.data_dir).await?;

    match cli.command {
        Command::Download => download::run(&config.download, &storage).await,
        Command::Features => indicators::run(&storage).await,
        Command::Arima => forecast::run_arima_prophet(&config.models, &storage).await,
        Command::Sarima => forecast::run_sarima(&config.models, &storage).await,
        Command::Lstm => forecast::run_lstm(&config.models, &storage).await,
        Command::Merge => merge::run(&config.models, &storage).await,
        Command::Pipeline => run_pipeline(&config, &storage).await,
        Command::Dashboard => dashboard::run(&config).await,
    }
}

/// Runs the batch stages in dependency order. A failed download aborts the
/// run; any later stage failure is reported and the remaining stages still
/// get their chance (their inputs may exist from an earlier run).
async fn run_pipeline(config: &AppConfig, storage: &StorageManager) -> Result<()> {
    println!("\n--- Step 1: Downloading Price History ---");
    download::run(&config.download, storage).await?;

    println!("\n--- Step 2: Feature Engineering ---");
    if let Err(e) = indicators::run(storage).await {
        eprintln!("Error computing features: {e:#}");
    }

    println!("\n--- Step 3: ARIMA & Prophet Forecasts ---");
    if let Err(e) = forecast::run_arima_prophet(&config.models, storage).await {
        eprintln!("Error in ARIMA/Prophet stage: {e:#}");
    }

    println!("\n--- Step 4: SARIMA Forecasts ---");
    if let Err(e) = forecast::run_sarima(&config.models, storage).await {
        eprintln!("Error in SARIMA stage: {e:#}");
    }

    println!("\n--- Step 5: LSTM Forecasts ---");
    if let Err(e) = forecast::run_lstm(&config.models, storage).await {
        eprintln!("Error in LSTM stage: {e:#}");
    }

    println!("\n--- Step 6: Merging Model Results ---");
    if let Err(e) = merge::run(&config.models, storage).await {
        eprintln!("Error merging results: {e:#}");
    }

    println!("\nPipeline complete. Explore the results with `tickercast dashboard`.");
    Ok(())
}
