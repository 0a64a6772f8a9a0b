use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fundbook::app;
use fundbook::config::{default_config_path, ResolvedConfig};
use fundbook::ingest::IngestionCoordinator;
use fundbook::market_data::QuoteSource;
use fundbook::storage::{JsonFileStorage, Storage};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    fundbook::duration::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "fundbook-daemon")]
#[command(about = "Long-running fundbook price ingestion daemon")]
struct Cli {
    /// Path to fundbook config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Override the base ingestion interval (e.g. "30m", "1h").
    #[arg(long, value_parser = parse_duration_arg)]
    interval: Option<Duration>,

    /// Override the jitter; each interval is moved by up to +/- this much.
    #[arg(long, value_parser = parse_duration_arg)]
    jitter: Option<Duration>,

    /// Override the freshness window used to skip recently quoted funds.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    freshness_window: Option<Duration>,

    /// Skip the immediate startup ingestion run.
    #[arg(long)]
    no_ingest_on_start: bool,
}

struct Daemon {
    coordinator: IngestionCoordinator,
    interval: Duration,
    jitter: Duration,
    ingest_on_start: bool,
}

impl Daemon {
    async fn run_cycle(&self, reason: &str) {
        info!(reason, "fundbook ingestion run starting");
        match self.coordinator.run().await {
            Ok(report) => info!(
                reason,
                new_records = report.new_records(),
                updated = report.updated,
                unchanged = report.unchanged,
                skipped_fresh = report.skipped_fresh,
                failed = report.failed,
                "fundbook ingestion run complete"
            ),
            Err(err) => warn!(reason, error = %format!("{err:#}"), "fundbook ingestion run failed"),
        }
    }

    async fn run(self) -> Result<()> {
        if self.ingest_on_start {
            self.run_cycle("startup").await;
        }

        loop {
            let next_delay = compute_next_delay(self.interval, self.jitter);
            info!(next_run_in = %fundbook::duration::format_duration(next_delay), "waiting for next run");

            let sleep = tokio::time::sleep(next_delay);
            tokio::pin!(sleep);

            tokio::select! {
                _ = &mut sleep => {
                    self.run_cycle("scheduled").await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn compute_next_delay(interval: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return interval;
    }

    let base_ms = interval.as_millis().min(u128::from(u64::MAX)) as i128;
    let jitter_ms = jitter.as_millis().min(u128::from(u64::MAX)) as i128;
    let offset = rand::thread_rng().gen_range(-jitter_ms..=jitter_ms);

    let min_ms = 1_000_i128;
    let max_ms = i128::from(u64::MAX);
    let delay_ms = (base_ms + offset).clamp(min_ms, max_ms) as u64;
    Duration::from_millis(delay_ms)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load fundbook config: {}", cli.config.display()))?;

    if let Some(interval) = cli.interval {
        config.ingestion.interval = interval;
    }
    if let Some(jitter) = cli.jitter {
        config.ingestion.jitter = jitter;
    }
    if let Some(window) = cli.freshness_window {
        config.ingestion.freshness_window = window;
    }

    let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::new(&config.data_dir));
    let source: Arc<dyn QuoteSource> = Arc::new(app::build_quote_source(&config)?);

    let daemon = Daemon {
        coordinator: app::ingestion_coordinator(storage, source, &config),
        interval: config.ingestion.interval,
        jitter: config.ingestion.jitter,
        ingest_on_start: config.ingestion.run_on_start && !cli.no_ingest_on_start,
    };

    daemon.run().await
}
