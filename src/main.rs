use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fundbook::app;
use fundbook::config::{default_config_path, ResolvedConfig};
use fundbook::models::{Category, Id, OrderSide};
use fundbook::storage::{JsonFileStorage, Storage};
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn parse_decimal_arg(s: &str) -> Result<Decimal, String> {
    Decimal::from_str(s.trim()).map_err(|e| format!("invalid number {s:?}: {e}"))
}

#[derive(Parser)]
#[command(name = "fundbook")]
#[command(about = "Fund portfolio tracker with scraped price ingestion")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Act as this owner instead of the configured one
    #[arg(long, global = true)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current configuration
    Config,

    /// Fetch current prices for stale funds now
    Ingest,

    /// Register a new instrument
    Register {
        code: String,
        name: String,
        #[arg(long, default_value = "FUND")]
        category: Category,
    },

    /// List registered instruments
    Instruments {
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Show an instrument with its price history
    Instrument { code: String },

    /// Track an instrument without buying it
    Watch { code: String },

    /// Adjust a holding directly; a negative quantity sells
    Transaction {
        code: String,
        #[arg(allow_hyphen_values = true, value_parser = parse_decimal_arg)]
        quantity: Decimal,
        #[arg(value_parser = parse_decimal_arg)]
        price: Decimal,
    },

    /// Record a buy order
    Buy {
        code: String,
        #[arg(value_parser = parse_decimal_arg)]
        quantity: Decimal,
        #[arg(value_parser = parse_decimal_arg)]
        price: Decimal,
    },

    /// Record a sell order
    Sell {
        code: String,
        #[arg(value_parser = parse_decimal_arg)]
        quantity: Decimal,
        #[arg(value_parser = parse_decimal_arg)]
        price: Decimal,
    },

    /// List orders for a holding, newest first
    Orders { code: String },

    /// Value every holding at its latest price
    Portfolio,

    /// Value a single holding
    Holding { code: String },

    /// Daily portfolio value over the stored price history
    History,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    let cli = Cli::parse();

    let mut config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    if let Some(owner) = &cli.owner {
        config.owner = Id::from_string(owner.trim());
    }

    let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::new(&config.data_dir));

    let output = match cli.command {
        Command::Config => app::config_output(&cli.config, &config),
        Command::Ingest => app::run_ingestion(storage, &config).await?,
        Command::Register {
            code,
            name,
            category,
        } => app::register_instrument(storage, &code, &name, category).await?,
        Command::Instruments { skip, limit } => app::list_instruments(storage, skip, limit).await?,
        Command::Instrument { code } => app::instrument_detail(storage, &config, &code).await?,
        Command::Watch { code } => app::add_to_watchlist(storage, &config, &code).await?,
        Command::Transaction {
            code,
            quantity,
            price,
        } => app::record_transaction(storage, &config, &code, quantity, price).await?,
        Command::Buy {
            code,
            quantity,
            price,
        } => app::place_order(storage, &config, &code, OrderSide::Buy, quantity, price).await?,
        Command::Sell {
            code,
            quantity,
            price,
        } => app::place_order(storage, &config, &code, OrderSide::Sell, quantity, price).await?,
        Command::Orders { code } => app::list_orders(storage, &config, &code).await?,
        Command::Portfolio => app::portfolio_snapshot(storage, &config).await?,
        Command::Holding { code } => app::holding_detail(storage, &config, &code).await?,
        Command::History => app::portfolio_history(storage, &config).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
