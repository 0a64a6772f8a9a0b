//! Command implementations shared by the CLI and daemon. Each returns the
//! JSON document printed to stdout.

mod config;
mod ingest;
mod ledger;
mod portfolio;
mod types;

use anyhow::Result;

use crate::error::PortfolioError;
use crate::models::{Instrument, InstrumentCode};
use crate::storage::Storage;

pub use config::config_output;
pub use ingest::{build_quote_source, ingestion_coordinator, run_ingestion, run_ingestion_with};
pub use ledger::{add_to_watchlist, list_orders, place_order, record_transaction, register_instrument};
pub use portfolio::{
    holding_detail, instrument_detail, list_instruments, portfolio_history, portfolio_snapshot,
};
pub use types::{
    HistoryPointOutput, HoldingOutput, InstrumentDetailOutput, InstrumentOutput, OrderOutput,
    PricePointOutput,
};

async fn resolve_instrument(storage: &dyn Storage, code: &str) -> Result<Instrument, PortfolioError> {
    let code = InstrumentCode::parse(code)?;
    storage
        .find_instrument(&code)
        .await?
        .ok_or_else(|| PortfolioError::AssetNotFound(code.to_string()))
}

/// Domain rejections become a `success: false` document; storage failures
/// stay errors.
fn rejection(err: PortfolioError) -> Result<serde_json::Value> {
    if let PortfolioError::Storage(e) = err {
        return Err(e);
    }
    Ok(serde_json::json!({
        "success": false,
        "error": err.kind(),
        "message": err.to_string(),
    }))
}
