use std::sync::Arc;

use anyhow::Result;

use crate::config::ResolvedConfig;
use crate::ingest::IngestionCoordinator;
use crate::market_data::{HttpQuoteFetcher, QuoteSource, TopListPageParser};
use crate::storage::Storage;

/// Build the HTTP quote fetcher described by the `[ingestion]` config.
pub fn build_quote_source(config: &ResolvedConfig) -> Result<HttpQuoteFetcher> {
    let target = &config.ingestion.target;
    let parser = TopListPageParser::new(
        &target.list_class,
        &target.value_element,
        &target.block_markers,
    )?;
    HttpQuoteFetcher::new(
        target.scrape_target(),
        config.ingestion.retry.clone(),
        Arc::new(parser),
    )
}

pub fn ingestion_coordinator(
    storage: Arc<dyn Storage>,
    source: Arc<dyn QuoteSource>,
    config: &ResolvedConfig,
) -> IngestionCoordinator {
    IngestionCoordinator::new(storage, source)
        .with_freshness_window(config.ingestion.freshness_window)
}

/// Run one ingestion pass against the configured target.
pub async fn run_ingestion(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
) -> Result<serde_json::Value> {
    let source: Arc<dyn QuoteSource> = Arc::new(build_quote_source(config)?);
    run_ingestion_with(storage, source, config).await
}

pub async fn run_ingestion_with(
    storage: Arc<dyn Storage>,
    source: Arc<dyn QuoteSource>,
    config: &ResolvedConfig,
) -> Result<serde_json::Value> {
    let report = ingestion_coordinator(storage, source, config).run().await?;
    Ok(serde_json::json!({
        "success": true,
        "new_records": report.new_records(),
        "report": report,
    }))
}
