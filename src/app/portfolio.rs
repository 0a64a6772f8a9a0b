use std::sync::Arc;

use anyhow::Result;

use crate::config::ResolvedConfig;
use crate::format::format_money;
use crate::storage::Storage;
use crate::valuation::PortfolioService;

use super::types::{
    HistoryPointOutput, HoldingOutput, InstrumentDetailOutput, InstrumentOutput, PricePointOutput,
};
use super::{rejection, resolve_instrument};

pub async fn list_instruments(
    storage: Arc<dyn Storage>,
    skip: usize,
    limit: usize,
) -> Result<serde_json::Value> {
    let instruments = PortfolioService::new(storage)
        .list_instruments(skip, limit)
        .await?;
    let output: Vec<InstrumentOutput> = instruments.iter().map(InstrumentOutput::from).collect();
    Ok(serde_json::to_value(output)?)
}

pub async fn instrument_detail(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
    code: &str,
) -> Result<serde_json::Value> {
    let result = async {
        let instrument = resolve_instrument(storage.as_ref(), code).await?;
        PortfolioService::new(storage.clone())
            .instrument_detail(&instrument.id)
            .await
    }
    .await;

    match result {
        Ok(detail) => {
            let output = InstrumentDetailOutput {
                instrument: InstrumentOutput::from(&detail.instrument),
                history: detail
                    .history
                    .iter()
                    .map(|p| PricePointOutput {
                        timestamp: p.timestamp.to_rfc3339(),
                        price: format_money(p.price, config.display.currency_decimals),
                    })
                    .collect(),
            };
            Ok(serde_json::to_value(output)?)
        }
        Err(err) => rejection(err),
    }
}

pub async fn portfolio_snapshot(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
) -> Result<serde_json::Value> {
    let items = PortfolioService::new(storage)
        .portfolio(&config.owner)
        .await?;
    let output: Vec<HoldingOutput> = items
        .iter()
        .map(|item| HoldingOutput::new(item, config.display.currency_decimals))
        .collect();
    Ok(serde_json::to_value(output)?)
}

pub async fn holding_detail(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
    code: &str,
) -> Result<serde_json::Value> {
    let result = async {
        let instrument = resolve_instrument(storage.as_ref(), code).await?;
        PortfolioService::new(storage.clone())
            .holding(&config.owner, &instrument.id)
            .await
    }
    .await;

    match result {
        Ok(item) => Ok(serde_json::to_value(HoldingOutput::new(
            &item,
            config.display.currency_decimals,
        ))?),
        Err(err) => rejection(err),
    }
}

pub async fn portfolio_history(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
) -> Result<serde_json::Value> {
    let points = PortfolioService::new(storage)
        .history(&config.owner)
        .await?;
    let output: Vec<HistoryPointOutput> = points
        .iter()
        .map(|p| HistoryPointOutput::new(p, config.display.currency_decimals))
        .collect();
    Ok(serde_json::to_value(output)?)
}
