use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::config::ResolvedConfig;
use crate::error::PortfolioError;
use crate::ledger::{LedgerService, OrderRequest};
use crate::models::{Category, OrderSide};
use crate::storage::Storage;

use super::types::{InstrumentOutput, OrderOutput};
use super::{resolve_instrument, rejection};

pub async fn register_instrument(
    storage: Arc<dyn Storage>,
    code: &str,
    name: &str,
    category: Category,
) -> Result<serde_json::Value> {
    let ledger = LedgerService::new(storage);
    match ledger.register_instrument(code, name, category).await {
        Ok(instrument) => Ok(serde_json::json!({
            "success": true,
            "instrument": InstrumentOutput::from(&instrument),
        })),
        Err(err) => rejection(err),
    }
}

pub async fn add_to_watchlist(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
    code: &str,
) -> Result<serde_json::Value> {
    let result = async {
        let instrument = resolve_instrument(storage.as_ref(), code).await?;
        let holding = LedgerService::new(storage.clone())
            .add_to_watchlist(&config.owner, &instrument.id)
            .await?;
        Ok::<_, PortfolioError>((instrument, holding))
    }
    .await;

    match result {
        Ok((instrument, holding)) => Ok(serde_json::json!({
            "success": true,
            "code": instrument.code.to_string(),
            "holding_id": holding.id.to_string(),
            "quantity": holding.quantity.normalize().to_string(),
        })),
        Err(err) => rejection(err),
    }
}

pub async fn record_transaction(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
    code: &str,
    quantity: Decimal,
    price: Decimal,
) -> Result<serde_json::Value> {
    let result = async {
        let instrument = resolve_instrument(storage.as_ref(), code).await?;
        LedgerService::new(storage.clone())
            .record_transaction(&config.owner, &instrument.id, quantity, price)
            .await
    }
    .await;

    match result {
        Ok(Some(holding)) => Ok(serde_json::json!({
            "success": true,
            "holding_id": holding.id.to_string(),
            "quantity": holding.quantity.normalize().to_string(),
            "average_cost": holding.average_cost.normalize().to_string(),
        })),
        Ok(None) => Ok(serde_json::json!({
            "success": true,
            "deleted": true,
        })),
        Err(err) => rejection(err),
    }
}

pub async fn place_order(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
    code: &str,
    side: OrderSide,
    quantity: Decimal,
    price: Decimal,
) -> Result<serde_json::Value> {
    let request = OrderRequest {
        side,
        quantity,
        price,
    };
    let result = async {
        let instrument = resolve_instrument(storage.as_ref(), code).await?;
        LedgerService::new(storage.clone())
            .place_order(&config.owner, &instrument.id, request)
            .await
    }
    .await;

    match result {
        Ok(order) => Ok(serde_json::json!({
            "success": true,
            "order": OrderOutput::new(&order, config.display.currency_decimals),
        })),
        Err(err) => rejection(err),
    }
}

pub async fn list_orders(
    storage: Arc<dyn Storage>,
    config: &ResolvedConfig,
    code: &str,
) -> Result<serde_json::Value> {
    let result = async {
        let instrument = resolve_instrument(storage.as_ref(), code).await?;
        LedgerService::new(storage.clone())
            .orders(&config.owner, &instrument.id)
            .await
    }
    .await;

    match result {
        Ok(orders) => {
            let orders: Vec<OrderOutput> = orders
                .iter()
                .map(|o| OrderOutput::new(o, config.display.currency_decimals))
                .collect();
            Ok(serde_json::to_value(orders)?)
        }
        Err(err) => rejection(err),
    }
}
