use serde::Serialize;

use crate::format::format_money;
use crate::models::{Instrument, Order};
use crate::valuation::{HistoryPoint, PortfolioItem};

/// JSON output for instruments
#[derive(Serialize)]
pub struct InstrumentOutput {
    pub id: String,
    pub code: String,
    pub name: String,
    pub category: String,
    pub created_at: String,
}

impl From<&Instrument> for InstrumentOutput {
    fn from(instrument: &Instrument) -> Self {
        Self {
            id: instrument.id.to_string(),
            code: instrument.code.to_string(),
            name: instrument.name.clone(),
            category: format!("{:?}", instrument.category).to_uppercase(),
            created_at: instrument.created_at.to_rfc3339(),
        }
    }
}

/// JSON output for one price observation
#[derive(Serialize)]
pub struct PricePointOutput {
    pub timestamp: String,
    pub price: String,
}

/// JSON output for an instrument with its price history
#[derive(Serialize)]
pub struct InstrumentDetailOutput {
    #[serde(flatten)]
    pub instrument: InstrumentOutput,
    pub history: Vec<PricePointOutput>,
}

/// JSON output for a valued holding
#[derive(Serialize)]
pub struct HoldingOutput {
    pub holding_id: Option<String>,
    pub instrument_id: String,
    pub code: String,
    pub name: String,
    pub quantity: String,
    pub average_cost: String,
    pub current_price: String,
    pub total_value: String,
    pub cost_basis: String,
    pub profit: String,
    pub profit_percent: String,
}

impl HoldingOutput {
    pub fn new(item: &PortfolioItem, decimals: Option<u32>) -> Self {
        let v = &item.valuation;
        Self {
            holding_id: item.holding_id.as_ref().map(|id| id.to_string()),
            instrument_id: item.instrument_id.to_string(),
            code: item.code.to_string(),
            name: item.name.clone(),
            quantity: v.quantity.normalize().to_string(),
            average_cost: format_money(v.average_cost, decimals),
            current_price: format_money(v.price, decimals),
            total_value: format_money(v.total_value, decimals),
            cost_basis: format_money(v.cost_basis, decimals),
            profit: format_money(v.profit, decimals),
            profit_percent: format_money(v.profit_percent, Some(2)),
        }
    }
}

/// JSON output for orders
#[derive(Serialize)]
pub struct OrderOutput {
    pub id: String,
    pub holding_id: String,
    pub side: String,
    pub quantity: String,
    pub price: String,
    pub executed_at: String,
    pub cost_snapshot: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_snapshot: Option<String>,
}

impl OrderOutput {
    pub fn new(order: &Order, decimals: Option<u32>) -> Self {
        Self {
            id: order.id.to_string(),
            holding_id: order.holding_id.to_string(),
            side: format!("{:?}", order.side).to_uppercase(),
            quantity: order.quantity.normalize().to_string(),
            price: format_money(order.price, decimals),
            executed_at: order.executed_at.to_rfc3339(),
            cost_snapshot: format_money(order.cost_snapshot, decimals),
            profit_snapshot: order.profit_snapshot.map(|p| format_money(p, decimals)),
        }
    }
}

/// JSON output for a portfolio history point
#[derive(Serialize)]
pub struct HistoryPointOutput {
    pub date: String,
    pub total_value: String,
    pub total_cost: String,
    pub total_profit: String,
}

impl HistoryPointOutput {
    pub fn new(point: &HistoryPoint, decimals: Option<u32>) -> Self {
        Self {
            date: point.date.to_string(),
            total_value: format_money(point.total_value, decimals),
            total_cost: format_money(point.total_cost, decimals),
            total_profit: format_money(point.total_profit, decimals),
        }
    }
}
