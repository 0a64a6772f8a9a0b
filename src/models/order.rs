use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Immutable audit record of a buy/sell execution against a holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Id,
    pub holding_id: Id,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
    /// Average cost of the holding immediately before this order.
    pub cost_snapshot: Decimal,
    /// Realized profit; only set for sells.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_snapshot: Option<Decimal>,
}
