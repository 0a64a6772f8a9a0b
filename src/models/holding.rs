use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// An owner's current position in one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub id: Id,
    pub owner_id: Id,
    pub instrument_id: Id,
    pub quantity: Decimal,
    pub average_cost: Decimal,
}

impl Holding {
    pub fn new(owner_id: Id, instrument_id: Id, quantity: Decimal, average_cost: Decimal) -> Self {
        Self {
            id: Id::new(),
            owner_id,
            instrument_id,
            quantity,
            average_cost,
        }
    }

    /// A watchlist entry: tracked but not owned.
    pub fn empty(owner_id: Id, instrument_id: Id) -> Self {
        Self::new(owner_id, instrument_id, Decimal::ZERO, Decimal::ZERO)
    }
}

/// The write half of a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingWrite {
    Save(Holding),
    Delete(Id),
}

/// A holding mutation and the order that caused it, committed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingChange {
    pub write: HoldingWrite,
    pub order: Option<super::Order>,
}

impl HoldingChange {
    pub fn save(holding: Holding) -> Self {
        Self {
            write: HoldingWrite::Save(holding),
            order: None,
        }
    }

    pub fn delete(holding_id: Id) -> Self {
        Self {
            write: HoldingWrite::Delete(holding_id),
            order: None,
        }
    }

    pub fn with_order(mut self, order: super::Order) -> Self {
        self.order = Some(order);
        self
    }
}
