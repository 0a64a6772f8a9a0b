use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// One recorded price observation.
///
/// The timestamp keeps full precision, but at most one quote exists per
/// (instrument, [`Quote::day`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Id,
    pub instrument_id: Id,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

impl Quote {
    pub fn new(instrument_id: Id, timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            id: Id::new(),
            instrument_id,
            timestamp,
            price,
        }
    }

    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// A single change to the price store, applied as part of an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteWrite {
    Insert(Quote),
    /// Overwrite price and timestamp of the stored quote with the same id.
    Update(Quote),
}

impl QuoteWrite {
    pub fn quote(&self) -> &Quote {
        match self {
            Self::Insert(quote) | Self::Update(quote) => quote,
        }
    }
}
