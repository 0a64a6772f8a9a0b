mod json_file;
mod memory;
mod state;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{
    Category, Holding, HoldingChange, Id, Instrument, InstrumentCode, Order, Quote, QuoteWrite,
};

/// Transactional store for instruments, quotes, holdings and orders.
///
/// Every write method is atomic: it either applies completely or leaves the
/// store untouched and returns an error.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    // Instruments
    async fn list_instruments(&self) -> Result<Vec<Instrument>>;
    async fn instruments_by_category(&self, category: Category) -> Result<Vec<Instrument>>;
    async fn get_instrument(&self, id: &Id) -> Result<Option<Instrument>>;
    async fn find_instrument(&self, code: &InstrumentCode) -> Result<Option<Instrument>>;
    /// Returns false when an instrument with the same code already exists.
    async fn insert_instrument(&self, instrument: &Instrument) -> Result<bool>;

    // Quotes
    /// Every instrument of `category` with the timestamp of its newest quote.
    async fn latest_quote_times(
        &self,
        category: Category,
    ) -> Result<Vec<(Instrument, Option<DateTime<Utc>>)>>;
    async fn latest_quote(&self, instrument_id: &Id) -> Result<Option<Quote>>;
    /// Quotes with `from <= timestamp < to` in ascending timestamp order. An
    /// empty `instrument_ids` slice selects all instruments.
    async fn quotes_in_range(
        &self,
        instrument_ids: &[Id],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Quote>>;
    async fn commit_quotes(&self, writes: &[QuoteWrite]) -> Result<()>;

    /// Full ascending history for the given instruments.
    async fn quote_history(&self, instrument_ids: &[Id]) -> Result<Vec<Quote>> {
        self.quotes_in_range(instrument_ids, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
            .await
    }

    // Holdings and orders
    async fn list_holdings(&self, owner_id: &Id) -> Result<Vec<Holding>>;
    async fn get_holding(&self, owner_id: &Id, instrument_id: &Id) -> Result<Option<Holding>>;
    async fn commit_holding(&self, change: &HoldingChange) -> Result<()>;
    /// Orders of a holding, newest first.
    async fn list_orders(&self, holding_id: &Id) -> Result<Vec<Order>>;
}
