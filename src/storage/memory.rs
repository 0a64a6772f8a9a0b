// src/storage/memory.rs
//! In-memory storage implementation for tests and embedding.

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::models::{
    Category, Holding, HoldingChange, Id, Instrument, InstrumentCode, Order, Quote, QuoteWrite,
};

use super::state::StorageState;
use super::Storage;

/// In-memory storage; the whole state sits behind one lock, so every call
/// observes and produces a consistent snapshot.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<StorageState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        Ok(self.state.lock().await.list_instruments())
    }

    async fn instruments_by_category(&self, category: Category) -> Result<Vec<Instrument>> {
        Ok(self.state.lock().await.instruments_by_category(category))
    }

    async fn get_instrument(&self, id: &Id) -> Result<Option<Instrument>> {
        Ok(self.state.lock().await.get_instrument(id))
    }

    async fn find_instrument(&self, code: &InstrumentCode) -> Result<Option<Instrument>> {
        Ok(self.state.lock().await.find_instrument(code))
    }

    async fn insert_instrument(&self, instrument: &Instrument) -> Result<bool> {
        Ok(self.state.lock().await.insert_instrument(instrument))
    }

    async fn latest_quote_times(
        &self,
        category: Category,
    ) -> Result<Vec<(Instrument, Option<DateTime<Utc>>)>> {
        Ok(self.state.lock().await.latest_quote_times(category))
    }

    async fn latest_quote(&self, instrument_id: &Id) -> Result<Option<Quote>> {
        Ok(self.state.lock().await.latest_quote(instrument_id))
    }

    async fn quotes_in_range(
        &self,
        instrument_ids: &[Id],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Quote>> {
        Ok(self
            .state
            .lock()
            .await
            .quotes_in_range(instrument_ids, from, to))
    }

    async fn commit_quotes(&self, writes: &[QuoteWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.state.lock().await.commit_quotes(writes)
    }

    async fn list_holdings(&self, owner_id: &Id) -> Result<Vec<Holding>> {
        Ok(self.state.lock().await.list_holdings(owner_id))
    }

    async fn get_holding(&self, owner_id: &Id, instrument_id: &Id) -> Result<Option<Holding>> {
        Ok(self.state.lock().await.get_holding(owner_id, instrument_id))
    }

    async fn commit_holding(&self, change: &HoldingChange) -> Result<()> {
        self.state.lock().await.commit_holding(change)
    }

    async fn list_orders(&self, holding_id: &Id) -> Result<Vec<Order>> {
        Ok(self.state.lock().await.list_orders(holding_id))
    }
}
