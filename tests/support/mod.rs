#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fundbook::clock::FixedClock;
use fundbook::error::FetchFailure;
use fundbook::market_data::{FetchOutcome, QuoteSource};
use fundbook::models::{
    Category, Holding, HoldingChange, Id, Instrument, InstrumentCode, Order, Quote, QuoteWrite,
};
use fundbook::storage::{MemoryStorage, Storage};
use rust_decimal::Decimal;

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn fund(code: &str, name: &str) -> Instrument {
    Instrument::new(
        InstrumentCode::parse(code).unwrap(),
        name,
        Category::Fund,
        at(2024, 1, 1, 0),
    )
}

pub fn quote_page(price_text: &str) -> String {
    format!(
        r#"<html><body>
            <div class="main-indicators">
              <ul class="top-list">
                <li>Son Fiyat (TL)<span>{price_text}</span></li>
                <li>Günlük Getiri (%)<span>%0,21</span></li>
              </ul>
            </div>
          </body></html>"#
    )
}

pub const BLOCK_PAGE: &str =
    "<html><body><h1>Request Rejected</h1><p>Your support ID is: 1234567890</p></body></html>";

/// Quote source answering from a fixed table and recording every call.
#[derive(Default)]
pub struct ScriptedQuoteSource {
    results: HashMap<String, (u32, Result<Decimal, FetchFailure>)>,
    calls: Mutex<Vec<String>>,
    warm_ups: AtomicUsize,
    fail_warm_up: bool,
}

impl ScriptedQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, code: &str, price: Decimal) -> Self {
        self.results.insert(code.to_string(), (1, Ok(price)));
        self
    }

    pub fn with_failure(mut self, code: &str, attempts: u32, failure: FetchFailure) -> Self {
        self.results.insert(code.to_string(), (attempts, Err(failure)));
        self
    }

    pub fn with_failing_warm_up(mut self) -> Self {
        self.fail_warm_up = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn warm_ups(&self) -> usize {
        self.warm_ups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuoteSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn warm_up(&self) -> Result<()> {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
        if self.fail_warm_up {
            anyhow::bail!("landing page unavailable");
        }
        Ok(())
    }

    async fn fetch_quote(&self, code: &InstrumentCode) -> FetchOutcome {
        self.calls.lock().unwrap().push(code.to_string());
        match self.results.get(code.as_str()) {
            Some((attempts, result)) => FetchOutcome {
                code: code.clone(),
                attempts: *attempts,
                result: result.clone(),
            },
            None => FetchOutcome::exhausted(
                code.clone(),
                10,
                FetchFailure::network("no scripted result"),
            ),
        }
    }
}

/// Wraps [`ScriptedQuoteSource`] and, right before answering for one code,
/// commits a quote through another writer and optionally moves the clock.
pub struct InterleavedWriteSource {
    pub inner: ScriptedQuoteSource,
    pub storage: Arc<MemoryStorage>,
    pub on_code: String,
    pub write: Quote,
    pub clock: Option<(Arc<FixedClock>, DateTime<Utc>)>,
}

#[async_trait]
impl QuoteSource for InterleavedWriteSource {
    fn name(&self) -> &str {
        "interleaved"
    }

    async fn warm_up(&self) -> Result<()> {
        self.inner.warm_up().await
    }

    async fn fetch_quote(&self, code: &InstrumentCode) -> FetchOutcome {
        if code.as_str() == self.on_code {
            if let Some((clock, now)) = &self.clock {
                clock.set(*now);
            }
            self.storage
                .commit_quotes(&[QuoteWrite::Insert(self.write.clone())])
                .await
                .unwrap();
        }
        self.inner.fetch_quote(code).await
    }
}

/// Memory storage whose quote commits always fail.
#[derive(Default)]
pub struct FailingCommitStorage {
    pub inner: MemoryStorage,
}

#[async_trait]
impl Storage for FailingCommitStorage {
    async fn list_instruments(&self) -> Result<Vec<Instrument>> {
        self.inner.list_instruments().await
    }

    async fn instruments_by_category(&self, category: Category) -> Result<Vec<Instrument>> {
        self.inner.instruments_by_category(category).await
    }

    async fn get_instrument(&self, id: &Id) -> Result<Option<Instrument>> {
        self.inner.get_instrument(id).await
    }

    async fn find_instrument(&self, code: &InstrumentCode) -> Result<Option<Instrument>> {
        self.inner.find_instrument(code).await
    }

    async fn insert_instrument(&self, instrument: &Instrument) -> Result<bool> {
        self.inner.insert_instrument(instrument).await
    }

    async fn latest_quote_times(
        &self,
        category: Category,
    ) -> Result<Vec<(Instrument, Option<DateTime<Utc>>)>> {
        self.inner.latest_quote_times(category).await
    }

    async fn latest_quote(&self, instrument_id: &Id) -> Result<Option<Quote>> {
        self.inner.latest_quote(instrument_id).await
    }

    async fn quotes_in_range(
        &self,
        instrument_ids: &[Id],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Quote>> {
        self.inner.quotes_in_range(instrument_ids, from, to).await
    }

    async fn commit_quotes(&self, _writes: &[QuoteWrite]) -> Result<()> {
        anyhow::bail!("disk full")
    }

    async fn list_holdings(&self, owner_id: &Id) -> Result<Vec<Holding>> {
        self.inner.list_holdings(owner_id).await
    }

    async fn get_holding(&self, owner_id: &Id, instrument_id: &Id) -> Result<Option<Holding>> {
        self.inner.get_holding(owner_id, instrument_id).await
    }

    async fn commit_holding(&self, change: &HoldingChange) -> Result<()> {
        self.inner.commit_holding(change).await
    }

    async fn list_orders(&self, holding_id: &Id) -> Result<Vec<Order>> {
        self.inner.list_orders(holding_id).await
    }
}
