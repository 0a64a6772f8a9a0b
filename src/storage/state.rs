//! In-memory representation shared by every storage backend.
//!
//! All invariants of the store live here so the backends only decide where the
//! state is kept. Writes are applied to a copy and swapped in on success,
//! which is what makes each batch all-or-nothing.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Category, Holding, HoldingChange, HoldingWrite, Id, Instrument, InstrumentCode, Order, Quote,
    QuoteWrite,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StorageState {
    #[serde(default)]
    instruments: Vec<Instrument>,
    #[serde(default)]
    quotes: Vec<Quote>,
    #[serde(default)]
    holdings: Vec<Holding>,
    #[serde(default)]
    orders: Vec<Order>,
}

impl StorageState {
    pub fn list_instruments(&self) -> Vec<Instrument> {
        self.instruments.clone()
    }

    pub fn instruments_by_category(&self, category: Category) -> Vec<Instrument> {
        self.instruments
            .iter()
            .filter(|i| i.category == category)
            .cloned()
            .collect()
    }

    pub fn get_instrument(&self, id: &Id) -> Option<Instrument> {
        self.instruments.iter().find(|i| i.id == *id).cloned()
    }

    pub fn find_instrument(&self, code: &InstrumentCode) -> Option<Instrument> {
        self.instruments.iter().find(|i| i.code == *code).cloned()
    }

    /// Returns false (and changes nothing) when the code is already taken.
    pub fn insert_instrument(&mut self, instrument: &Instrument) -> bool {
        if self.instruments.iter().any(|i| i.code == instrument.code) {
            return false;
        }
        self.instruments.push(instrument.clone());
        true
    }

    pub fn latest_quote_times(&self, category: Category) -> Vec<(Instrument, Option<DateTime<Utc>>)> {
        self.instruments
            .iter()
            .filter(|i| i.category == category)
            .map(|instrument| {
                let latest = self
                    .quotes
                    .iter()
                    .filter(|q| q.instrument_id == instrument.id)
                    .map(|q| q.timestamp)
                    .max();
                (instrument.clone(), latest)
            })
            .collect()
    }

    pub fn latest_quote(&self, instrument_id: &Id) -> Option<Quote> {
        // Later insertions win timestamp ties.
        self.quotes
            .iter()
            .filter(|q| q.instrument_id == *instrument_id)
            .fold(None::<&Quote>, |best, q| match best {
                Some(b) if b.timestamp > q.timestamp => Some(b),
                _ => Some(q),
            })
            .cloned()
    }

    /// Quotes with `from <= timestamp < to`, ascending by timestamp. An empty
    /// id slice selects every instrument.
    pub fn quotes_in_range(
        &self,
        instrument_ids: &[Id],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Quote> {
        let mut quotes: Vec<Quote> = self
            .quotes
            .iter()
            .filter(|q| instrument_ids.is_empty() || instrument_ids.contains(&q.instrument_id))
            .filter(|q| q.timestamp >= from && q.timestamp < to)
            .cloned()
            .collect();
        quotes.sort_by_key(|q| q.timestamp);
        quotes
    }

    pub fn commit_quotes(&mut self, writes: &[QuoteWrite]) -> Result<()> {
        let mut next = self.clone();
        for write in writes {
            next.apply_quote_write(write)?;
        }
        *self = next;
        Ok(())
    }

    /// An `Insert` landing on a day that already has a quote for the
    /// instrument folds into the stored row: a different price overwrites it,
    /// the same price is a no-op.
    fn apply_quote_write(&mut self, write: &QuoteWrite) -> Result<()> {
        let quote = write.quote();
        if !self.instruments.iter().any(|i| i.id == quote.instrument_id) {
            bail!("quote {} references unknown instrument {}", quote.id, quote.instrument_id);
        }
        let same_day = self.quotes.iter().position(|q| {
            q.instrument_id == quote.instrument_id && q.day() == quote.day() && q.id != quote.id
        });

        match write {
            QuoteWrite::Insert(quote) => {
                if let Some(index) = same_day {
                    let existing = &mut self.quotes[index];
                    if existing.price != quote.price {
                        existing.price = quote.price;
                        existing.timestamp = quote.timestamp;
                    }
                    return Ok(());
                }
                if self.quotes.iter().any(|q| q.id == quote.id) {
                    bail!("quote {} already exists", quote.id);
                }
                self.quotes.push(quote.clone());
            }
            QuoteWrite::Update(quote) => {
                if same_day.is_some() {
                    bail!(
                        "instrument {} already has a quote for {}",
                        quote.instrument_id,
                        quote.day()
                    );
                }
                let Some(existing) = self.quotes.iter_mut().find(|q| q.id == quote.id) else {
                    bail!("quote {} does not exist", quote.id);
                };
                if existing.instrument_id != quote.instrument_id {
                    bail!("quote {} cannot move to another instrument", quote.id);
                }
                existing.price = quote.price;
                existing.timestamp = quote.timestamp;
            }
        }
        Ok(())
    }

    pub fn list_holdings(&self, owner_id: &Id) -> Vec<Holding> {
        self.holdings
            .iter()
            .filter(|h| h.owner_id == *owner_id)
            .cloned()
            .collect()
    }

    pub fn get_holding(&self, owner_id: &Id, instrument_id: &Id) -> Option<Holding> {
        self.holdings
            .iter()
            .find(|h| h.owner_id == *owner_id && h.instrument_id == *instrument_id)
            .cloned()
    }

    pub fn commit_holding(&mut self, change: &HoldingChange) -> Result<()> {
        let mut next = self.clone();
        next.apply_holding_write(&change.write)?;
        if let Some(order) = &change.order {
            if !next.holdings.iter().any(|h| h.id == order.holding_id) {
                bail!("order {} references missing holding {}", order.id, order.holding_id);
            }
            if next.orders.iter().any(|o| o.id == order.id) {
                bail!("order {} already exists", order.id);
            }
            next.orders.push(order.clone());
        }
        *self = next;
        Ok(())
    }

    fn apply_holding_write(&mut self, write: &HoldingWrite) -> Result<()> {
        match write {
            HoldingWrite::Save(holding) => {
                if holding.quantity.is_sign_negative() || holding.average_cost.is_sign_negative() {
                    bail!("holding {} would have negative quantity or cost", holding.id);
                }
                let duplicate = self.holdings.iter().any(|h| {
                    h.id != holding.id
                        && h.owner_id == holding.owner_id
                        && h.instrument_id == holding.instrument_id
                });
                if duplicate {
                    bail!(
                        "owner {} already holds instrument {}",
                        holding.owner_id,
                        holding.instrument_id
                    );
                }
                match self.holdings.iter_mut().find(|h| h.id == holding.id) {
                    Some(existing) => *existing = holding.clone(),
                    None => self.holdings.push(holding.clone()),
                }
            }
            HoldingWrite::Delete(id) => {
                let before = self.holdings.len();
                self.holdings.retain(|h| h.id != *id);
                if self.holdings.len() == before {
                    bail!("holding {id} does not exist");
                }
            }
        }
        Ok(())
    }

    /// Orders for a holding, newest first; later insertions win timestamp ties.
    pub fn list_orders(&self, holding_id: &Id) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .rev()
            .filter(|o| o.holding_id == *holding_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        orders
    }
}
