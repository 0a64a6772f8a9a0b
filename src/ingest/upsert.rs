//! Per-day quote upsert planning.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::models::{Id, Quote, QuoteWrite};

/// What to do with a freshly fetched price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertDecision {
    /// No quote for that day yet.
    Insert(Quote),
    /// A quote exists for that day with a different price; overwrite it.
    Update { quote: Quote, previous_price: Decimal },
    /// A quote exists for that day with the same price.
    Unchanged(Quote),
}

impl UpsertDecision {
    pub fn into_write(self) -> Option<QuoteWrite> {
        match self {
            Self::Insert(quote) => Some(QuoteWrite::Insert(quote)),
            Self::Update { quote, .. } => Some(QuoteWrite::Update(quote)),
            Self::Unchanged(_) => None,
        }
    }
}

/// Snapshot of existing quotes keyed by (instrument, day).
///
/// Days are loaded on demand with [`DailyQuoteIndex::load_day`]; a run that
/// crosses midnight loads the new day before planning against it. Planning
/// updates the snapshot with its own decisions, so planning the same
/// instrument and day twice never produces two inserts.
#[derive(Debug, Default, Clone)]
pub struct DailyQuoteIndex {
    by_day: HashMap<(Id, NaiveDate), Quote>,
    loaded_days: HashSet<NaiveDate>,
}

impl DailyQuoteIndex {
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.loaded_days.contains(&day)
    }

    /// Record the stored quotes for `day`. Later timestamps win when the
    /// input holds several quotes for one instrument.
    pub fn load_day(&mut self, day: NaiveDate, quotes: impl IntoIterator<Item = Quote>) {
        self.loaded_days.insert(day);
        for quote in quotes.into_iter().filter(|q| q.day() == day) {
            let key = (quote.instrument_id.clone(), day);
            match self.by_day.get(&key) {
                Some(existing) if existing.timestamp > quote.timestamp => {}
                _ => {
                    self.by_day.insert(key, quote);
                }
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.by_day.len()
    }

    #[cfg(test)]
    fn get(&self, instrument_id: &Id, day: NaiveDate) -> Option<&Quote> {
        self.by_day.get(&(instrument_id.clone(), day))
    }

    pub fn plan(&mut self, instrument_id: &Id, price: Decimal, at: DateTime<Utc>) -> UpsertDecision {
        let key = (instrument_id.clone(), at.date_naive());
        match self.by_day.get_mut(&key) {
            Some(existing) if existing.price == price => UpsertDecision::Unchanged(existing.clone()),
            Some(existing) => {
                let previous_price = existing.price;
                existing.price = price;
                existing.timestamp = at;
                UpsertDecision::Update {
                    quote: existing.clone(),
                    previous_price,
                }
            }
            None => {
                let quote = Quote::new(instrument_id.clone(), at, price);
                self.by_day.insert(key, quote.clone());
                UpsertDecision::Insert(quote)
            }
        }
    }
}

/// `[start, end)` of a UTC calendar day.
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = start
        .checked_add_days(Days::new(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}
