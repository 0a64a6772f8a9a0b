//! Portfolio value history rebuilt from stored quotes.
//!
//! Positions are taken as constant over the whole series: the current
//! quantity and average cost are applied to every past day.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Id, Quote};

/// Quantity and cost of one instrument, applied to every day of the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub instrument_id: Id,
    pub quantity: Decimal,
    pub average_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub total_profit: Decimal,
}

/// One point per distinct quote day, ascending.
///
/// Each instrument carries its last seen price forward into days without a
/// quote, and contributes nothing before its first quote. Within a day the
/// last quote in timestamp order wins.
pub fn reconstruct_history(quotes: &[Quote], positions: &[PositionSnapshot]) -> Vec<HistoryPoint> {
    let mut days: BTreeMap<NaiveDate, Vec<&Quote>> = BTreeMap::new();
    for quote in quotes {
        days.entry(quote.day()).or_default().push(quote);
    }

    let mut last_price: HashMap<&Id, Decimal> = HashMap::new();
    let mut points = Vec::with_capacity(days.len());

    for (date, mut day_quotes) in days {
        // Stable, so equal timestamps keep input order.
        day_quotes.sort_by_key(|q| q.timestamp);
        for quote in day_quotes {
            last_price.insert(&quote.instrument_id, quote.price);
        }

        let mut total_value = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;
        for position in positions {
            let Some(price) = last_price.get(&position.instrument_id) else {
                continue;
            };
            total_value += position.quantity * *price;
            total_cost += position.quantity * position.average_cost;
        }

        points.push(HistoryPoint {
            date,
            total_value,
            total_cost,
            total_profit: total_value - total_cost,
        });
    }

    points
}
