use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::history::{reconstruct_history, HistoryPoint, PositionSnapshot};
use super::point::{value_position, PositionValuation};
use crate::error::PortfolioError;
use crate::models::{Holding, Id, Instrument, InstrumentCode};
use crate::storage::Storage;

/// A holding joined with its instrument and valued at the latest quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioItem {
    /// `None` when the owner does not hold the instrument.
    pub holding_id: Option<Id>,
    pub instrument_id: Id,
    pub code: InstrumentCode,
    pub name: String,
    #[serde(flatten)]
    pub valuation: PositionValuation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentDetail {
    #[serde(flatten)]
    pub instrument: Instrument,
    /// Ascending by timestamp.
    pub history: Vec<PricePoint>,
}

/// Read-side queries over holdings and quotes.
pub struct PortfolioService {
    storage: Arc<dyn Storage>,
}

impl PortfolioService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Every holding of `owner`, ordered by instrument code.
    pub async fn portfolio(&self, owner: &Id) -> Result<Vec<PortfolioItem>, PortfolioError> {
        let holdings = self.storage.list_holdings(owner).await?;
        let mut items = Vec::with_capacity(holdings.len());
        for holding in holdings {
            let instrument = self
                .storage
                .get_instrument(&holding.instrument_id)
                .await?
                .ok_or_else(|| PortfolioError::AssetNotFound(holding.instrument_id.to_string()))?;
            let latest = self.storage.latest_quote(&instrument.id).await?;
            items.push(item(Some(&holding), &instrument, latest.map(|q| q.price)));
        }
        items.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(items)
    }

    /// A single position. When `owner` does not hold the instrument the
    /// result is an empty position priced at the latest quote (0 if none).
    pub async fn holding(
        &self,
        owner: &Id,
        instrument_id: &Id,
    ) -> Result<PortfolioItem, PortfolioError> {
        let instrument = self
            .storage
            .get_instrument(instrument_id)
            .await?
            .ok_or_else(|| PortfolioError::AssetNotFound(instrument_id.to_string()))?;
        let latest = self
            .storage
            .latest_quote(instrument_id)
            .await?
            .map(|q| q.price);

        match self.storage.get_holding(owner, instrument_id).await? {
            Some(holding) => Ok(item(Some(&holding), &instrument, latest)),
            None => Ok(item(None, &instrument, Some(latest.unwrap_or(Decimal::ZERO)))),
        }
    }

    /// Daily portfolio value over the quote history of everything `owner`
    /// holds, using today's quantities and costs.
    pub async fn history(&self, owner: &Id) -> Result<Vec<HistoryPoint>, PortfolioError> {
        let holdings = self.storage.list_holdings(owner).await?;
        if holdings.is_empty() {
            return Ok(Vec::new());
        }

        let positions: Vec<PositionSnapshot> = holdings
            .into_iter()
            .map(|h| PositionSnapshot {
                instrument_id: h.instrument_id,
                quantity: h.quantity,
                average_cost: h.average_cost,
            })
            .collect();
        let ids: Vec<Id> = positions.iter().map(|p| p.instrument_id.clone()).collect();
        let quotes = self.storage.quote_history(&ids).await?;

        Ok(reconstruct_history(&quotes, &positions))
    }

    pub async fn instrument_detail(
        &self,
        instrument_id: &Id,
    ) -> Result<InstrumentDetail, PortfolioError> {
        let instrument = self
            .storage
            .get_instrument(instrument_id)
            .await?
            .ok_or_else(|| PortfolioError::AssetNotFound(instrument_id.to_string()))?;
        let history = self
            .storage
            .quote_history(std::slice::from_ref(instrument_id))
            .await?
            .into_iter()
            .map(|q| PricePoint {
                timestamp: q.timestamp,
                price: q.price,
            })
            .collect();

        Ok(InstrumentDetail {
            instrument,
            history,
        })
    }

    /// Page through the instrument catalogue.
    pub async fn list_instruments(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Instrument>, PortfolioError> {
        Ok(self
            .storage
            .list_instruments()
            .await?
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }
}

fn item(holding: Option<&Holding>, instrument: &Instrument, price: Option<Decimal>) -> PortfolioItem {
    let (quantity, average_cost) = holding
        .map(|h| (h.quantity, h.average_cost))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));
    PortfolioItem {
        holding_id: holding.map(|h| h.id.clone()),
        instrument_id: instrument.id.clone(),
        code: instrument.code.clone(),
        name: instrument.name.clone(),
        valuation: value_position(quantity, average_cost, price),
    }
}
