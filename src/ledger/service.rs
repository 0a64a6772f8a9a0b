use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use super::position::{apply_order, apply_transaction, OrderRequest, TransactionEffect};
use crate::clock::{Clock, SystemClock};
use crate::error::PortfolioError;
use crate::models::{Category, Holding, HoldingChange, Id, Instrument, InstrumentCode, Order};
use crate::storage::Storage;

/// Write-side operations on instruments, holdings and orders.
///
/// Each mutation reads the current holding, computes the transition and
/// commits it as one atomic storage write. Mutations are serialized so two
/// concurrent orders cannot both read the same starting holding.
pub struct LedgerService {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl LedgerService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn register_instrument(
        &self,
        code: &str,
        name: &str,
        category: Category,
    ) -> Result<Instrument, PortfolioError> {
        let code = InstrumentCode::parse(code)?;
        let instrument = Instrument::new(code, name.trim(), category, self.clock.now());

        let _guard = self.write_lock.lock().await;
        if !self.storage.insert_instrument(&instrument).await? {
            return Err(PortfolioError::AssetAlreadyExists(instrument.code.to_string()));
        }
        info!(code = %instrument.code, id = %instrument.id, "instrument registered");
        Ok(instrument)
    }

    /// Track an instrument without owning it. Returns the existing holding
    /// when there already is one.
    pub async fn add_to_watchlist(
        &self,
        owner: &Id,
        instrument_id: &Id,
    ) -> Result<Holding, PortfolioError> {
        let _guard = self.write_lock.lock().await;
        self.require_instrument(instrument_id).await?;

        if let Some(existing) = self.storage.get_holding(owner, instrument_id).await? {
            return Ok(existing);
        }
        let holding = Holding::empty(owner.clone(), instrument_id.clone());
        self.storage
            .commit_holding(&HoldingChange::save(holding.clone()))
            .await?;
        info!(owner = %owner, instrument = %instrument_id, "added to watchlist");
        Ok(holding)
    }

    /// Raw quantity adjustment. Returns the resulting holding, or `None`
    /// when it was fully liquidated and removed.
    pub async fn record_transaction(
        &self,
        owner: &Id,
        instrument_id: &Id,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Option<Holding>, PortfolioError> {
        let _guard = self.write_lock.lock().await;
        self.require_instrument(instrument_id).await?;

        let existing = self.storage.get_holding(owner, instrument_id).await?;
        let effect = apply_transaction(owner, instrument_id, existing.as_ref(), quantity, price)?;
        match effect {
            TransactionEffect::Save(holding) => {
                self.storage
                    .commit_holding(&HoldingChange::save(holding.clone()))
                    .await?;
                info!(
                    owner = %owner,
                    instrument = %instrument_id,
                    quantity = %holding.quantity,
                    average_cost = %holding.average_cost,
                    "transaction recorded"
                );
                Ok(Some(holding))
            }
            TransactionEffect::Delete(holding) => {
                self.storage
                    .commit_holding(&HoldingChange::delete(holding.id.clone()))
                    .await?;
                info!(owner = %owner, instrument = %instrument_id, "holding liquidated");
                Ok(None)
            }
        }
    }

    /// Execute a buy or sell. The holding update and the order record are
    /// committed together. A buy on an instrument not yet held opens the
    /// holding first.
    pub async fn place_order(
        &self,
        owner: &Id,
        instrument_id: &Id,
        request: OrderRequest,
    ) -> Result<Order, PortfolioError> {
        let _guard = self.write_lock.lock().await;
        self.require_instrument(instrument_id).await?;

        let holding = match self.storage.get_holding(owner, instrument_id).await? {
            Some(holding) => holding,
            None => Holding::empty(owner.clone(), instrument_id.clone()),
        };

        let effect = apply_order(&holding, &request, self.clock.now())?;
        self.storage
            .commit_holding(
                &HoldingChange::save(effect.holding.clone()).with_order(effect.order.clone()),
            )
            .await?;

        info!(
            owner = %owner,
            instrument = %instrument_id,
            side = ?effect.order.side,
            quantity = %effect.order.quantity,
            price = %effect.order.price,
            holding_quantity = %effect.holding.quantity,
            average_cost = %effect.holding.average_cost,
            "order executed"
        );
        Ok(effect.order)
    }

    /// Orders on the owner's holding of `instrument_id`, newest first.
    pub async fn orders(&self, owner: &Id, instrument_id: &Id) -> Result<Vec<Order>, PortfolioError> {
        self.require_instrument(instrument_id).await?;
        match self.storage.get_holding(owner, instrument_id).await? {
            Some(holding) => Ok(self.storage.list_orders(&holding.id).await?),
            None => Ok(Vec::new()),
        }
    }

    async fn require_instrument(&self, instrument_id: &Id) -> Result<Instrument, PortfolioError> {
        self.storage
            .get_instrument(instrument_id)
            .await?
            .ok_or_else(|| PortfolioError::AssetNotFound(instrument_id.to_string()))
    }
}
