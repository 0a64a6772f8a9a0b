use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::upsert::{day_bounds, DailyQuoteIndex, UpsertDecision};
use crate::clock::{Clock, SystemClock};
use crate::error::FetchFailure;
use crate::market_data::QuoteSource;
use crate::models::{Category, Id, InstrumentCode, QuoteWrite};
use crate::staleness::{check_quote_staleness, log_quote_staleness, prioritize};
use crate::storage::Storage;

/// Default freshness window: instruments quoted within the last hour are skipped.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60 * 60);

/// What happened to one instrument during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstrumentStatus {
    Inserted {
        price: Decimal,
    },
    Updated {
        price: Decimal,
        previous_price: Decimal,
    },
    Unchanged {
        price: Decimal,
    },
    SkippedFresh {
        last_updated: DateTime<Utc>,
    },
    Failed {
        attempts: u32,
        kind: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentOutcome {
    pub code: InstrumentCode,
    #[serde(flatten)]
    pub status: InstrumentStatus,
}

/// Summary of one ingestion run, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionReport {
    pub outcomes: Vec<InstrumentOutcome>,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped_fresh: usize,
    pub failed: usize,
}

impl IngestionReport {
    fn push(&mut self, code: InstrumentCode, status: InstrumentStatus) {
        match &status {
            InstrumentStatus::Inserted { .. } => self.inserted += 1,
            InstrumentStatus::Updated { .. } => self.updated += 1,
            InstrumentStatus::Unchanged { .. } => self.unchanged += 1,
            InstrumentStatus::SkippedFresh { .. } => self.skipped_fresh += 1,
            InstrumentStatus::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(InstrumentOutcome { code, status });
    }

    /// Quotes created by this run.
    pub fn new_records(&self) -> usize {
        self.inserted
    }

    pub fn outcome(&self, code: &str) -> Option<&InstrumentStatus> {
        self.outcomes
            .iter()
            .find(|o| o.code.as_str() == code)
            .map(|o| &o.status)
    }
}

/// Refreshes current prices for every fund, stalest first.
///
/// Instruments are fetched one at a time through a single [`QuoteSource`].
/// All writes from a run are committed together at the end; a failed commit
/// leaves the store exactly as it was.
pub struct IngestionCoordinator {
    storage: Arc<dyn Storage>,
    source: Arc<dyn QuoteSource>,
    freshness_window: Duration,
    category: Category,
    clock: Arc<dyn Clock>,
}

impl IngestionCoordinator {
    pub fn new(storage: Arc<dyn Storage>, source: Arc<dyn QuoteSource>) -> Self {
        Self {
            storage,
            source,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            category: Category::Fund,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Run ingestion now.
    pub async fn run(&self) -> Result<IngestionReport> {
        let mut report = IngestionReport::default();
        let started = self.clock.now();

        let candidates = prioritize(
            self.storage
                .latest_quote_times(self.category)
                .await
                .context("Failed to load instruments for ingestion")?,
        );

        let mut stale = Vec::new();
        for (instrument, last_updated) in candidates {
            let check = check_quote_staleness(last_updated, started, self.freshness_window);
            log_quote_staleness(instrument.code.as_str(), &check);
            match last_updated {
                Some(at) if !check.is_stale => {
                    report.push(
                        instrument.code,
                        InstrumentStatus::SkippedFresh { last_updated: at },
                    );
                }
                _ => stale.push(instrument),
            }
        }

        if stale.is_empty() {
            info!(
                skipped_fresh = report.skipped_fresh,
                "ingestion run: nothing to refresh"
            );
            return Ok(report);
        }

        if let Err(e) = self.source.warm_up().await {
            warn!(source = self.source.name(), error = %e, "session warm-up failed; continuing");
        }

        let ids: Vec<Id> = stale.iter().map(|i| i.id.clone()).collect();
        let mut index = DailyQuoteIndex::default();
        let mut writes: Vec<QuoteWrite> = Vec::new();
        for instrument in stale {
            let outcome = self.source.fetch_quote(&instrument.code).await;
            let status = match outcome.result {
                Ok(price) => {
                    // Each quote is keyed by the UTC day it was fetched on.
                    let fetched_at = self.clock.now();
                    self.ensure_day_loaded(&mut index, &ids, fetched_at).await?;
                    let decision = index.plan(&instrument.id, price, fetched_at);
                    let status = match &decision {
                        UpsertDecision::Insert(_) => InstrumentStatus::Inserted { price },
                        UpsertDecision::Update { previous_price, .. } => {
                            InstrumentStatus::Updated {
                                price,
                                previous_price: *previous_price,
                            }
                        }
                        UpsertDecision::Unchanged(_) => InstrumentStatus::Unchanged { price },
                    };
                    writes.extend(decision.into_write());
                    info!(
                        instrument = %instrument.code,
                        attempts = outcome.attempts,
                        price = %price,
                        ?status,
                        "quote fetched"
                    );
                    status
                }
                Err(failure) => {
                    warn!(
                        instrument = %instrument.code,
                        attempts = outcome.attempts,
                        kind = failure.kind(),
                        error = %failure,
                        "quote fetch failed; skipping instrument for this run"
                    );
                    failed_status(outcome.attempts, &failure)
                }
            };
            report.push(instrument.code, status);
        }

        if let Err(e) = self.storage.commit_quotes(&writes).await {
            error!(writes = writes.len(), error = %e, "quote commit failed; run rolled back");
            return Err(e.context("Failed to commit ingested quotes"));
        }

        info!(
            new_records = report.new_records(),
            updated = report.updated,
            unchanged = report.unchanged,
            skipped_fresh = report.skipped_fresh,
            failed = report.failed,
            "ingestion run complete"
        );
        Ok(report)
    }

    async fn ensure_day_loaded(
        &self,
        index: &mut DailyQuoteIndex,
        ids: &[Id],
        at: DateTime<Utc>,
    ) -> Result<()> {
        let day = at.date_naive();
        if index.covers(day) {
            return Ok(());
        }
        let (from, to) = day_bounds(day);
        let quotes = self
            .storage
            .quotes_in_range(ids, from, to)
            .await
            .with_context(|| format!("Failed to load quotes for {day}"))?;
        debug!(%day, existing = quotes.len(), "loaded daily quote snapshot");
        index.load_day(day, quotes);
        Ok(())
    }
}

fn failed_status(attempts: u32, failure: &FetchFailure) -> InstrumentStatus {
    InstrumentStatus::Failed {
        attempts,
        kind: failure.kind().to_string(),
        error: failure.to_string(),
    }
}
