//! Periodic quote ingestion.

mod coordinator;
mod upsert;

pub use coordinator::{
    IngestionCoordinator, IngestionReport, InstrumentOutcome, InstrumentStatus,
    DEFAULT_FRESHNESS_WINDOW,
};
pub use upsert::{DailyQuoteIndex, UpsertDecision};
