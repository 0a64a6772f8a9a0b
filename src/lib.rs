pub mod app;
pub mod clock;
pub mod config;
pub mod duration;
pub mod error;
pub mod format;
pub mod ingest;
pub mod ledger;
pub mod market_data;
pub mod models;
pub mod staleness;
pub mod storage;
pub mod valuation;
