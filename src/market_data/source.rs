use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::FetchFailure;
use crate::models::InstrumentCode;

/// Final result of fetching one instrument, after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub code: InstrumentCode,
    pub attempts: u32,
    pub result: Result<Decimal, FetchFailure>,
}

impl FetchOutcome {
    pub fn success(code: InstrumentCode, attempts: u32, price: Decimal) -> Self {
        Self {
            code,
            attempts,
            result: Ok(price),
        }
    }

    pub fn exhausted(code: InstrumentCode, attempts: u32, last: FetchFailure) -> Self {
        Self {
            code,
            attempts,
            result: Err(last),
        }
    }

    pub fn price(&self) -> Option<Decimal> {
        self.result.as_ref().ok().copied()
    }
}

/// Where current prices come from.
///
/// Implementations own their retry policy: `fetch_quote` only returns once
/// the instrument has either a price or an exhausted retry budget.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    /// Prepare the session before a run (cookies, handshakes).
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_quote(&self, code: &InstrumentCode) -> FetchOutcome;
}
