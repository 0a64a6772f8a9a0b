//! Per-instrument fetch state machine.
//!
//! ```text
//! Pending -> Fetching(1) -> Success
//!                        -> Retrying(1) -> Fetching(2) -> ...
//!                        -> Exhausted            (attempt == max)
//! ```

use rust_decimal::Decimal;

use crate::error::FetchFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    Pending,
    Fetching { attempt: u32 },
    Retrying { attempt: u32, last: FetchFailure },
    Success { attempts: u32, price: Decimal },
    Exhausted { attempts: u32, last: FetchFailure },
}

#[derive(Debug, Clone)]
pub struct FetchMachine {
    state: FetchState,
    max_attempts: u32,
}

impl FetchMachine {
    /// A cap of zero is treated as one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: FetchState::Pending,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> &FetchState {
        &self.state
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            FetchState::Success { .. } | FetchState::Exhausted { .. }
        )
    }

    /// Enter `Fetching` and return the 1-based attempt number, or `None` once
    /// the machine has finished.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        let attempt = match &self.state {
            FetchState::Pending => 1,
            FetchState::Retrying { attempt, .. } => attempt + 1,
            FetchState::Fetching { attempt } => *attempt,
            FetchState::Success { .. } | FetchState::Exhausted { .. } => return None,
        };
        self.state = FetchState::Fetching { attempt };
        Some(attempt)
    }

    /// Record the result of the attempt in flight. Ignored unless fetching.
    pub fn record(&mut self, result: Result<Decimal, FetchFailure>) -> &FetchState {
        let FetchState::Fetching { attempt } = self.state else {
            debug_assert!(false, "record called outside of an attempt: {:?}", self.state);
            return &self.state;
        };

        self.state = match result {
            Ok(price) => FetchState::Success {
                attempts: attempt,
                price,
            },
            Err(last) if attempt >= self.max_attempts => FetchState::Exhausted {
                attempts: attempt,
                last,
            },
            Err(last) => FetchState::Retrying { attempt, last },
        };
        &self.state
    }

    /// Attempts made so far (including one in flight).
    pub fn attempts(&self) -> u32 {
        match &self.state {
            FetchState::Pending => 0,
            FetchState::Fetching { attempt } | FetchState::Retrying { attempt, .. } => *attempt,
            FetchState::Success { attempts, .. } | FetchState::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Final result once finished.
    pub fn outcome(&self) -> Option<Result<Decimal, FetchFailure>> {
        match &self.state {
            FetchState::Success { price, .. } => Some(Ok(*price)),
            FetchState::Exhausted { last, .. } => Some(Err(last.clone())),
            _ => None,
        }
    }
}
