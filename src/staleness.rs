//! Quote staleness detection and refresh ordering.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::Instrument;

/// Result of a staleness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessCheck {
    pub is_stale: bool,
    pub age: Option<Duration>,
    pub threshold: Duration,
}

impl StalenessCheck {
    pub fn stale(age: Duration, threshold: Duration) -> Self {
        Self { is_stale: true, age: Some(age), threshold }
    }

    pub fn fresh(age: Duration, threshold: Duration) -> Self {
        Self { is_stale: false, age: Some(age), threshold }
    }

    pub fn missing(threshold: Duration) -> Self {
        Self { is_stale: true, age: None, threshold }
    }
}

/// An instrument is fresh while its newest quote is younger than `threshold`.
/// A quote timestamped in the future has age zero.
pub fn check_quote_staleness(
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> StalenessCheck {
    match last_updated {
        Some(at) => {
            let age = (now - at).to_std().unwrap_or(Duration::ZERO);
            if age >= threshold {
                StalenessCheck::stale(age, threshold)
            } else {
                StalenessCheck::fresh(age, threshold)
            }
        }
        None => StalenessCheck::missing(threshold),
    }
}

/// Order instruments for refresh: never-updated first, then oldest quote
/// first. Ties keep a stable order by code.
pub fn prioritize(
    mut instruments: Vec<(Instrument, Option<DateTime<Utc>>)>,
) -> Vec<(Instrument, Option<DateTime<Utc>>)> {
    // `None` sorts before `Some`, which is exactly "never updated first".
    instruments.sort_by(|(a, a_at), (b, b_at)| a_at.cmp(b_at).then_with(|| a.code.cmp(&b.code)));
    instruments
}

/// Log staleness check results for one instrument.
pub fn log_quote_staleness(code: &str, check: &StalenessCheck) {
    let status = if check.is_stale { "stale" } else { "fresh" };
    let age_str = check
        .age
        .map(crate::duration::format_duration)
        .unwrap_or_else(|| "never".to_string());
    let threshold_str = crate::duration::format_duration(check.threshold);

    info!(
        instrument = code,
        age = %age_str,
        threshold = %threshold_str,
        status = status,
        "quote staleness check"
    );
}
