//! HTTP scraper for a public quote page.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::attempt::{FetchMachine, FetchState};
use super::page::QuotePageParser;
use super::source::{FetchOutcome, QuoteSource};
use crate::duration::{deserialize_duration, serialize_duration};
use crate::error::FetchFailure;
use crate::models::InstrumentCode;

pub const DEFAULT_BASE_URL: &str = "https://www.tefas.gov.tr";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Where quote pages live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub base_url: String,
    /// Requested once per run to pick up session cookies.
    pub landing_path: String,
    pub quote_path: String,
    /// Query parameter carrying the instrument code.
    pub code_param: String,
    pub user_agent: String,
}

impl Default for ScrapeTarget {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            landing_path: "/".to_string(),
            quote_path: "/FonAnaliz.aspx".to_string(),
            code_param: "FonKod".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScrapeTarget {
    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_delay_min() -> Duration {
    Duration::from_millis(500)
}

fn default_delay_max() -> Duration {
    Duration::from_secs(2)
}

fn default_delay_step() -> Duration {
    Duration::from_secs(1)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Retry and pacing settings for the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,

    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub delay_min: Duration,

    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub delay_max: Duration,

    /// Added to the delay once per retry already made.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub delay_step: Duration,

    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_min: default_delay_min(),
            delay_max: default_delay_max(),
            delay_step: default_delay_step(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl RetryPolicy {
    /// No pacing at all. Handy for tests against a local server.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            delay_step: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay inserted before an attempt, given how many retries came before it.
    pub fn delay_before(&self, retries: u32) -> Duration {
        let base = if self.delay_max > self.delay_min {
            rand::thread_rng().gen_range(self.delay_min..=self.delay_max)
        } else {
            self.delay_min
        };
        base.saturating_add(self.delay_step.saturating_mul(retries))
    }
}

/// Scrapes one quote page per instrument, retrying through [`FetchMachine`].
///
/// Requests are sequential and share one cookie jar, so a single fetcher
/// should not be driven from several tasks at once.
pub struct HttpQuoteFetcher {
    client: reqwest::Client,
    target: ScrapeTarget,
    retry: RetryPolicy,
    parser: Arc<dyn QuotePageParser>,
}

impl HttpQuoteFetcher {
    pub fn new(
        target: ScrapeTarget,
        retry: RetryPolicy,
        parser: Arc<dyn QuotePageParser>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(target.user_agent.clone())
            .default_headers(headers)
            .timeout(retry.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            target,
            retry,
            parser,
        })
    }

    pub fn target(&self) -> &ScrapeTarget {
        &self.target
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// One request, classified.
    async fn attempt(&self, code: &InstrumentCode) -> Result<Decimal, FetchFailure> {
        let response = self
            .client
            .get(self.target.url(&self.target.quote_path))
            .query(&[(self.target.code_param.as_str(), code.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Block pages are sometimes served with an error status.
        if let Some(marker) = self.parser.detect_block(&body) {
            return Err(FetchFailure::blocked(marker));
        }
        if !status.is_success() {
            return Err(FetchFailure::network(format!("HTTP {status}")));
        }

        self.parser.parse_price(&body)
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteFetcher {
    fn name(&self) -> &str {
        "http-scraper"
    }

    async fn warm_up(&self) -> Result<()> {
        let url = self.target.url(&self.target.landing_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Warm-up request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Warm-up request to {url} returned HTTP {status}");
        }
        debug!(url = %url, "session warmed up");
        Ok(())
    }

    async fn fetch_quote(&self, code: &InstrumentCode) -> FetchOutcome {
        let mut machine = FetchMachine::new(self.retry.max_attempts);
        let max_attempts = machine.max_attempts();

        while let Some(attempt) = machine.begin_attempt() {
            let delay = self.retry.delay_before(attempt - 1);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let result = self.attempt(code).await;
            match machine.record(result) {
                FetchState::Success { price, .. } => {
                    debug!(code = %code, attempt, price = %price, "quote fetched");
                }
                FetchState::Retrying { last, .. } => {
                    debug!(
                        code = %code,
                        attempt,
                        max_attempts,
                        failure = last.kind(),
                        error = %last,
                        "fetch attempt failed, retrying"
                    );
                }
                FetchState::Exhausted { last, .. } => {
                    warn!(
                        code = %code,
                        attempts = attempt,
                        failure = last.kind(),
                        error = %last,
                        "giving up on instrument"
                    );
                }
                FetchState::Pending | FetchState::Fetching { .. } => {}
            }
        }

        let attempts = machine.attempts();
        match machine.outcome() {
            Some(Ok(price)) => FetchOutcome::success(code.clone(), attempts, price),
            Some(Err(last)) => FetchOutcome::exhausted(code.clone(), attempts, last),
            None => FetchOutcome::exhausted(
                code.clone(),
                attempts,
                FetchFailure::network("fetch loop ended without an outcome"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly_with_retries() {
        let policy = RetryPolicy {
            delay_min: Duration::from_millis(500),
            delay_max: Duration::from_millis(500),
            delay_step: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_before(0), Duration::from_millis(500));
        assert_eq!(policy.delay_before(3), Duration::from_millis(3500));
    }

    #[test]
    fn delay_stays_within_jitter_range() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay_before(0);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_secs(2));
        }
        let delay = policy.delay_before(2);
        assert!(delay >= Duration::from_millis(2500));
        assert!(delay <= Duration::from_secs(4));
    }

    #[test]
    fn inverted_range_uses_minimum() {
        let policy = RetryPolicy {
            delay_min: Duration::from_secs(3),
            delay_max: Duration::from_secs(1),
            delay_step: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_before(5), Duration::from_secs(3));
    }

    #[test]
    fn policy_reads_humanized_durations() {
        let policy: RetryPolicy = toml::from_str(
            r#"
max_attempts = 4
delay_min = "250ms"
delay_step = "2s"
"#,
        )
        .unwrap();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_min, Duration::from_millis(250));
        assert_eq!(policy.delay_max, Duration::from_secs(2));
        assert_eq!(policy.delay_step, Duration::from_secs(2));
        assert_eq!(policy.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn target_joins_paths() {
        let target = ScrapeTarget {
            base_url: "http://127.0.0.1:9000/".to_string(),
            ..ScrapeTarget::default()
        };
        assert_eq!(
            target.url(&target.quote_path),
            "http://127.0.0.1:9000/FonAnaliz.aspx"
        );
        assert_eq!(target.url("landing"), "http://127.0.0.1:9000/landing");
    }
}
