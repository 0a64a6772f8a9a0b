mod attempt;
mod fetcher;
mod page;
mod source;

pub use attempt::{FetchMachine, FetchState};
pub use fetcher::{HttpQuoteFetcher, RetryPolicy, ScrapeTarget, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
pub use page::{QuotePageParser, TopListPageParser, DEFAULT_BLOCK_MARKERS};
pub use source::{FetchOutcome, QuoteSource};
