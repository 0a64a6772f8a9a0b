//! Quote page parsing.
//!
//! The scraped page is an external contract that can change without notice,
//! so parsing sits behind [`QuotePageParser`] and every mismatch is reported
//! as a [`FetchFailure`] instead of an error that could stop ingestion.

use anyhow::{anyhow, bail, Result};
use rust_decimal::Decimal;
use scraper::{Html, Selector};

use crate::error::FetchFailure;
use crate::format::parse_locale_decimal;

/// Markers that identify a bot-detection page instead of a quote page.
pub const DEFAULT_BLOCK_MARKERS: &[&str] = &["captcha", "support id"];

pub trait QuotePageParser: Send + Sync {
    /// Returns the first block marker found in the body, if any.
    fn detect_block(&self, body: &str) -> Option<String>;

    /// Extracts a positive price from a quote page.
    fn parse_price(&self, body: &str) -> Result<Decimal, FetchFailure>;
}

/// Reads the price from the first item of a `<ul class="{list_class}">`
/// list: the text of the first `<{value_element}>` inside that item.
pub struct TopListPageParser {
    list: Selector,
    item: Selector,
    value: Selector,
    list_class: String,
    block_markers: Vec<String>,
}

impl TopListPageParser {
    pub fn new(list_class: &str, value_element: &str, block_markers: &[String]) -> Result<Self> {
        let list_class = list_class.trim();
        let value_element = value_element.trim();
        if list_class.is_empty() || list_class.contains(char::is_whitespace) {
            bail!("list class must be a single non-empty CSS class, got {list_class:?}");
        }
        if value_element.is_empty() {
            bail!("value element must not be empty");
        }

        Ok(Self {
            list: parse_selector(&format!("ul.{list_class}"))?,
            item: parse_selector("li")?,
            value: parse_selector(value_element)?,
            list_class: list_class.to_string(),
            block_markers: block_markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        })
    }

    /// `ul.top-list > li:first > span:first`, with the default block markers.
    pub fn standard() -> Result<Self> {
        let markers: Vec<String> = DEFAULT_BLOCK_MARKERS.iter().map(|m| m.to_string()).collect();
        Self::new("top-list", "span", &markers)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("invalid selector {selector:?}: {e:?}"))
}

impl QuotePageParser for TopListPageParser {
    fn detect_block(&self, body: &str) -> Option<String> {
        let haystack = body.to_lowercase();
        self.block_markers
            .iter()
            .find(|marker| haystack.contains(marker.as_str()))
            .cloned()
    }

    fn parse_price(&self, body: &str) -> Result<Decimal, FetchFailure> {
        let document = Html::parse_document(body);
        let list = document
            .select(&self.list)
            .next()
            .ok_or_else(|| FetchFailure::parse(format!("no ul.{} list on page", self.list_class)))?;
        let item = list
            .select(&self.item)
            .next()
            .ok_or_else(|| FetchFailure::parse("quote list has no items"))?;
        let value = item
            .select(&self.value)
            .next()
            .ok_or_else(|| FetchFailure::parse("first list item has no value element"))?;

        let text: String = value.text().collect();
        let price = parse_locale_decimal(&text)
            .ok_or_else(|| FetchFailure::parse(format!("unparsable price text {:?}", text.trim())))?;

        if price.is_zero() {
            return Err(FetchFailure::ZeroPrice);
        }
        if price.is_sign_negative() {
            return Err(FetchFailure::parse(format!("negative price {price}")));
        }
        Ok(price)
    }
}
