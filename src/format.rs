use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

fn numeric_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"-?[0-9][0-9.]*(?:,[0-9]+)?").expect("static regex is valid"))
}

/// Canonicalize a locale-formatted number ("1.234,567" style: `.` groups
/// thousands, `,` separates decimals) into a [`Decimal`].
///
/// Surrounding text such as a currency suffix is ignored; the first numeric
/// token wins. Returns `None` when no parseable number is present.
pub fn parse_locale_decimal(text: &str) -> Option<Decimal> {
    let token = numeric_token().find(text.trim())?.as_str();
    let canonical = token.replace('.', "").replace(',', ".");
    Decimal::from_str(&canonical).ok()
}

/// Render a monetary value for CLI output.
///
/// When `decimals` is set the value is rounded half away from zero first;
/// trailing zeros are always stripped.
pub fn format_money(value: Decimal, decimals: Option<u32>) -> String {
    let rounded = match decimals {
        Some(dp) => value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        None => value,
    };
    rounded.normalize().to_string()
}
