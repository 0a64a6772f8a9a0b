use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;
use crate::error::PortfolioError;

/// Unique instrument code, always trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentCode(String);

impl InstrumentCode {
    pub fn parse(value: &str) -> Result<Self, PortfolioError> {
        let normalized = value.trim().to_uppercase();
        if normalized.is_empty() || normalized.chars().any(char::is_whitespace) {
            return Err(PortfolioError::InvalidCode(value.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for InstrumentCode {
    type Error = PortfolioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InstrumentCode> for String {
    fn from(code: InstrumentCode) -> Self {
        code.0
    }
}

impl fmt::Display for InstrumentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Fund,
    Stock,
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FUND" => Ok(Self::Fund),
            "STOCK" => Ok(Self::Stock),
            other => Err(format!("unknown category {other:?} (expected FUND or STOCK)")),
        }
    }
}

/// A tracked financial asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: Id,
    pub code: InstrumentCode,
    pub name: String,
    pub category: Category,
    pub created_at: DateTime<Utc>,
}

impl Instrument {
    pub fn new(
        code: InstrumentCode,
        name: impl Into<String>,
        category: Category,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Id::new(),
            code,
            name: name.into(),
            category,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_normalized_upper() {
        let code = InstrumentCode::parse("  tte ").unwrap();
        assert_eq!(code.as_str(), "TTE");
    }

    #[test]
    fn code_rejects_blank_and_inner_whitespace() {
        assert!(matches!(
            InstrumentCode::parse("   "),
            Err(PortfolioError::InvalidCode(_))
        ));
        assert!(InstrumentCode::parse("A B").is_err());
    }

    #[test]
    fn code_deserialization_normalizes() {
        let code: InstrumentCode = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(code.as_str(), "ABC");
    }

    #[test]
    fn category_serializes_upper() {
        assert_eq!(serde_json::to_string(&Category::Fund).unwrap(), r#""FUND""#);
        assert_eq!("stock".parse::<Category>().unwrap(), Category::Stock);
        assert!("bond".parse::<Category>().is_err());
    }
}
