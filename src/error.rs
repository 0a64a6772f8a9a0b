use rust_decimal::Decimal;

/// Domain rejections returned by ledger and valuation operations.
///
/// Each variant is a distinct kind so an API layer can map it to its own
/// response without string matching. Nothing is mutated when one of these is
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum PortfolioError {
    #[error("insufficient quantity: holding has {held}, requested {requested}")]
    InsufficientQuantity { held: Decimal, requested: Decimal },

    #[error("instrument {0} already exists")]
    AssetAlreadyExists(String),

    #[error("no holding for instrument {0}")]
    NoSuchHolding(String),

    #[error("instrument {0} not found")]
    AssetNotFound(String),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("price must be positive, got {0}")]
    InvalidPrice(Decimal),

    #[error("invalid instrument code {0:?}")]
    InvalidCode(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl PortfolioError {
    /// Stable snake_case label for logs and API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientQuantity { .. } => "insufficient_quantity",
            Self::AssetAlreadyExists(_) => "asset_already_exists",
            Self::NoSuchHolding(_) => "no_such_holding",
            Self::AssetNotFound(_) => "asset_not_found",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InvalidPrice(_) => "invalid_price",
            Self::InvalidCode(_) => "invalid_code",
            Self::Storage(_) => "storage",
        }
    }
}

/// Why a single fetch attempt did not produce a usable price.
///
/// All kinds are transient: the fetcher retries them up to its attempt cap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchFailure {
    #[error("blocked by target (marker {marker:?})")]
    Blocked { marker: String },

    #[error("could not parse quote page: {reason}")]
    ParseFailure { reason: String },

    #[error("network error: {reason}")]
    NetworkError { reason: String },

    #[error("target reported a zero price")]
    ZeroPrice,
}

impl FetchFailure {
    pub fn blocked(marker: impl Into<String>) -> Self {
        Self::Blocked {
            marker: marker.into(),
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::ParseFailure {
            reason: reason.into(),
        }
    }

    pub fn network(reason: impl Into<String>) -> Self {
        Self::NetworkError {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Blocked { .. } => "blocked",
            Self::ParseFailure { .. } => "parse_failure",
            Self::NetworkError { .. } => "network_error",
            Self::ZeroPrice => "zero_price",
        }
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Self::NetworkError { reason }
    }
}
