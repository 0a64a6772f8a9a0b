//! Position valuation and portfolio history.

mod history;
mod point;
mod service;

pub use history::{reconstruct_history, HistoryPoint, PositionSnapshot};
pub use point::{profit_percent, value_position, PositionValuation};
pub use service::{InstrumentDetail, PortfolioItem, PortfolioService, PricePoint};
