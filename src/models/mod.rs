mod holding;
mod id;
mod instrument;
mod order;
mod quote;

pub use holding::{Holding, HoldingChange, HoldingWrite};
pub use id::Id;
pub use instrument::{Category, Instrument, InstrumentCode};
pub use order::{Order, OrderSide};
pub use quote::{Quote, QuoteWrite};
