//! Order and position ledger.

mod position;
mod service;

pub use position::{
    apply_order, apply_transaction, weighted_average_cost, OrderEffect, OrderRequest,
    TransactionEffect,
};
pub use service::LedgerService;
