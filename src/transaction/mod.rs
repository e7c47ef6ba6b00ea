//! Transactions read from the store.
//!
//! This module contains:
//! - The `Transaction` model and the `TransactionSet` returned by queries
//! - The schema-adaptive query that reads transactions with or without tags

mod core;
mod query;

pub use core::{Transaction, TransactionKind, TransactionSet};
pub use query::list_transactions;

pub(crate) use query::{NOT_DELETED, signed_amount_sql};
