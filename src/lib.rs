//! Read-only access to Money Manager Ex (MMEX) databases.
//!
//! This library reads accounts and transactions from an MMEX SQLite file and
//! hands them to a caller aggregated, cached and ready to be filtered, sorted
//! and paged in memory. The entry point is [Reader], which is built from a
//! shared [StorePool] and [ResultCache].

#![warn(missing_docs)]

use std::{path::PathBuf, time::Duration};

mod account;
mod background;
mod balance;
mod cache;
mod config;
mod database_id;
mod date_range;
mod export;
mod logging;
mod money;
mod pagination;
mod pool;
mod reader;
pub mod sample;
pub mod schema;
#[cfg(test)]
mod test_utils;
mod transaction;
mod view;

pub use account::{Account, get_account, list_accounts};
pub use background::AsyncReader;
pub use balance::{get_balance, get_balances};
pub use cache::{AccountScope, CacheEntry, CacheStats, QueryKey, ResultCache};
pub use self::config::Config;
pub use database_id::{AccountId, TransactionId};
pub use date_range::{DateRange, parse_date};
pub use export::{ExportFormat, write_records};
pub use logging::init_logging;
pub use money::format_currency;
pub use pagination::PageInfo;
pub use pool::{PoolConfig, PooledConnection, StorePool};
pub use reader::Reader;
pub use transaction::{Transaction, TransactionKind, TransactionSet, list_transactions};
pub use view::{FilterState, SearchField, SortColumn, SortDirection, TypeFilter, View, apply_view};

/// The errors that may occur while reading from the store.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The database file is missing, unreadable or not a SQLite database.
    ///
    /// Fatal to the request. Retrying without changing the path will fail
    /// the same way.
    #[error("the database at {path:?} is unavailable: {reason}")]
    StoreUnavailable {
        /// The path of the database file.
        path: PathBuf,
        /// Why the file could not be used.
        reason: String,
    },

    /// Every pooled connection stayed in use for the whole acquisition timeout.
    ///
    /// This is transient; the caller may retry after backing off.
    #[error("no database connection became free within {timeout:?}")]
    PoolExhausted {
        /// The acquisition timeout that elapsed.
        timeout: Duration,
    },

    /// A required relation (or one of its columns) is missing or holds data
    /// that cannot be read.
    #[error("the relation \"{relation}\" is missing or malformed: {detail}")]
    SchemaMismatch {
        /// The table or column that failed.
        relation: String,
        /// The message from the store or the decoder.
        detail: String,
    },

    /// The start date is after the end date, or a date could not be parsed.
    ///
    /// Rejected before the store is touched.
    #[error("invalid date range {start} to {end}: {reason}")]
    InvalidDateRange {
        /// The requested start date, as given.
        start: String,
        /// The requested end date, as given.
        end: String,
        /// Why the range was rejected.
        reason: String,
    },

    /// No account has the requested ID.
    #[error("account {0} does not exist")]
    AccountNotFound(AccountId),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// The configuration file or an environment override is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Records could not be written in the requested export format.
    #[error("could not export transactions: {0}")]
    ExportError(String),

    /// A worker running a blocking store call panicked or was cancelled.
    #[error("background query failed: {0}")]
    BackgroundTaskFailed(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        if let Some(missing) = schema::MissingName::from_error(&value) {
            return Error::SchemaMismatch {
                relation: missing.name().to_owned(),
                detail: value.to_string(),
            };
        }

        match value {
            rusqlite::Error::FromSqlConversionFailure(index, ..)
            | rusqlite::Error::InvalidColumnType(index, ..) => Error::SchemaMismatch {
                relation: format!("column {index}"),
                detail: value.to_string(),
            },
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
