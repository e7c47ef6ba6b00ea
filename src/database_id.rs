//! Database ID type definitions.

/// Alias for the integer type used for `ACCOUNTID`.
pub type AccountId = i64;

/// Alias for the integer type used for `TRANSID`.
pub type TransactionId = i64;
