//! Defines the core data models for transactions.

use std::{fmt::Display, str::FromStr, sync::Arc};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::database_id::{AccountId, TransactionId};

// ============================================================================
// MODELS
// ============================================================================

/// An expense, income or transfer recorded against one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// When the transaction happened.
    pub date: Date,
    /// The ID of the account that owns the transaction.
    pub account_id: AccountId,
    /// The display name of the owning account, or `None` if the account no
    /// longer exists.
    pub account_name: Option<String>,
    /// Who was paid or who paid.
    pub payee: Option<String>,
    /// The category name, e.g. "Groceries" or "Rent".
    pub category: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Whether money left, entered or moved between accounts.
    pub kind: TransactionKind,
    /// The signed amount.
    ///
    /// Positive values are money flowing into the account, negative values
    /// are money flowing out. Transfers are negative for the source account.
    pub amount: Decimal,
    /// The tag names attached to the transaction, sorted and de-duplicated.
    ///
    /// Always empty when the store has no tag tables.
    pub tags: Vec<String>,
}

impl Transaction {
    /// The tags joined into one string, e.g. "groceries, weekly".
    pub fn tag_string(&self) -> String {
        self.tags.join(", ")
    }
}

/// The MMEX transaction code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Money spent from the account.
    Withdrawal,
    /// Money received into the account.
    Deposit,
    /// Money moved from the account to another account.
    Transfer,
}

impl TransactionKind {
    /// The `TRANSCODE` value stored by MMEX.
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Withdrawal => "Withdrawal",
            Self::Deposit => "Deposit",
            Self::Transfer => "Transfer",
        }
    }
}

impl Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "Withdrawal" => Ok(Self::Withdrawal),
            "Deposit" => Ok(Self::Deposit),
            "Transfer" => Ok(Self::Transfer),
            other => Err(format!("unknown transaction code \"{other}\"")),
        }
    }
}

/// The transactions for one date range, as returned to callers.
///
/// Records are shared with the cache, so cloning a set is cheap and two sets
/// served from the same cache entry are identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSet {
    /// The records ordered by date and then by ID, both ascending.
    pub records: Arc<Vec<Transaction>>,
    /// Whether tag names were read. `false` means the store has no tag tables,
    /// not that no transaction is tagged.
    pub tags_available: bool,
}

impl TransactionSet {
    /// The number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
