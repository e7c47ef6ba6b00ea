//! In-memory search, filtering, sorting and paging of transaction records.
//!
//! Views never touch the store. They work on a base set, usually a cached
//! [TransactionSet](crate::TransactionSet), and leave it unchanged.

use std::{cmp::Ordering, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{pagination::PageInfo, transaction::Transaction};

/// The field that search text is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchField {
    /// Payee, category, notes or tags.
    #[default]
    All,
    /// The payee name.
    Payee,
    /// The category name.
    Category,
    /// The notes.
    Notes,
    /// Any tag name.
    Tags,
    /// The signed amount as text, e.g. "-20.00", so "-" finds money going out.
    AmountSign,
}

/// Narrows records by the sign of their amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeFilter {
    /// Every record.
    #[default]
    All,
    /// Amounts above zero.
    Positive,
    /// Amounts below zero.
    Negative,
}

/// The column to sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum SortColumn {
    #[default]
    Date,
    Payee,
    Category,
    Notes,
    Tags,
    Amount,
    Account,
    Id,
}

/// The direction to sort in. Ties are always broken in ascending date and ID
/// order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// What the caller wants to see of a base set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    /// Case-insensitive substring to search for. Empty matches everything.
    pub search_text: String,
    /// Where to look for `search_text`.
    pub search_field: SearchField,
    /// Optional restriction by amount sign.
    pub type_filter: TypeFilter,
    /// The column to sort by.
    pub sort_column: SortColumn,
    /// The direction to sort in.
    pub sort_direction: SortDirection,
    /// The 1-based page number. 0 is treated as 1.
    pub page: usize,
    /// Records per page. 0 yields an empty page.
    pub page_size: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            search_field: SearchField::default(),
            type_filter: TypeFilter::default(),
            sort_column: SortColumn::default(),
            sort_direction: SortDirection::default(),
            page: 1,
            page_size: 50,
        }
    }
}

/// One page of a filtered and sorted base set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// The records on the requested page.
    pub records: Vec<Transaction>,
    /// The number of records that matched before paging.
    pub total_matches: usize,
    /// Page arithmetic for rendering page controls.
    pub info: PageInfo,
}

/// Search, filter, sort and page `base` according to `filter`.
///
/// Sorting is stable and ties are broken by date and then ID, so identical
/// calls give identical pages. Asking for a page past the end gives an empty
/// page, not an error.
pub fn apply_view(base: &[Transaction], filter: &FilterState) -> View {
    // Blank text means no search; anything else is matched as given.
    let searching = !filter.search_text.trim().is_empty();
    let needle = filter.search_text.to_lowercase();

    let mut matches: Vec<&Transaction> = base
        .iter()
        .filter(|transaction| matches_type(transaction, filter.type_filter))
        .filter(|transaction| {
            !searching || matches_search(transaction, filter.search_field, &needle)
        })
        .collect();

    matches.sort_by(|a, b| {
        let by_column = compare_column(a, b, filter.sort_column);
        let by_column = match filter.sort_direction {
            SortDirection::Ascending => by_column,
            SortDirection::Descending => by_column.reverse(),
        };

        by_column.then_with(|| (a.date, a.id).cmp(&(b.date, b.id)))
    });

    let info = PageInfo::new(matches.len(), filter.page_size, filter.page);
    let records = matches[info.bounds()]
        .iter()
        .map(|transaction| (*transaction).clone())
        .collect();

    View {
        records,
        total_matches: matches.len(),
        info,
    }
}

fn matches_type(transaction: &Transaction, type_filter: TypeFilter) -> bool {
    match type_filter {
        TypeFilter::All => true,
        TypeFilter::Positive => transaction.amount > Decimal::ZERO,
        TypeFilter::Negative => transaction.amount < Decimal::ZERO,
    }
}

fn matches_search(transaction: &Transaction, field: SearchField, needle: &str) -> bool {
    let contains =
        |text: Option<&str>| text.is_some_and(|text| text.to_lowercase().contains(needle));

    match field {
        SearchField::All => {
            contains(transaction.payee.as_deref())
                || contains(transaction.category.as_deref())
                || contains(transaction.notes.as_deref())
                || contains(Some(transaction.tag_string().as_str()))
        }
        SearchField::Payee => contains(transaction.payee.as_deref()),
        SearchField::Category => contains(transaction.category.as_deref()),
        SearchField::Notes => contains(transaction.notes.as_deref()),
        SearchField::Tags => contains(Some(transaction.tag_string().as_str())),
        SearchField::AmountSign => contains(Some(transaction.amount.to_string().as_str())),
    }
}

/// Missing text sorts before any text.
fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    a.map(str::to_lowercase).cmp(&b.map(str::to_lowercase))
}

fn compare_column(a: &Transaction, b: &Transaction, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Date => a.date.cmp(&b.date),
        SortColumn::Payee => compare_text(a.payee.as_deref(), b.payee.as_deref()),
        SortColumn::Category => compare_text(a.category.as_deref(), b.category.as_deref()),
        SortColumn::Notes => compare_text(a.notes.as_deref(), b.notes.as_deref()),
        SortColumn::Tags => compare_text(
            Some(a.tag_string().as_str()),
            Some(b.tag_string().as_str()),
        ),
        SortColumn::Amount => a.amount.cmp(&b.amount),
        SortColumn::Account => {
            compare_text(a.account_name.as_deref(), b.account_name.as_deref())
        }
        SortColumn::Id => a.id.cmp(&b.id),
    }
}

impl FromStr for SearchField {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "payee" => Ok(Self::Payee),
            "category" => Ok(Self::Category),
            "notes" => Ok(Self::Notes),
            "tags" => Ok(Self::Tags),
            "amount" | "amount-sign" => Ok(Self::AmountSign),
            other => Err(format!(
                "unknown search field \"{other}\", expected one of all, payee, category, notes, tags, amount"
            )),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "positive" | "income" => Ok(Self::Positive),
            "negative" | "expense" => Ok(Self::Negative),
            other => Err(format!(
                "unknown type filter \"{other}\", expected all, positive or negative"
            )),
        }
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "payee" => Ok(Self::Payee),
            "category" => Ok(Self::Category),
            "notes" => Ok(Self::Notes),
            "tags" => Ok(Self::Tags),
            "amount" => Ok(Self::Amount),
            "account" => Ok(Self::Account),
            "id" => Ok(Self::Id),
            other => Err(format!("unknown sort column \"{other}\"")),
        }
    }
}
