//! The transaction query, with a fallback for stores without tag tables.

use std::{collections::BTreeSet, sync::Arc};

use rusqlite::{Connection, Row, ToSql, types::Type};
use time::Date;

use crate::{
    Error,
    account::account_exists,
    cache::{AccountScope, QueryKey},
    date_range::parse_stored_date,
    money::{from_scaled, scaled_sql},
    schema::{MissingName, TRANSACTION_TABLE},
};

use super::core::{Transaction, TransactionKind, TransactionSet};

/// Rows whose `DELETEDTIME` is unset. MMEX writes an empty string, not `NULL`,
/// for live rows.
pub(crate) const NOT_DELETED: &str = "(t.DELETEDTIME IS NULL OR t.DELETEDTIME = '')";

/// The signed amount in hundredths: deposits are positive, everything else is
/// money leaving the account.
pub(crate) fn signed_amount_sql() -> String {
    format!(
        "CASE t.TRANSCODE WHEN 'Deposit' THEN 1 ELSE -1 END * {}",
        scaled_sql("t.TRANSAMOUNT")
    )
}

/// Which form of the query to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Join the tag relations and aggregate tag names per transaction.
    WithTags,
    /// Leave the tag relations out entirely.
    WithoutTags,
}

/// How the tag join went. A query never falls back more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagJoin {
    Succeeded,
    FellBack,
}

fn build_query(strategy: Strategy, scope: AccountScope) -> String {
    let (tag_column, tag_joins) = match strategy {
        Strategy::WithTags => (
            ", GROUP_CONCAT(DISTINCT tg.TAGNAME)",
            "LEFT JOIN TAGLINK_V1 tl ON tl.REFID = t.TRANSID AND tl.REFTYPE = 'Transaction' \
            LEFT JOIN TAG_V1 tg ON tg.TAGID = tl.TAGID ",
        ),
        Strategy::WithoutTags => ("", ""),
    };
    let account_filter = match scope {
        AccountScope::All => "",
        AccountScope::Account(_) => "AND t.ACCOUNTID = :account ",
    };

    format!(
        "SELECT t.TRANSID, t.TRANSDATE, t.ACCOUNTID, a.ACCOUNTNAME, p.PAYEENAME, c.CATEGNAME, \
        t.NOTES, t.TRANSCODE, {amount}{tag_column} \
        FROM CHECKINGACCOUNT_V1 t \
        LEFT JOIN ACCOUNTLIST_V1 a ON a.ACCOUNTID = t.ACCOUNTID \
        LEFT JOIN PAYEE_V1 p ON p.PAYEEID = t.PAYEEID \
        LEFT JOIN CATEGORY_V1 c ON c.CATEGID = t.CATEGID \
        {tag_joins}\
        WHERE t.TRANSDATE >= :start AND t.TRANSDATE < :end \
        AND {NOT_DELETED} \
        {account_filter}\
        GROUP BY t.TRANSID \
        ORDER BY substr(t.TRANSDATE, 1, 10) ASC, t.TRANSID ASC",
        amount = signed_amount_sql(),
    )
}

/// Get the transactions in the key's date range, optionally limited to one
/// account.
///
/// The query first joins the tag relations. If the store has no tag relations
/// the query runs once more without them and the result is marked as having
/// no tag data. Any other missing relation or column is an error.
///
/// # Errors
/// Returns:
/// - [Error::AccountNotFound] if the key names an account that does not exist,
/// - [Error::SchemaMismatch] if a required relation or column is missing, or a
///   stored value cannot be decoded,
/// - [Error::SqlError] for any other failure.
pub fn list_transactions(key: &QueryKey, connection: &Connection) -> Result<TransactionSet, Error> {
    if let AccountScope::Account(id) = key.account {
        if !account_exists(id, connection)? {
            return Err(Error::AccountNotFound(id));
        }
    }

    let end = key.range.end_exclusive()?;

    let (records, outcome) = match run_query(Strategy::WithTags, key, end, connection) {
        Ok(records) => (records, TagJoin::Succeeded),
        Err(error) => match MissingName::from_error(&error) {
            Some(missing) if missing.is_optional_relation() => {
                tracing::debug!(
                    "tag relation {} is missing, querying without tags",
                    missing.name()
                );
                let records = run_query(Strategy::WithoutTags, key, end, connection)
                    .map_err(query_error)?;
                (records, TagJoin::FellBack)
            }
            _ => return Err(query_error(error)),
        },
    };

    Ok(TransactionSet {
        records: Arc::new(records),
        tags_available: outcome == TagJoin::Succeeded,
    })
}

fn run_query(
    strategy: Strategy,
    key: &QueryKey,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, rusqlite::Error> {
    let query = build_query(strategy, key.account);
    let start = key.range.start().to_string();
    let end = end.to_string();

    let account_id = match key.account {
        AccountScope::All => None,
        AccountScope::Account(id) => Some(id),
    };

    let mut params: Vec<(&str, &dyn ToSql)> = vec![(":start", &start), (":end", &end)];
    if let Some(id) = &account_id {
        params.push((":account", id));
    }

    let with_tags = strategy == Strategy::WithTags;

    connection
        .prepare(&query)?
        .query_map(params.as_slice(), |row| map_row(row, with_tags))?
        .collect()
}

/// Decode failures name the transaction relation rather than a column index.
fn query_error(error: rusqlite::Error) -> Error {
    match error {
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            Error::SchemaMismatch {
                relation: TRANSACTION_TABLE.to_owned(),
                detail: error.to_string(),
            }
        }
        error => Error::from(error),
    }
}

fn map_row(row: &Row, with_tags: bool) -> Result<Transaction, rusqlite::Error> {
    let raw_date: String = row.get(1)?;
    let date = parse_stored_date(&raw_date).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("invalid TRANSDATE \"{raw_date}\"").into(),
        )
    })?;

    let code: String = row.get(7)?;
    let kind = code
        .parse::<TransactionKind>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, error.into()))?;

    let tags = if with_tags {
        split_tags(row.get::<_, Option<String>>(9)?)
    } else {
        Vec::new()
    };

    Ok(Transaction {
        id: row.get(0)?,
        date,
        account_id: row.get(2)?,
        account_name: non_empty(row.get(3)?),
        payee: non_empty(row.get(4)?),
        category: non_empty(row.get(5)?),
        notes: non_empty(row.get(6)?),
        kind,
        amount: from_scaled(row.get(8)?),
        tags,
    })
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty())
}

/// Split a `GROUP_CONCAT` result into sorted, unique tag names.
fn split_tags(concatenated: Option<String>) -> Vec<String> {
    let Some(concatenated) = concatenated else {
        return Vec::new();
    };

    concatenated
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
