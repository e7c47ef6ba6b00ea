//! Writing transactions out as CSV or JSON.

use std::{fmt::Display, io::Write, str::FromStr};

use serde::Serialize;

use crate::{Error, transaction::Transaction};

/// A file format for [write_records].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma separated values with a header row. Tags are joined with ", ".
    Csv,
    /// A pretty-printed JSON array of transactions.
    Json,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unsupported export format \"{other}\", expected csv or json"
            )),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => f.write_str("csv"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// A flat row for CSV, which cannot hold nested lists.
#[derive(Serialize)]
struct CsvRow<'a> {
    id: i64,
    date: String,
    account_id: i64,
    account: &'a str,
    payee: &'a str,
    category: &'a str,
    notes: &'a str,
    kind: &'static str,
    amount: String,
    tags: String,
}

impl<'a> From<&'a Transaction> for CsvRow<'a> {
    fn from(transaction: &'a Transaction) -> Self {
        Self {
            id: transaction.id,
            date: transaction.date.to_string(),
            account_id: transaction.account_id,
            account: transaction.account_name.as_deref().unwrap_or_default(),
            payee: transaction.payee.as_deref().unwrap_or_default(),
            category: transaction.category.as_deref().unwrap_or_default(),
            notes: transaction.notes.as_deref().unwrap_or_default(),
            kind: transaction.kind.as_code(),
            amount: transaction.amount.to_string(),
            tags: transaction.tag_string(),
        }
    }
}

/// Write `records` to `writer` in `format`.
///
/// # Errors
/// Returns [Error::ExportError] if a record cannot be serialised or the
/// writer fails.
pub fn write_records<W: Write>(
    records: &[Transaction],
    format: ExportFormat,
    mut writer: W,
) -> Result<(), Error> {
    match format {
        ExportFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(writer);
            for transaction in records {
                csv_writer
                    .serialize(CsvRow::from(transaction))
                    .map_err(|error| Error::ExportError(error.to_string()))?;
            }
            csv_writer
                .flush()
                .map_err(|error| Error::ExportError(error.to_string()))
        }
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, records)
                .map_err(|error| Error::ExportError(error.to_string()))?;
            writeln!(writer).map_err(|error| Error::ExportError(error.to_string()))
        }
    }
}
