//! Writes fixture data into an MMEX-schema store.
//!
//! The reading side of this crate never modifies a store. These helpers exist
//! to build sample databases for manual testing and the fixtures used by the
//! test suite.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::{
    Error,
    database_id::{AccountId, TransactionId},
    schema::{TagTables, create_tables},
    transaction::TransactionKind,
};

/// A transaction to insert with [insert_transaction].
///
/// To create a new `NewTransaction`, use [NewTransaction::build].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction<'a> {
    /// The owning account.
    pub account_id: AccountId,
    /// The raw `TRANSDATE` text, e.g. `2024-01-05` or `2024-01-05T18:30:00`.
    pub date: &'a str,
    /// The transaction code.
    pub kind: TransactionKind,
    /// The unsigned amount, as MMEX stores it. The sign comes from `kind`.
    pub amount: Decimal,
    /// The payee name, created on first use.
    pub payee: Option<&'a str>,
    /// The category name, created on first use.
    pub category: Option<&'a str>,
    /// Free-form notes.
    pub notes: Option<&'a str>,
    /// Tag names, created on first use. Requires the tag tables.
    pub tags: &'a [&'a str],
    /// The account a transfer pays into.
    pub to_account: Option<AccountId>,
    /// The amount the receiving account gets, if it differs from `amount`.
    pub to_amount: Option<Decimal>,
}

impl<'a> NewTransaction<'a> {
    /// Start building a transaction with no payee, category, notes or tags.
    pub fn build(
        account_id: AccountId,
        date: &'a str,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Self {
        Self {
            account_id,
            date,
            kind,
            amount,
            payee: None,
            category: None,
            notes: None,
            tags: &[],
            to_account: None,
            to_amount: None,
        }
    }

    /// Set the payee name.
    pub fn payee(mut self, payee: &'a str) -> Self {
        self.payee = Some(payee);
        self
    }

    /// Set the category name.
    pub fn category(mut self, category: &'a str) -> Self {
        self.category = Some(category);
        self
    }

    /// Set the notes.
    pub fn notes(mut self, notes: &'a str) -> Self {
        self.notes = Some(notes);
        self
    }

    /// Set the account a transfer pays into.
    pub fn to_account(mut self, account_id: AccountId) -> Self {
        self.to_account = Some(account_id);
        self
    }

    /// Set the amount the receiving account gets, e.g. after a currency
    /// conversion.
    pub fn to_amount(mut self, amount: Decimal) -> Self {
        self.to_amount = Some(amount);
        self
    }

    /// Set the tag names.
    pub fn tags(mut self, tags: &'a [&'a str]) -> Self {
        self.tags = tags;
        self
    }
}

/// Insert an account.
pub fn insert_account(
    id: AccountId,
    name: &str,
    account_type: &str,
    initial_balance: Decimal,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO ACCOUNTLIST_V1 (ACCOUNTID, ACCOUNTNAME, ACCOUNTTYPE, INITIALBAL, STATUS)
         VALUES (?1, ?2, ?3, ?4, 'Open')",
        (id, name, account_type, initial_balance.to_string()),
    )?;

    Ok(())
}

/// Insert a transaction, creating its payee, category and tags as needed.
///
/// A transfer is one row: `ACCOUNTID` pays and `TOACCOUNTID` receives.
pub fn insert_transaction(
    transaction: &NewTransaction,
    connection: &Connection,
) -> Result<TransactionId, Error> {
    // MMEX uses -1 for "no payee" and "no category".
    let payee_id = match transaction.payee {
        Some(name) => get_or_create(connection, "PAYEE_V1", "PAYEEID", "PAYEENAME", name)?,
        None => -1,
    };
    let category_id = match transaction.category {
        Some(name) => get_or_create(connection, "CATEGORY_V1", "CATEGID", "CATEGNAME", name)?,
        None => -1,
    };

    connection.execute(
        "INSERT INTO CHECKINGACCOUNT_V1
            (ACCOUNTID, TOACCOUNTID, PAYEEID, TRANSCODE, TRANSAMOUNT, TOTRANSAMOUNT, STATUS,
             NOTES, CATEGID, TRANSDATE, DELETEDTIME)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, '', ?7, ?8, ?9, '')",
        (
            transaction.account_id,
            transaction.to_account.unwrap_or(-1),
            payee_id,
            transaction.kind.as_code(),
            transaction.amount.abs().to_string(),
            transaction.to_amount.unwrap_or(transaction.amount).abs().to_string(),
            transaction.notes,
            category_id,
            transaction.date,
        ),
    )?;
    let id = connection.last_insert_rowid();

    for tag in transaction.tags {
        let tag_id = get_or_create(connection, "TAG_V1", "TAGID", "TAGNAME", tag)?;
        connection.execute(
            "INSERT OR IGNORE INTO TAGLINK_V1 (REFTYPE, REFID, TAGID)
             VALUES ('Transaction', ?1, ?2)",
            (id, tag_id),
        )?;
    }

    Ok(id)
}

/// Mark a transaction as deleted the way MMEX does, by setting `DELETEDTIME`.
pub fn soft_delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE CHECKINGACCOUNT_V1 SET DELETEDTIME = '2025-01-01T00:00:00' WHERE TRANSID = ?1",
        [id],
    )?;

    Ok(())
}

fn get_or_create(
    connection: &Connection,
    table: &str,
    id_column: &str,
    name_column: &str,
    name: &str,
) -> Result<i64, Error> {
    let existing = connection
        .query_row(
            &format!("SELECT {id_column} FROM {table} WHERE {name_column} = ?1"),
            [name],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    connection.execute(
        &format!("INSERT INTO {table} ({name_column}) VALUES (?1)"),
        [name],
    )?;

    Ok(connection.last_insert_rowid())
}

/// Create a new database file at `path` holding a few accounts and a quarter's
/// worth of transactions.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn create_sample_database(path: &Path, tags: TagTables) -> Result<(), Error> {
    let mut connection = Connection::open(path)?;
    create_tables(&connection, tags)?;

    let tx = connection.transaction()?;
    populate(&tx, tags)?;
    tx.commit()?;

    Ok(())
}

fn populate(connection: &Connection, tags: TagTables) -> Result<(), Error> {
    use TransactionKind::{Deposit, Transfer, Withdrawal};

    insert_account(1, "Everyday", "Checking", Decimal::new(150000, 2), connection)?;
    insert_account(2, "Savings", "Savings", Decimal::new(1000000, 2), connection)?;
    insert_account(3, "Visa", "Credit Card", Decimal::ZERO, connection)?;

    let tagged = |names: &'static [&'static str]| -> &'static [&'static str] {
        match tags {
            TagTables::Present => names,
            TagTables::Absent => &[],
        }
    };

    for month in 1..=3 {
        let first = format!("2025-{month:02}-01");
        let mid = format!("2025-{month:02}-15");
        let late = format!("2025-{month:02}-27T18:30:00");

        insert_transaction(
            &NewTransaction::build(1, &first, Deposit, Decimal::new(420000, 2))
                .payee("Employer Ltd")
                .category("Salary")
                .tags(tagged(&["income"])),
            connection,
        )?;
        insert_transaction(
            &NewTransaction::build(1, &first, Withdrawal, Decimal::new(185000, 2))
                .payee("Landlord")
                .category("Rent")
                .notes("Monthly rent")
                .tags(tagged(&["housing", "fixed"])),
            connection,
        )?;
        insert_transaction(
            &NewTransaction::build(1, &mid, Transfer, Decimal::new(50000, 2))
                .to_account(2)
                .category("Transfer")
                .notes("To savings"),
            connection,
        )?;

        for (week, amount) in [(3, 8745), (10, 10220), (17, 6399), (24, 11850)] {
            let date = format!("2025-{month:02}-{week:02}");
            insert_transaction(
                &NewTransaction::build(3, &date, Withdrawal, Decimal::new(amount, 2))
                    .payee("Supermarket")
                    .category("Groceries")
                    .tags(tagged(&["food", "weekly"])),
                connection,
            )?;
        }

        insert_transaction(
            &NewTransaction::build(1, &late, Withdrawal, Decimal::new(6499, 2))
                .payee("Power Co")
                .category("Utilities")
                .tags(tagged(&["fixed"])),
            connection,
        )?;
    }

    Ok(())
}
