//! The MMEX relations this crate reads, and checks against the live schema.

use rusqlite::Connection;
use serde::Serialize;

use crate::Error;

/// Accounts: `ACCOUNTID`, `ACCOUNTNAME`, `ACCOUNTTYPE`, `INITIALBAL`, `STATUS`.
pub const ACCOUNT_TABLE: &str = "ACCOUNTLIST_V1";
/// Transactions for every account.
pub const TRANSACTION_TABLE: &str = "CHECKINGACCOUNT_V1";
/// Payee names referenced by transactions.
pub const PAYEE_TABLE: &str = "PAYEE_V1";
/// Category names referenced by transactions.
pub const CATEGORY_TABLE: &str = "CATEGORY_V1";
/// Tag names. Optional.
pub const TAG_TABLE: &str = "TAG_V1";
/// Links between tags and the rows they tag. Optional.
pub const TAG_LINK_TABLE: &str = "TAGLINK_V1";

/// The relations a store must have to be read at all.
pub const REQUIRED_RELATIONS: [&str; 4] =
    [ACCOUNT_TABLE, TRANSACTION_TABLE, PAYEE_TABLE, CATEGORY_TABLE];

/// The relations whose absence only means that tags are unavailable.
pub const OPTIONAL_RELATIONS: [&str; 2] = [TAG_TABLE, TAG_LINK_TABLE];

/// A table or column named in a "no such table" / "no such column" failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MissingName {
    Table(String),
    Column(String),
}

impl MissingName {
    /// Extract the missing name from a store error, if that is what it is.
    pub(crate) fn from_error(error: &rusqlite::Error) -> Option<Self> {
        let rusqlite::Error::SqliteFailure(_, Some(message)) = error else {
            return None;
        };

        if let Some(name) = message.strip_prefix("no such table: ") {
            return Some(Self::Table(unqualified(name).to_owned()));
        }

        message
            .strip_prefix("no such column: ")
            .map(|name| Self::Column(name.trim().to_owned()))
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Table(name) | Self::Column(name) => name,
        }
    }

    /// Whether this is one of the tag relations that may legitimately be absent.
    pub(crate) fn is_optional_relation(&self) -> bool {
        match self {
            Self::Table(name) => OPTIONAL_RELATIONS
                .iter()
                .any(|optional| optional.eq_ignore_ascii_case(name)),
            Self::Column(_) => false,
        }
    }
}

fn unqualified(name: &str) -> &str {
    let name = name.trim();
    name.rsplit_once('.').map_or(name, |(_, table)| table)
}

/// The outcome of [check_required_relations].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaReport {
    /// Whether both tag relations exist.
    pub tags_available: bool,
}

/// Check that every required relation exists.
///
/// # Errors
/// Returns [Error::SchemaMismatch] naming the first required relation that is
/// missing, or [Error::SqlError] if the schema cannot be read.
pub fn check_required_relations(connection: &Connection) -> Result<SchemaReport, Error> {
    let tables = list_tables(connection)?;
    let has = |relation: &str| tables.iter().any(|t| t.eq_ignore_ascii_case(relation));

    if let Some(missing) = REQUIRED_RELATIONS.iter().find(|relation| !has(relation)) {
        return Err(Error::SchemaMismatch {
            relation: (*missing).to_owned(),
            detail: "required table does not exist".to_owned(),
        });
    }

    Ok(SchemaReport {
        tags_available: OPTIONAL_RELATIONS.iter().all(|relation| has(relation)),
    })
}

/// A table in the store and its column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationInfo {
    /// The table name.
    pub name: String,
    /// The column names in declaration order.
    pub columns: Vec<String>,
}

/// List every table in the store with its columns, ordered by table name.
pub fn describe(connection: &Connection) -> Result<Vec<RelationInfo>, Error> {
    list_tables(connection)?
        .into_iter()
        .map(|name| -> Result<RelationInfo, Error> {
            let columns = connection
                .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?
                .query_map([&name], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;

            Ok(RelationInfo { name, columns })
        })
        .collect()
}

fn list_tables(connection: &Connection) -> Result<Vec<String>, Error> {
    connection
        .prepare(
            "SELECT name FROM sqlite_master \
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
            ORDER BY name",
        )?
        .query_map([], |row| row.get(0))?
        .map(|name| name.map_err(Error::from))
        .collect()
}

/// Whether to create the optional tag relations in [create_tables].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTables {
    /// Create `TAG_V1` and `TAGLINK_V1`.
    Present,
    /// Leave the tag relations out, as older MMEX files do.
    Absent,
}

/// Create the subset of the MMEX schema this crate reads.
///
/// Used to build sample stores and test fixtures; real MMEX files already have
/// these tables.
pub fn create_tables(connection: &Connection, tags: TagTables) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS ACCOUNTLIST_V1 (
            ACCOUNTID INTEGER PRIMARY KEY,
            ACCOUNTNAME TEXT NOT NULL COLLATE NOCASE,
            ACCOUNTTYPE TEXT NOT NULL,
            INITIALBAL NUMERIC,
            STATUS TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS PAYEE_V1 (
            PAYEEID INTEGER PRIMARY KEY,
            PAYEENAME TEXT NOT NULL COLLATE NOCASE
        );

        CREATE TABLE IF NOT EXISTS CATEGORY_V1 (
            CATEGID INTEGER PRIMARY KEY,
            CATEGNAME TEXT NOT NULL COLLATE NOCASE,
            PARENTID INTEGER
        );

        CREATE TABLE IF NOT EXISTS CHECKINGACCOUNT_V1 (
            TRANSID INTEGER PRIMARY KEY,
            ACCOUNTID INTEGER NOT NULL,
            TOACCOUNTID INTEGER,
            PAYEEID INTEGER NOT NULL,
            TRANSCODE TEXT NOT NULL,
            TRANSAMOUNT NUMERIC NOT NULL,
            TOTRANSAMOUNT NUMERIC,
            STATUS TEXT,
            TRANSACTIONNUMBER TEXT,
            NOTES TEXT,
            CATEGID INTEGER,
            TRANSDATE TEXT,
            DELETEDTIME TEXT
        );

        CREATE INDEX IF NOT EXISTS IDX_CHECKINGACCOUNT_ACCOUNT
            ON CHECKINGACCOUNT_V1 (ACCOUNTID, TRANSDATE);",
    )?;

    if tags == TagTables::Present {
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS TAG_V1 (
                TAGID INTEGER PRIMARY KEY,
                TAGNAME TEXT NOT NULL UNIQUE COLLATE NOCASE
            );

            CREATE TABLE IF NOT EXISTS TAGLINK_V1 (
                TAGLINKID INTEGER PRIMARY KEY,
                REFTYPE TEXT NOT NULL,
                REFID INTEGER NOT NULL,
                TAGID INTEGER NOT NULL,
                UNIQUE(REFTYPE, REFID, TAGID)
            );",
        )?;
    }

    Ok(())
}
