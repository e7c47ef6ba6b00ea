use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    Error,
    database_id::AccountId,
    money::{from_scaled, scaled_sql},
};

/// A bank account, credit card or other MMEX account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The display name of the account.
    pub name: String,
    /// The MMEX account type, e.g. "Checking" or "Credit Card".
    pub account_type: String,
    /// The balance before any transaction was recorded.
    pub initial_balance: Decimal,
    /// "Open" or "Closed".
    pub status: String,
}

fn account_query() -> String {
    format!(
        "SELECT ACCOUNTID, ACCOUNTNAME, ACCOUNTTYPE, {}, STATUS FROM ACCOUNTLIST_V1",
        scaled_sql("INITIALBAL")
    )
}

pub(crate) fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = row.get(0)?;
    let name = row.get(1)?;
    let account_type = row.get::<_, Option<String>>(2)?.unwrap_or_default();
    let initial_balance = from_scaled(row.get(3)?);
    let status = row.get::<_, Option<String>>(4)?.unwrap_or_default();

    Ok(Account {
        id,
        name,
        account_type,
        initial_balance,
        status,
    })
}

/// Get every account ordered by ID.
///
/// # Errors
/// Returns [Error::SchemaMismatch] if the account relation is missing or
/// malformed, or [Error::SqlError] for any other failure.
pub fn list_accounts(connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!("{} ORDER BY ACCOUNTID ASC", account_query()))?
        .query_map([], map_row_to_account)?
        .map(|account| account.map_err(Error::from))
        .collect()
}

/// Get one account.
///
/// # Errors
/// Returns [Error::AccountNotFound] if no account has `id`.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .query_row(
            &format!("{} WHERE ACCOUNTID = ?1", account_query()),
            [id],
            map_row_to_account,
        )
        .optional()?
        .ok_or(Error::AccountNotFound(id))
}

/// Whether an account with `id` exists.
pub(crate) fn account_exists(id: AccountId, connection: &Connection) -> Result<bool, Error> {
    let exists = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM ACCOUNTLIST_V1 WHERE ACCOUNTID = ?1)",
        [id],
        |row| row.get(0),
    )?;

    Ok(exists)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{Error, test_utils::TestStore};

    use super::{account_exists, get_account, list_accounts};

    #[test]
    fn lists_accounts_in_id_order() {
        let store = TestStore::new();
        store.add_account(2, "Savings", dec!(1000));
        store.add_account(1, "Cash", dec!(12.34));

        let accounts = list_accounts(&store.connection()).unwrap();

        let names: Vec<_> = accounts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["Cash", "Savings"]);
        assert_eq!(accounts[0].initial_balance, dec!(12.34));
        assert_eq!(accounts[0].status, "Open");
    }

    #[test]
    fn returns_empty_list_for_empty_store() {
        let store = TestStore::new();

        let accounts = list_accounts(&store.connection()).unwrap();

        assert!(accounts.is_empty());
    }

    #[test]
    fn get_account_returns_account() {
        let store = TestStore::new();
        store.add_account(3, "Visa", Decimal::ZERO);

        let account = get_account(3, &store.connection()).unwrap();

        assert_eq!(account.name, "Visa");
        assert_eq!(account.initial_balance, Decimal::ZERO);
    }

    #[test]
    fn get_account_fails_for_unknown_id() {
        let store = TestStore::new();

        let result = get_account(3, &store.connection());

        assert_eq!(result, Err(Error::AccountNotFound(3)));
    }

    #[test]
    fn null_initial_balance_reads_as_zero() {
        let store = TestStore::new();
        store.execute(
            "INSERT INTO ACCOUNTLIST_V1 (ACCOUNTID, ACCOUNTNAME, ACCOUNTTYPE, INITIALBAL, STATUS)
            VALUES (5, 'Legacy', 'Checking', NULL, 'Closed')",
        );

        let account = get_account(5, &store.connection()).unwrap();

        assert_eq!(account.initial_balance, Decimal::ZERO);
        assert_eq!(account.status, "Closed");
    }

    #[test]
    fn account_exists_checks_id() {
        let store = TestStore::new();
        store.add_account(1, "Cash", Decimal::ZERO);
        let conn = store.connection();

        assert_eq!(account_exists(1, &conn), Ok(true));
        assert_eq!(account_exists(2, &conn), Ok(false));
    }
}
