//! Account balances computed in the store.

use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;
use time::Date;

use crate::{
    Error,
    account::{Account, list_accounts},
    database_id::AccountId,
    money::{from_scaled, scaled_sql},
    transaction::{NOT_DELETED, signed_amount_sql},
};

/// Get the balance of an account as of the end of `as_of`, or across all of
/// its transactions if `as_of` is `None`.
///
/// The balance is the account's initial balance plus the signed amounts of its
/// transactions up to and including `as_of`, plus the transfers it received in
/// that time. MMEX stores a transfer as a single row on the paying account, so
/// the receiving side is credited from `TOACCOUNTID` and `TOTRANSAMOUNT`
/// (or `TRANSAMOUNT` when that is unset). The sum is taken in the store
/// over amounts scaled to whole hundredths, so it is exact no matter how many
/// transactions there are.
///
/// # Errors
/// Returns:
/// - [Error::AccountNotFound] if no account has `account_id`,
/// - [Error::InvalidDateRange] if `as_of` is the last representable date,
/// - [Error::SchemaMismatch] or [Error::SqlError] if the query fails.
pub fn get_balance(
    account_id: AccountId,
    as_of: Option<Date>,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let before = match as_of {
        Some(date) => Some(
            date.next_day()
                .ok_or_else(|| Error::InvalidDateRange {
                    start: date.to_string(),
                    end: date.to_string(),
                    reason: "as-of date is the last representable date".to_owned(),
                })?
                .to_string(),
        ),
        None => None,
    };

    let query = format!(
        "SELECT {initial} + COALESCE(( \
            SELECT SUM({amount}) FROM CHECKINGACCOUNT_V1 t \
            WHERE t.ACCOUNTID = a.ACCOUNTID \
            AND {NOT_DELETED} \
            AND (?2 IS NULL OR t.TRANSDATE < ?2) \
        ), 0) + COALESCE(( \
            SELECT SUM({received}) FROM CHECKINGACCOUNT_V1 t \
            WHERE t.TOACCOUNTID = a.ACCOUNTID \
            AND t.TRANSCODE = 'Transfer' \
            AND {NOT_DELETED} \
            AND (?2 IS NULL OR t.TRANSDATE < ?2) \
        ), 0) \
        FROM ACCOUNTLIST_V1 a WHERE a.ACCOUNTID = ?1",
        initial = scaled_sql("a.INITIALBAL"),
        amount = signed_amount_sql(),
        received = scaled_sql("COALESCE(NULLIF(t.TOTRANSAMOUNT, 0), t.TRANSAMOUNT)"),
    );

    let total: Option<i64> = connection
        .query_row(&query, (account_id, before), |row| row.get(0))
        .optional()?;

    total
        .map(from_scaled)
        .ok_or(Error::AccountNotFound(account_id))
}

/// Get the balance of every account, ordered by account ID.
///
/// # Errors
/// Returns the first error from [list_accounts] or [get_balance].
pub fn get_balances(
    as_of: Option<Date>,
    connection: &Connection,
) -> Result<Vec<(Account, Decimal)>, Error> {
    list_accounts(connection)?
        .into_iter()
        .map(|account| {
            let balance = get_balance(account.id, as_of, connection)?;
            Ok((account, balance))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Error,
        sample::{NewTransaction, insert_transaction},
        test_utils::TestStore,
        transaction::TransactionKind,
    };

    use super::{get_balance, get_balances};

    fn example_store() -> TestStore {
        let store = TestStore::new();
        store.add_account(1, "Cash", dec!(100.00));
        store.add_withdrawal(1, "2024-01-05", dec!(20.00), "Landlord");
        store.add_deposit(1, "2024-01-10", dec!(50.00), "Employer");
        store
    }

    #[test]
    fn balance_includes_transactions_up_to_date() {
        let store = example_store();
        let conn = store.connection();

        assert_eq!(
            get_balance(1, Some(date!(2024 - 01 - 07)), &conn),
            Ok(dec!(80.00))
        );
        assert_eq!(
            get_balance(1, Some(date!(2024 - 01 - 10)), &conn),
            Ok(dec!(130.00))
        );
    }

    #[test]
    fn balance_without_date_includes_everything() {
        let store = example_store();
        store.add_withdrawal(1, "2030-06-01T09:00:00", dec!(0.01), "Future");

        let got = get_balance(1, None, &store.connection());

        assert_eq!(got, Ok(dec!(129.99)));
    }

    #[test]
    fn account_without_transactions_has_initial_balance() {
        let store = TestStore::new();
        store.add_account(2, "Savings", dec!(-12.34));

        let got = get_balance(2, None, &store.connection());

        assert_eq!(got, Ok(dec!(-12.34)));
    }

    #[test]
    fn date_before_all_transactions_gives_initial_balance() {
        let store = example_store();

        let got = get_balance(1, Some(date!(2023 - 12 - 31)), &store.connection());

        assert_eq!(got, Ok(dec!(100.00)));
    }

    #[test]
    fn transfer_moves_money_between_accounts() {
        let store = TestStore::new();
        store.add_account(1, "Everyday", dec!(100.00));
        store.add_account(2, "Savings", Decimal::ZERO);
        store.add_transaction(
            NewTransaction::build(1, "2024-01-11", TransactionKind::Transfer, dec!(30.00))
                .to_account(2),
        );
        let conn = store.connection();

        let source = get_balance(1, None, &conn).unwrap();
        let destination = get_balance(2, None, &conn).unwrap();

        assert_eq!(source, dec!(70.00));
        assert_eq!(destination, dec!(30.00));
        assert_eq!(source + destination, dec!(100.00));
    }

    #[test]
    fn transfer_credits_converted_amount() {
        let store = TestStore::new();
        store.add_account(1, "NZD", dec!(100.00));
        store.add_account(2, "USD", Decimal::ZERO);
        store.add_transaction(
            NewTransaction::build(1, "2024-01-11", TransactionKind::Transfer, dec!(50.00))
                .to_account(2)
                .to_amount(dec!(29.85)),
        );
        let conn = store.connection();

        assert_eq!(get_balance(1, None, &conn), Ok(dec!(50.00)));
        assert_eq!(get_balance(2, None, &conn), Ok(dec!(29.85)));
    }

    #[test]
    fn received_transfer_respects_as_of_date() {
        let store = TestStore::new();
        store.add_account(1, "Everyday", dec!(100.00));
        store.add_account(2, "Savings", Decimal::ZERO);
        store.add_transaction(
            NewTransaction::build(1, "2024-01-11", TransactionKind::Transfer, dec!(30.00))
                .to_account(2),
        );
        let conn = store.connection();

        assert_eq!(
            get_balance(2, Some(date!(2024 - 01 - 10)), &conn),
            Ok(Decimal::ZERO)
        );
        assert_eq!(
            get_balance(2, Some(date!(2024 - 01 - 11)), &conn),
            Ok(dec!(30.00))
        );
    }

    #[test]
    fn deleted_transactions_are_ignored() {
        let store = example_store();
        let id = store.add_withdrawal(1, "2024-01-08", dec!(1000), "Mistake");
        crate::sample::soft_delete_transaction(id, &store.connection()).unwrap();

        let got = get_balance(1, None, &store.connection());

        assert_eq!(got, Ok(dec!(130.00)));
    }

    #[test]
    fn unknown_account_is_not_found() {
        let store = example_store();

        let got = get_balance(9, None, &store.connection());

        assert_eq!(got, Err(Error::AccountNotFound(9)));
    }

    #[test]
    fn sum_is_exact_over_many_transactions() {
        let store = TestStore::new();
        store.add_account(1, "Coins", Decimal::ZERO);
        let mut conn = store.connection();
        let tx = conn.transaction().unwrap();
        for _ in 0..10_000 {
            insert_transaction(
                &NewTransaction::build(1, "2024-03-01", TransactionKind::Deposit, dec!(0.10)),
                &tx,
            )
            .unwrap();
        }
        tx.commit().unwrap();

        let got = get_balance(1, None, &conn);

        assert_eq!(got, Ok(dec!(1000.00)));
    }

    #[test]
    fn balances_cover_every_account() {
        let store = example_store();
        store.add_account(2, "Savings", dec!(5));

        let got = get_balances(Some(date!(2024 - 01 - 07)), &store.connection()).unwrap();

        let summary: Vec<_> = got
            .iter()
            .map(|(account, balance)| (account.id, *balance))
            .collect();
        assert_eq!(summary, [(1, dec!(80.00)), (2, dec!(5.00))]);
    }
}
