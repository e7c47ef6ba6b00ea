//! Runs [Reader] calls on tokio's blocking thread pool so async callers stay
//! responsive while the store is read.

use rust_decimal::Decimal;
use time::Date;
use tokio::task;

use crate::{
    Error,
    account::Account,
    database_id::AccountId,
    date_range::DateRange,
    reader::Reader,
    schema::RelationInfo,
    transaction::TransactionSet,
};

/// An async wrapper around a [Reader].
///
/// Each call runs to completion once issued; dropping the returned future
/// does not stop the store query.
#[derive(Debug, Clone)]
pub struct AsyncReader {
    reader: Reader,
}

impl AsyncReader {
    /// Wrap `reader`.
    pub fn new(reader: Reader) -> Self {
        Self { reader }
    }

    /// The wrapped reader, for calls that never block such as views.
    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    async fn run<T, F>(&self, call: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&Reader) -> Result<T, Error> + Send + 'static,
    {
        let reader = self.reader.clone();

        task::spawn_blocking(move || call(&reader))
            .await
            .map_err(|error| Error::BackgroundTaskFailed(error.to_string()))?
    }

    /// See [Reader::list_transactions].
    pub async fn list_transactions(
        &self,
        account: Option<AccountId>,
        range: DateRange,
    ) -> Result<TransactionSet, Error> {
        self.run(move |reader| reader.list_transactions(account, range))
            .await
    }

    /// See [Reader::get_balance].
    pub async fn get_balance(
        &self,
        account: AccountId,
        as_of: Option<Date>,
    ) -> Result<Decimal, Error> {
        self.run(move |reader| reader.get_balance(account, as_of))
            .await
    }

    /// See [Reader::get_balances].
    pub async fn get_balances(&self, as_of: Option<Date>) -> Result<Vec<(Account, Decimal)>, Error> {
        self.run(move |reader| reader.get_balances(as_of)).await
    }

    /// See [Reader::list_accounts].
    pub async fn list_accounts(&self) -> Result<Vec<Account>, Error> {
        self.run(|reader| reader.list_accounts()).await
    }

    /// See [Reader::describe_schema].
    pub async fn describe_schema(&self) -> Result<Vec<RelationInfo>, Error> {
        self.run(|reader| reader.describe_schema()).await
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{DateRange, Error, Reader, ResultCache, test_utils::TestStore};

    use super::AsyncReader;

    fn async_reader(store: &TestStore) -> AsyncReader {
        AsyncReader::new(Reader::new(
            store.pool(),
            Arc::new(ResultCache::new(Duration::from_secs(60), 4)),
        ))
    }

    #[tokio::test]
    async fn balance_and_transactions_overlap() {
        let store = TestStore::new();
        store.add_account(1, "Cash", dec!(100.00));
        store.add_withdrawal(1, "2024-01-05", dec!(20.00), "Landlord");
        let reader = async_reader(&store);
        let range = DateRange::new(date!(2024 - 01 - 01), date!(2024 - 01 - 31)).unwrap();

        let (balance, transactions) = tokio::join!(
            reader.get_balance(1, None),
            reader.list_transactions(Some(1), range)
        );

        assert_eq!(balance, Ok(dec!(80.00)));
        assert_eq!(transactions.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let store = TestStore::new();
        let reader = async_reader(&store);

        let result = reader.get_balance(5, None).await;

        assert_eq!(result, Err(Error::AccountNotFound(5)));
    }

    #[tokio::test]
    async fn panicking_call_is_background_failure() {
        let store = TestStore::new();
        let reader = async_reader(&store);

        let result: Result<(), Error> = reader.run(|_| panic!("worker exploded")).await;

        assert!(matches!(result, Err(Error::BackgroundTaskFailed(_))));
    }
}
