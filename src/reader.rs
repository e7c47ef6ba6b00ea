//! The read interface offered to callers: transactions, balances, accounts and
//! views, served through a shared pool and cache.

use std::{path::Path, sync::Arc};

use rust_decimal::Decimal;
use time::Date;

use crate::{
    Error,
    account::{self, Account},
    balance,
    cache::{CacheEntry, QueryKey, ResultCache},
    config::Config,
    database_id::AccountId,
    date_range::DateRange,
    pool::StorePool,
    schema::{self, RelationInfo, SchemaReport},
    transaction::{self, TransactionSet},
    view::{self, FilterState, View},
};

/// Reads accounts and transactions from one MMEX store.
///
/// A `Reader` is cheap to clone; clones share the same pool and cache.
#[derive(Debug, Clone)]
pub struct Reader {
    pool: Arc<StorePool>,
    cache: Arc<ResultCache>,
}

impl Reader {
    /// Create a reader on an existing pool and cache.
    pub fn new(pool: Arc<StorePool>, cache: Arc<ResultCache>) -> Self {
        Self { pool, cache }
    }

    /// Validate `config`, open a pool on its database and check the schema.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::InvalidConfig] if a setting is invalid,
    /// - [Error::StoreUnavailable] if the database cannot be opened,
    /// - [Error::SchemaMismatch] if a required relation is missing.
    pub fn open(config: &Config) -> Result<Self, Error> {
        config.validate()?;
        let path = config.resolve_db_path()?;
        let pool = Arc::new(StorePool::open(&path, config.pool_config())?);
        let cache = Arc::new(ResultCache::new(
            config.cache_ttl(),
            config.cache_capacity,
        ));

        let reader = Self::new(pool, cache);
        let report = reader.check_schema()?;
        if !report.tags_available {
            tracing::info!("{path:?} has no tag tables; transactions will not have tags");
        }

        Ok(reader)
    }

    /// Check that the store has every required relation.
    ///
    /// # Errors
    /// Returns [Error::SchemaMismatch] naming the first missing relation.
    pub fn check_schema(&self) -> Result<SchemaReport, Error> {
        let connection = self.pool.acquire()?;
        schema::check_required_relations(&connection)
    }

    /// Get the transactions between `range.start()` and `range.end()`
    /// inclusive, for one account or for all of them.
    ///
    /// Results are cached. Asking again for the same accounts and dates
    /// returns the cached records without touching the store until the entry
    /// expires or is invalidated.
    ///
    /// # Errors
    /// See [transaction::list_transactions].
    pub fn list_transactions(
        &self,
        account: Option<AccountId>,
        range: DateRange,
    ) -> Result<TransactionSet, Error> {
        let key = QueryKey {
            account: account.into(),
            range,
        };

        if let Some(entry) = self.cache.get(&key) {
            return Ok(entry.to_set());
        }

        // Read before querying so an invalidation during the query wins.
        let generation = self.cache.generation();
        let set = {
            let connection = self.pool.acquire()?;
            transaction::list_transactions(&key, &connection)?
        };

        let entry = self
            .cache
            .put_if_current(CacheEntry::new(key, set), generation);

        Ok(entry.to_set())
    }

    /// Like [Reader::list_transactions], with the dates given as `YYYY-MM-DD`
    /// strings.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] without touching the store if either
    /// date is malformed or `start` is after `end`.
    pub fn list_transactions_between(
        &self,
        account: Option<AccountId>,
        start: &str,
        end: &str,
    ) -> Result<TransactionSet, Error> {
        let range = DateRange::parse(start, end)?;
        self.list_transactions(account, range)
    }

    /// Get an account's balance as of the end of `as_of`, or including every
    /// transaction if `as_of` is `None`. Balances are not cached.
    ///
    /// # Errors
    /// See [balance::get_balance].
    pub fn get_balance(&self, account: AccountId, as_of: Option<Date>) -> Result<Decimal, Error> {
        let connection = self.pool.acquire()?;
        balance::get_balance(account, as_of, &connection)
    }

    /// Get the balance of every account, ordered by account ID.
    ///
    /// # Errors
    /// See [balance::get_balance].
    pub fn get_balances(&self, as_of: Option<Date>) -> Result<Vec<(Account, Decimal)>, Error> {
        let connection = self.pool.acquire()?;
        balance::get_balances(as_of, &connection)
    }

    /// Get every account ordered by ID.
    ///
    /// # Errors
    /// See [account::list_accounts].
    pub fn list_accounts(&self) -> Result<Vec<Account>, Error> {
        let connection = self.pool.acquire()?;
        account::list_accounts(&connection)
    }

    /// Get one account.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if no account has `id`.
    pub fn get_account(&self, id: AccountId) -> Result<Account, Error> {
        let connection = self.pool.acquire()?;
        account::get_account(id, &connection)
    }

    /// Filter, sort and page a base set. Never touches the store.
    pub fn apply_view(&self, base: &TransactionSet, filter: &FilterState) -> View {
        view::apply_view(&base.records, filter)
    }

    /// Make the next matching [Reader::list_transactions] call query the store.
    ///
    /// With an account, drops that account's entries and every all-accounts
    /// entry. Without one, drops everything.
    pub fn invalidate(&self, account: Option<AccountId>) {
        match account {
            Some(id) => self.cache.invalidate_account(id),
            None => self.cache.clear(),
        }
    }

    /// Switch to another database file and drop every cached result.
    ///
    /// # Errors
    /// Returns [Error::StoreUnavailable] or [Error::SchemaMismatch] if the new
    /// file cannot be used. The reader then keeps using the old file, or is
    /// shut down if the old file can no longer be opened either.
    pub fn switch_database(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let previous = self.pool.path();

        // Cached results belong to the old file whatever the outcome.
        self.cache.clear();
        self.pool.repoint(path.as_ref())?;

        let checked = self.check_schema();
        if let Err(error) = &checked {
            if let Err(rollback) = self.pool.repoint(&previous) {
                tracing::error!(
                    "Could not switch back to {previous:?} after {error}: {rollback}. \
                    Shutting down the connection pool."
                );
                self.pool.shutdown();
            }
        }
        // Drops anything cached from the rejected file while it was checked.
        self.cache.clear();

        checked.map(|_| ())
    }

    /// List every table in the store with its columns.
    ///
    /// # Errors
    /// Returns [Error::SqlError] if the schema cannot be read.
    pub fn describe_schema(&self) -> Result<Vec<RelationInfo>, Error> {
        let connection = self.pool.acquire()?;
        schema::describe(&connection)
    }

    /// Close the pool and drop every cached result. Later calls that need the
    /// store fail with [Error::StoreUnavailable].
    pub fn shutdown(&self) {
        self.pool.shutdown();
        self.cache.clear();
    }

    /// The shared connection pool.
    pub fn pool(&self) -> &Arc<StorePool> {
        &self.pool
    }

    /// The shared result cache.
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Config, DateRange, Error, ResultCache,
        test_utils::TestStore,
        view::{FilterState, SortColumn, SortDirection},
    };

    use super::Reader;

    fn reader_for(store: &TestStore) -> Reader {
        Reader::new(
            store.pool(),
            Arc::new(ResultCache::new(Duration::from_secs(60), 16)),
        )
    }

    fn january() -> DateRange {
        DateRange::new(date!(2024 - 01 - 01), date!(2024 - 01 - 31)).unwrap()
    }

    fn example_store() -> TestStore {
        let store = TestStore::new();
        store.add_account(1, "Cash", dec!(100.00));
        store.add_withdrawal(1, "2024-01-05", dec!(20.00), "Landlord");
        store.add_deposit(1, "2024-01-10", dec!(50.00), "Employer");
        store
    }

    #[test]
    fn repeated_query_is_served_from_cache() {
        let store = example_store();
        let reader = reader_for(&store);

        let first = reader.list_transactions(Some(1), january()).unwrap();
        let accesses = reader.pool().acquisitions();
        let second = reader.list_transactions(Some(1), january()).unwrap();

        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first.records, &second.records));
        assert_eq!(reader.pool().acquisitions(), accesses, "store was queried again");
    }

    #[test]
    fn equivalent_date_strings_share_a_cache_entry() {
        let store = example_store();
        let reader = reader_for(&store);

        reader
            .list_transactions_between(None, "2024-01-01", "2024-01-31")
            .unwrap();
        let accesses = reader.pool().acquisitions();
        reader
            .list_transactions_between(None, " 2024-01-01 ", "2024-01-31")
            .unwrap();

        assert_eq!(reader.pool().acquisitions(), accesses);
    }

    #[test]
    fn invalid_range_is_rejected_before_store_access() {
        let store = example_store();
        let reader = reader_for(&store);

        let result = reader.list_transactions_between(Some(1), "2024-02-01", "2024-01-01");

        assert!(matches!(result, Err(Error::InvalidDateRange { .. })));
        assert_eq!(reader.pool().acquisitions(), 0);
    }

    #[test]
    fn invalidate_forces_requery_after_write() {
        let store = example_store();
        let reader = reader_for(&store);
        reader.list_transactions(Some(1), january()).unwrap();

        store.add_withdrawal(1, "2024-01-20", dec!(5.00), "Cafe");
        let stale = reader.list_transactions(Some(1), january()).unwrap();
        reader.invalidate(Some(1));
        let fresh = reader.list_transactions(Some(1), january()).unwrap();

        assert_eq!(stale.len(), 2);
        assert_eq!(fresh.len(), 3);
    }

    #[test]
    fn invalidating_an_account_refreshes_all_accounts_view() {
        let store = example_store();
        let reader = reader_for(&store);
        reader.list_transactions(None, january()).unwrap();

        store.add_withdrawal(1, "2024-01-21", dec!(1.00), "Kiosk");
        reader.invalidate(Some(1));
        let all = reader.list_transactions(None, january()).unwrap();

        assert_eq!(all.len(), 3);
    }

    #[test]
    fn balances_match_example() {
        let store = example_store();
        let reader = reader_for(&store);

        assert_eq!(
            reader.get_balance(1, Some(date!(2024 - 01 - 07))),
            Ok(dec!(80.00))
        );
        assert_eq!(
            reader.get_balance(1, Some(date!(2024 - 01 - 10))),
            Ok(dec!(130.00))
        );
        assert_eq!(reader.get_balance(2, None), Err(Error::AccountNotFound(2)));
    }

    #[test]
    fn view_over_cached_set() {
        let store = example_store();
        let reader = reader_for(&store);
        let set = reader.list_transactions(Some(1), january()).unwrap();

        let view = reader.apply_view(
            &set,
            &FilterState {
                sort_column: SortColumn::Amount,
                sort_direction: SortDirection::Descending,
                ..Default::default()
            },
        );

        assert_eq!(view.records[0].amount, dec!(50.00));
        assert_eq!(set.records[0].amount, dec!(-20.00), "base set was reordered");
    }

    #[test]
    fn open_checks_required_relations() {
        let store = example_store();
        store.execute("DROP TABLE CATEGORY_V1");
        let config = Config {
            db_path: Some(store.path().to_path_buf()),
            ..Default::default()
        };

        let result = Reader::open(&config);

        match result {
            Err(Error::SchemaMismatch { relation, .. }) => assert_eq!(relation, "CATEGORY_V1"),
            other => panic!("want SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn open_accepts_store_without_tags() {
        let store = TestStore::without_tags();
        store.add_account(1, "Cash", Decimal::ZERO);
        let config = Config {
            db_path: Some(store.path().to_path_buf()),
            ..Default::default()
        };

        let reader = Reader::open(&config).unwrap();
        let set = reader.list_transactions(None, january()).unwrap();

        assert!(!set.tags_available);
        assert_eq!(reader.list_accounts().unwrap().len(), 1);
    }

    #[test]
    fn switch_database_drops_cached_results() {
        let first = example_store();
        let second = TestStore::new();
        second.add_account(1, "Other", Decimal::ZERO);
        let reader = reader_for(&first);
        reader.list_transactions(Some(1), january()).unwrap();

        reader.switch_database(second.path()).unwrap();
        let set = reader.list_transactions(Some(1), january()).unwrap();

        assert!(set.is_empty());
        assert_eq!(reader.get_account(1).unwrap().name, "Other");
    }

    #[test]
    fn failed_switch_keeps_old_database() {
        let store = example_store();
        let broken = TestStore::new();
        broken.execute("DROP TABLE ACCOUNTLIST_V1");
        let reader = reader_for(&store);

        let result = reader.switch_database(broken.path());

        assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
        assert_eq!(reader.pool().path(), store.path());
        assert_eq!(reader.list_accounts().unwrap().len(), 1);
    }

    #[test]
    fn failed_switch_without_old_file_shuts_down() {
        let store = example_store();
        let broken = TestStore::new();
        broken.execute("DROP TABLE ACCOUNTLIST_V1");
        let reader = reader_for(&store);
        reader.list_transactions(Some(1), january()).unwrap();
        std::fs::remove_file(store.path()).unwrap();

        let result = reader.switch_database(broken.path());

        assert!(
            matches!(result, Err(Error::SchemaMismatch { .. })),
            "want SchemaMismatch, got {result:?}"
        );
        assert!(reader.cache().is_empty());
        assert!(matches!(
            reader.list_accounts(),
            Err(Error::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn shutdown_makes_store_unavailable() {
        let store = example_store();
        let reader = reader_for(&store);

        reader.shutdown();

        assert!(matches!(
            reader.list_accounts(),
            Err(Error::StoreUnavailable { .. })
        ));
    }
}
