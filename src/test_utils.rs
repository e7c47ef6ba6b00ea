//! Fixture stores for tests.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rusqlite::Connection;
use rust_decimal::Decimal;
use tempfile::TempDir;

use crate::{
    AccountId, PoolConfig, StorePool, TransactionId,
    sample::{NewTransaction, insert_account, insert_transaction},
    schema::{TagTables, create_tables},
    transaction::TransactionKind,
};

/// An MMEX-schema database file in a temporary directory that is removed on
/// drop.
pub struct TestStore {
    _dir: TempDir,
    path: PathBuf,
}

impl TestStore {
    /// A store with the tag tables.
    pub fn new() -> Self {
        Self::create(TagTables::Present)
    }

    /// A store without the tag tables, like an older MMEX file.
    pub fn without_tags() -> Self {
        Self::create(TagTables::Absent)
    }

    fn create(tags: TagTables) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mmb");
        let connection = Connection::open(&path).unwrap();
        create_tables(&connection, tags).unwrap();

        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh connection, separate from any pool.
    pub fn connection(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    pub fn pool(&self) -> Arc<StorePool> {
        Arc::new(StorePool::open(&self.path, PoolConfig::default()).unwrap())
    }

    pub fn add_account(&self, id: AccountId, name: &str, initial_balance: Decimal) {
        insert_account(id, name, "Checking", initial_balance, &self.connection()).unwrap();
    }

    pub fn add_transaction(&self, transaction: NewTransaction) -> TransactionId {
        insert_transaction(&transaction, &self.connection()).unwrap()
    }

    pub fn add_withdrawal(
        &self,
        account_id: AccountId,
        date: &str,
        amount: Decimal,
        payee: &str,
    ) -> TransactionId {
        self.add_transaction(
            NewTransaction::build(account_id, date, TransactionKind::Withdrawal, amount)
                .payee(payee),
        )
    }

    pub fn add_deposit(
        &self,
        account_id: AccountId,
        date: &str,
        amount: Decimal,
        payee: &str,
    ) -> TransactionId {
        self.add_transaction(
            NewTransaction::build(account_id, date, TransactionKind::Deposit, amount).payee(payee),
        )
    }

    /// Run raw SQL against the store, e.g. to break the schema.
    pub fn execute(&self, sql: &str) {
        self.connection().execute_batch(sql).unwrap();
    }
}
