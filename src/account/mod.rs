//! Accounts read from the store.

mod core;

pub use core::{Account, get_account, list_accounts};

pub(crate) use core::account_exists;
