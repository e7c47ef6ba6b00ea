//! An in-memory cache of transaction query results.
//!
//! Entries are keyed by [QueryKey] and expire after a fixed time-to-live. When
//! the cache is full, the least recently used entry is evicted. Invalidation is
//! explicit: callers that write to the store or switch to another store must
//! invalidate the affected keys themselves.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{
    database_id::AccountId,
    date_range::DateRange,
    transaction::{Transaction, TransactionSet},
};

/// Which accounts a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountScope {
    /// Every account.
    All,
    /// One account.
    Account(AccountId),
}

impl From<Option<AccountId>> for AccountScope {
    fn from(account: Option<AccountId>) -> Self {
        account.map_or(Self::All, Self::Account)
    }
}

/// Identifies a transaction query. Two keys are equal when they cover the same
/// accounts and the same calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey {
    /// The accounts covered.
    pub account: AccountScope,
    /// The inclusive date range covered.
    pub range: DateRange,
}

/// A cached query result. Entries are replaced as a whole, never updated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The query that produced this entry.
    pub key: QueryKey,
    /// The records in query order.
    pub records: Arc<Vec<Transaction>>,
    /// Whether tag names were read.
    pub tags_available: bool,
    /// When the query finished.
    pub created_at: Instant,
}

impl CacheEntry {
    /// Wrap a fresh query result.
    pub fn new(key: QueryKey, set: TransactionSet) -> Self {
        Self {
            key,
            records: set.records,
            tags_available: set.tags_available,
            created_at: Instant::now(),
        }
    }

    /// The entry as a [TransactionSet], sharing the cached records.
    pub fn to_set(&self) -> TransactionSet {
        TransactionSet {
            records: Arc::clone(&self.records),
            tags_available: self.tags_available,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Hit and miss counts since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned an entry.
    pub hits: u64,
    /// Lookups that found nothing or an expired entry.
    pub misses: u64,
}

#[derive(Debug)]
struct Slot {
    entry: Arc<CacheEntry>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<QueryKey, Slot>,
    /// Logical clock for least-recently-used ordering.
    tick: u64,
    stats: CacheStats,
}

/// A thread-safe map from [QueryKey] to [CacheEntry].
///
/// Concurrent `put`s for the same key are last-writer-wins. Every
/// invalidation bumps a generation counter, and [ResultCache::put_if_current]
/// refuses entries computed before the latest invalidation.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<Inner>,
    generation: AtomicU64,
}

impl ResultCache {
    /// Create an empty cache. A `capacity` of zero is treated as one.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live entry. Expired entries are removed and count as misses.
    pub fn get(&self, key: &QueryKey) -> Option<Arc<CacheEntry>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;

        let expired = inner
            .slots
            .get(key)
            .map(|slot| slot.entry.is_expired(self.ttl));
        let found = match expired {
            Some(false) => inner.slots.get_mut(key).map(|slot| {
                slot.last_used = tick;
                Arc::clone(&slot.entry)
            }),
            Some(true) => {
                inner.slots.remove(key);
                None
            }
            None => None,
        };

        match found {
            Some(entry) => {
                inner.stats.hits += 1;
                tracing::debug!("cache hit for {:?} {}", key.account, key.range);
                Some(entry)
            }
            None => {
                inner.stats.misses += 1;
                tracing::debug!("cache miss for {:?} {}", key.account, key.range);
                None
            }
        }
    }

    /// Store an entry under its key, replacing any existing entry.
    pub fn put(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let mut inner = self.lock();
        self.insert(&mut inner, entry)
    }

    /// Store an entry only if nothing was invalidated since `generation` was
    /// read. Returns the shared entry either way.
    pub fn put_if_current(&self, entry: CacheEntry, generation: u64) -> Arc<CacheEntry> {
        let mut inner = self.lock();

        if self.generation() != generation {
            tracing::debug!(
                "discarding result for {:?} {} computed before an invalidation",
                entry.key.account,
                entry.key.range
            );
            return Arc::new(entry);
        }

        self.insert(&mut inner, entry)
    }

    fn insert(&self, inner: &mut Inner, entry: CacheEntry) -> Arc<CacheEntry> {
        inner.tick += 1;
        let tick = inner.tick;
        let key = entry.key;

        if !inner.slots.contains_key(&key) && inner.slots.len() >= self.capacity {
            let oldest = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| *key);

            if let Some(oldest) = oldest {
                inner.slots.remove(&oldest);
            }
        }

        let entry = Arc::new(entry);
        inner.slots.insert(
            key,
            Slot {
                entry: Arc::clone(&entry),
                last_used: tick,
            },
        );

        entry
    }

    /// The current generation. Read it before running a query and pass it to
    /// [ResultCache::put_if_current] afterwards.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop the entry for one key.
    pub fn invalidate_key(&self, key: &QueryKey) {
        let mut inner = self.lock();
        inner.slots.remove(key);
        self.bump_generation();
    }

    /// Drop every entry that covers `account`, including all-accounts entries.
    pub fn invalidate_account(&self, account: AccountId) {
        let mut inner = self.lock();
        inner.slots.retain(|key, _| match key.account {
            AccountScope::All => false,
            AccountScope::Account(id) => id != account,
        });
        self.bump_generation();
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        self.bump_generation();
    }

    /// The number of stored entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit and miss counts.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use time::macros::date;

    use crate::{DateRange, transaction::TransactionSet};

    use super::{AccountScope, CacheEntry, CacheStats, QueryKey, ResultCache};

    fn key(account: AccountScope, day: u8) -> QueryKey {
        let start = date!(2024 - 01 - 01);
        let end = start.replace_day(day).unwrap();
        QueryKey {
            account,
            range: DateRange::new(start, end).unwrap(),
        }
    }

    fn entry(key: QueryKey) -> CacheEntry {
        CacheEntry::new(
            key,
            TransactionSet {
                records: Arc::new(Vec::new()),
                tags_available: true,
            },
        )
    }

    fn new_cache() -> ResultCache {
        ResultCache::new(Duration::from_secs(60), 8)
    }

    #[test]
    fn get_returns_stored_entry() {
        let cache = new_cache();
        let key = key(AccountScope::Account(1), 31);
        let stored = cache.put(entry(key));

        let got = cache.get(&key);

        assert!(got.is_some_and(|got| Arc::ptr_eq(&got, &stored)));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 0 });
    }

    #[test]
    fn repeated_put_overwrites() {
        let cache = new_cache();
        let key = key(AccountScope::All, 31);

        cache.put(entry(key));
        cache.put(entry(key));

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = ResultCache::new(Duration::from_millis(10), 8);
        let key = key(AccountScope::All, 31);
        let mut old = entry(key);
        old.created_at = Instant::now() - Duration::from_secs(1);
        cache.put(old);

        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty(), "expired entry should be removed");
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        let first = key(AccountScope::All, 1);
        let second = key(AccountScope::All, 2);
        let third = key(AccountScope::All, 3);

        cache.put(entry(first));
        cache.put(entry(second));
        cache.get(&first);
        cache.put(entry(third));

        assert!(cache.get(&first).is_some());
        assert!(cache.get(&second).is_none(), "second was least recently used");
        assert!(cache.get(&third).is_some());
    }

    #[test]
    fn invalidate_account_also_drops_all_accounts_entries() {
        let cache = new_cache();
        let one = key(AccountScope::Account(1), 31);
        let two = key(AccountScope::Account(2), 31);
        let all = key(AccountScope::All, 31);
        for key in [one, two, all] {
            cache.put(entry(key));
        }

        cache.invalidate_account(1);

        assert!(cache.get(&one).is_none());
        assert!(cache.get(&all).is_none());
        assert!(cache.get(&two).is_some());
    }

    #[test]
    fn invalidate_key_drops_only_that_key() {
        let cache = new_cache();
        let january = key(AccountScope::All, 31);
        let first_week = key(AccountScope::All, 7);
        cache.put(entry(january));
        cache.put(entry(first_week));

        cache.invalidate_key(&january);

        assert!(cache.get(&january).is_none());
        assert!(cache.get(&first_week).is_some());
    }

    #[test]
    fn put_if_current_discards_stale_results() {
        let cache = new_cache();
        let key = key(AccountScope::All, 31);
        let generation = cache.generation();

        cache.clear();
        cache.put_if_current(entry(key), generation);

        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn put_if_current_stores_fresh_results() {
        let cache = new_cache();
        let key = key(AccountScope::All, 31);

        cache.put_if_current(entry(key), cache.generation());

        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn tolerates_concurrent_access() {
        let cache = Arc::new(new_cache());

        let handles: Vec<_> = (1..=8)
            .map(|day| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let key = key(AccountScope::All, day);
                    cache.put(entry(key));
                    cache.get(&key).is_some()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), 8);
    }
}
