//! A bounded pool of connections to one MMEX database file.
//!
//! The pool is created once at start-up and shared (behind an [Arc]) with
//! every component that reads from the store. Connections are handed out as
//! [PooledConnection] guards that go back to the pool when dropped, so a
//! connection is returned on every exit path, including early returns via `?`.
//!
//! [Arc]: std::sync::Arc

use std::{
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use r2d2::ManageConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};

use crate::Error;

/// Sizing and timeout settings for a [StorePool].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// The maximum number of open connections.
    pub max_size: u32,
    /// How long [StorePool::acquire] waits for a free connection.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

struct PoolState {
    path: PathBuf,
    /// `None` once the pool has been shut down.
    inner: Option<r2d2::Pool<SqliteConnectionManager>>,
}

impl fmt::Debug for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolState")
            .field("path", &self.path)
            .field("open", &self.inner.is_some())
            .finish()
    }
}

/// The process-wide connection pool.
#[derive(Debug)]
pub struct StorePool {
    config: PoolConfig,
    state: RwLock<PoolState>,
    acquisitions: AtomicU64,
}

impl StorePool {
    /// Open a pool on the database file at `path`.
    ///
    /// One connection is opened straight away to check that the file exists
    /// and is a SQLite database.
    ///
    /// # Errors
    /// Returns [Error::StoreUnavailable] if the file does not exist or cannot be
    /// opened as a database.
    pub fn open(path: impl AsRef<Path>, config: PoolConfig) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let inner = build_pool(&path, config)?;
        tracing::info!(
            "Opened connection pool for {path:?} (max {} connections)",
            config.max_size
        );

        Ok(Self {
            config,
            state: RwLock::new(PoolState {
                path,
                inner: Some(inner),
            }),
            acquisitions: AtomicU64::new(0),
        })
    }

    /// Take a connection from the pool, waiting up to the configured timeout
    /// for one to become free.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::PoolExhausted] if no connection became free in time,
    /// - [Error::StoreUnavailable] if the pool has been shut down or the
    ///   database file has gone away.
    pub fn acquire(&self) -> Result<PooledConnection, Error> {
        let (pool, path) = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let Some(pool) = state.inner.clone() else {
                return Err(Error::StoreUnavailable {
                    path: state.path.clone(),
                    reason: "the connection pool has been shut down".to_owned(),
                });
            };
            (pool, state.path.clone())
        };

        match pool.get() {
            Ok(connection) => {
                self.acquisitions.fetch_add(1, Ordering::Relaxed);
                Ok(PooledConnection { inner: connection })
            }
            Err(error) if !path.is_file() => Err(Error::StoreUnavailable {
                path,
                reason: format!("the database file no longer exists ({error})"),
            }),
            Err(error) => {
                tracing::debug!("Could not acquire a connection: {error}");
                Err(Error::PoolExhausted {
                    timeout: self.config.acquire_timeout,
                })
            }
        }
    }

    /// Return a connection to the pool.
    ///
    /// Equivalent to dropping the guard. A connection taken from a pool that
    /// has since been re-pointed or shut down is closed instead of reused.
    pub fn release(&self, connection: PooledConnection) {
        drop(connection);
    }

    /// Point the pool at a different database file.
    ///
    /// The new file is checked before anything changes; on success every idle
    /// connection to the old file is closed and later acquisitions only see the
    /// new file. Connections already handed out stay usable until released and
    /// are then closed.
    ///
    /// # Errors
    /// Returns [Error::StoreUnavailable] if the new file cannot be opened, in
    /// which case the pool keeps using the old file.
    pub fn repoint(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref().to_path_buf();
        let inner = build_pool(&path, self.config)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!("Re-pointing connection pool from {:?} to {path:?}", state.path);
        state.path = path;
        // Dropping the old pool closes its idle connections.
        state.inner = Some(inner);

        Ok(())
    }

    /// Close every idle connection and refuse further acquisitions.
    pub fn shutdown(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.inner.take().is_some() {
            tracing::info!("Shut down connection pool for {:?}", state.path);
        }
    }

    /// The database file the pool currently serves.
    pub fn path(&self) -> PathBuf {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .path
            .clone()
    }

    /// The sizing and timeout settings.
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// The number of idle connections currently held open.
    pub fn idle_connections(&self) -> u32 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .inner
            .as_ref()
            .map_or(0, |pool| pool.state().idle_connections)
    }

    /// The number of successful acquisitions since the pool was opened.
    ///
    /// Every store round-trip goes through [StorePool::acquire], so this also
    /// counts store accesses.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }
}

fn build_pool(
    path: &Path,
    config: PoolConfig,
) -> Result<r2d2::Pool<SqliteConnectionManager>, Error> {
    let unavailable = |reason: String| Error::StoreUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_file() {
        return Err(unavailable("file does not exist".to_owned()));
    }

    // Without SQLITE_OPEN_CREATE a missing file is an error, not an empty store.
    let manager = SqliteConnectionManager::file(path).with_flags(
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    );

    // Opening a non-database file succeeds; reading the schema does not.
    let entries = manager
        .connect()
        .and_then(|connection| {
            connection.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
                row.get::<_, i64>(0)
            })
        })
        .map_err(|error| unavailable(error.to_string()))?;
    tracing::debug!("{path:?} has {entries} schema entries");

    // r2d2 panics on a zero size or timeout.
    Ok(r2d2::Pool::builder()
        .max_size(config.max_size.max(1))
        .min_idle(Some(0))
        .connection_timeout(config.acquire_timeout.max(Duration::from_millis(1)))
        .build_unchecked(manager))
}

/// A connection borrowed from a [StorePool].
///
/// Dereferences to a [rusqlite::Connection]. The connection goes back to the
/// pool when this guard is dropped or passed to [StorePool::release].
pub struct PooledConnection {
    inner: r2d2::PooledConnection<SqliteConnectionManager>,
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.inner
    }
}
