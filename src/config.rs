//! Settings for the pool, the cache and views, read from defaults, an optional
//! JSON file and the environment.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{Error, pool::PoolConfig};

/// Where MMEX keeps its database by default, relative to the home directory.
const DEFAULT_DB_PATH: &str = "Documents/MoneyManagerEx/data.mmb";

/// Environment variables named `MMEX_<FIELD>` override the matching field.
const ENV_PREFIX: &str = "MMEX";

/// Reader settings. Every field has a default, so a config file only needs to
/// name the settings it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The MMEX database file. See [Config::resolve_db_path].
    pub db_path: Option<PathBuf>,
    /// The maximum number of open connections.
    pub pool_size: u32,
    /// How long to wait for a free connection, in milliseconds.
    pub acquire_timeout_ms: u64,
    /// How long cached query results stay valid, in seconds.
    pub cache_ttl_secs: u64,
    /// The maximum number of cached query results.
    pub cache_capacity: usize,
    /// The default number of records per page.
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            pool_size: 4,
            acquire_timeout_ms: 5000,
            cache_ttl_secs: 15 * 60,
            cache_capacity: 32,
            page_size: 50,
        }
    }
}

impl Config {
    /// Read settings from the defaults, then the JSON file at `file` if one is
    /// given, then `MMEX_*` environment variables such as `MMEX_POOL_SIZE`.
    /// Later sources override earlier ones; empty variables are ignored.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the file cannot be read or parsed, or
    /// if a setting has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self, Error> {
        Self::load_from(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(file: Option<&Path>, environment: Environment) -> Result<Self, Error> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
        }

        builder
            .add_source(environment.ignore_empty(true))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|error| Error::InvalidConfig(error.to_string()))
    }

    /// Check that every setting is usable.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if the pool size, acquisition timeout,
    /// cache capacity or page size is zero.
    pub fn validate(&self) -> Result<(), Error> {
        let zero = [
            ("pool_size", self.pool_size == 0),
            ("acquire_timeout_ms", self.acquire_timeout_ms == 0),
            ("cache_capacity", self.cache_capacity == 0),
            ("page_size", self.page_size == 0),
        ];

        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(Error::InvalidConfig(format!(
                "{name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }

    /// The pool settings.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: self.pool_size,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
        }
    }

    /// The cache time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The database path: `db_path` if set, otherwise MMEX's default location
    /// under the home directory.
    ///
    /// # Errors
    /// Returns [Error::StoreUnavailable] if the file does not exist, or
    /// [Error::InvalidConfig] if no path is set and there is no home directory.
    pub fn resolve_db_path(&self) -> Result<PathBuf, Error> {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from);

        self.resolve_db_path_from(home)
    }

    fn resolve_db_path_from(&self, home: Option<PathBuf>) -> Result<PathBuf, Error> {
        let path = match (&self.db_path, home) {
            (Some(path), _) => path.clone(),
            (None, Some(home)) => home.join(DEFAULT_DB_PATH),
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "no database path given and no home directory to look in".to_owned(),
                ));
            }
        };

        if !path.is_file() {
            return Err(Error::StoreUnavailable {
                path,
                reason: "file does not exist".to_owned(),
            });
        }

        Ok(path)
    }
}
