//! Log output for the binaries. The library only emits `tracing` events and
//! never installs a subscriber itself.

use std::{fs::OpenOptions, path::Path, sync::Arc};

use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::Error;

/// Install the global subscriber.
///
/// Events go to stderr, filtered by `RUST_LOG` if it is set and otherwise at
/// `info`, or `debug` when `verbose` is set. Stdout is left for command output.
/// If `log_file` is given, every event at `debug` or above is also appended
/// to that file.
///
/// # Errors
/// Returns [Error::InvalidConfig] if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<(), Error> {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    let debug_log = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|error| {
                    Error::InvalidConfig(format!(
                        "could not open log file {}: {error}",
                        path.display()
                    ))
                })?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::DEBUG),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .try_init()
        .map_err(|error| Error::InvalidConfig(format!("could not install logger: {error}")))
}
