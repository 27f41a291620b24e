//! Logging setup
//!
//! The filter comes from `MOCHI_LOG` and defaults to `warn`. Output goes to
//! stderr, or to the file named by `MOCHI_LOG_FILE` so the full-screen UI
//! stays clean.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "MOCHI_LOG";

/// Environment variable naming a log file
pub const LOG_FILE_ENV: &str = "MOCHI_LOG_FILE";

/// Initialize the global subscriber
pub fn init() -> io::Result<()> {
    let filter = || EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var_os(LOG_FILE_ENV).filter(|p| !p.is_empty()) {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(filter())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        },
        None => {
            tracing_subscriber::registry()
                .with(filter())
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .init();
        },
    }
    Ok(())
}
