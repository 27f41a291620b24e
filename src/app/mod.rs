//! Application glue module
//!
//! Configuration, logging, startup timing and version information.

mod config;
pub mod info;
pub mod logging;
mod timing;

pub use config::{Config, ConfigError, StartupConfig};
pub use info::{ApiInfo, PROGRAM_NAME, VERSION};
pub use timing::StartupTimer;
