//! Command-line scanning
//!
//! Turns the process argument vector into [`StartupParameters`]. Scanning
//! is a single left-to-right pass; see [`scan`].

mod params;
mod scanner;
mod switches;
pub mod usage;

pub use params::{
    CommandList, EditMode, ExMode, OptionOverrides, RcOverride, ScriptFile, ScriptFiles,
    StartupCommand, StartupParameters, Verbosity, WindowCount, WindowLayout, MAX_ARG_CMDS,
    SESSION_FILE,
};
pub use scanner::scan;

use crate::error::{Classify, ErrorClass};

/// Requests answered without starting the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoRequest {
    Help,
    Version,
    ApiInfo,
}

/// Result of a successful scan
#[derive(Debug)]
pub enum ScanOutcome {
    /// Start the editor with these parameters
    Start(StartupParameters),
    /// Print something and exit
    Info(InfoRequest),
}

/// Error type for argument scanning
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Unknown option argument: \"{0}\"")]
    UnknownOption(String),

    #[error("Too many edit arguments: \"{0}\"")]
    TooManyEditTargets(String),

    #[error("Argument missing after: \"{0}\"")]
    MissingOptionArgument(String),

    #[error("Garbage after option argument: \"{0}\"")]
    TrailingGarbageAfterOption(String),

    #[error("Too many \"+command\", \"-c command\" or \"--cmd command\" arguments")]
    TooManyCommands,

    #[error("Attempt to open script file again: \"{option} {path}\"")]
    ScriptAlreadyOpen { option: String, path: String },

    #[error("{action}: \"{path}\"")]
    ScriptOpen {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("GUI not available")]
    NoGui,
}

impl Classify for ScanError {
    fn class(&self) -> ErrorClass {
        match self {
            ScanError::ScriptAlreadyOpen { .. } | ScanError::ScriptOpen { .. } | ScanError::NoGui => {
                ErrorClass::Environment
            },
            _ => ErrorClass::Parse,
        }
    }
}
