//! Mochi Edit Library
//!
//! The bootstrap of a modal text editor: everything between `main` and the
//! first keystroke, the loop that runs the session, and the way out.
//!
//! - `args`: command-line scanning into [`StartupParameters`]
//! - `startup`: the fixed-order startup phases that build a [`Session`]
//! - `dispatch`: the main loop
//! - `shutdown`: exit hooks, persisted state and the exit code
//! - `host`: the [`Host`] trait the core drives, and [`BasicHost`]
//! - `session`: windows, buffers, options and loop flags
//! - `terminal`: tty probing, raw mode and the interrupt latch
//! - `history`: the persisted-state file

pub mod app;
pub mod args;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod host;
pub mod session;
pub mod shutdown;
pub mod startup;
pub mod terminal;

pub use args::{scan, ScanError, ScanOutcome, StartupParameters};
pub use dispatch::{LoopExit, MainLoop};
pub use error::{Classify, ErrorClass};
pub use host::{BasicHost, Host};
pub use session::Session;
pub use startup::{Startup, StartupError};
