//! Collaborator interface
//!
//! Startup, the dispatch loop and shutdown never touch document text, the
//! screen or an interpreter directly. They go through [`Host`]. The crate
//! ships [`BasicHost`] so the binary runs on its own; tests use recording
//! hosts.

mod basic;
mod commands;

pub use basic::{BasicHost, QuickfixEntry};
pub use commands::{parse as parse_command, ExCommand, LineSpec};

use std::io;
use std::path::{Path, PathBuf};

use crate::session::{BufferId, RedrawType, Session};

/// Error type for host operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Can't open file {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Quickfix(String),

    #[error("{0}")]
    Recovery(String),

    #[error("E169: Command too recursive")]
    TooRecursive,
}

impl HostError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            HostError::NotFound(path.to_path_buf())
        } else {
            HostError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Autocommand events the core fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hook {
    BufEnter,
    BufUnload,
    BufWinLeave,
    CursorMoved,
    TextChanged,
    VimEnter,
    VimLeave,
    VimLeavePre,
}

impl Hook {
    pub const ALL: [Hook; 8] = [
        Hook::BufEnter,
        Hook::BufUnload,
        Hook::BufWinLeave,
        Hook::CursorMoved,
        Hook::TextChanged,
        Hook::VimEnter,
        Hook::VimLeave,
        Hook::VimLeavePre,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Hook::BufEnter => "BufEnter",
            Hook::BufUnload => "BufUnload",
            Hook::BufWinLeave => "BufWinLeave",
            Hook::CursorMoved => "CursorMoved",
            Hook::TextChanged => "TextChanged",
            Hook::VimEnter => "VimEnter",
            Hook::VimLeave => "VimLeave",
            Hook::VimLeavePre => "VimLeavePre",
        }
    }

    /// Case-insensitive lookup, as `:autocmd` accepts
    pub fn from_name(name: &str) -> Option<Hook> {
        Hook::ALL
            .into_iter()
            .find(|hook| hook.name().eq_ignore_ascii_case(name))
    }
}

/// Kind of redraw pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawKind {
    /// Repaint the inverted visual selection
    VisualInverted,
    /// Repaint every window
    Full(RedrawType),
    /// Only the mode message and command line
    ModeLine,
    /// Only status lines
    StatusLines,
}

/// Result of one interpreter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// The session should end with this code
    Exit(i32),
}

/// Result of opening a document, after any swap-file dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    /// Don't edit this file
    Quit,
    /// Stop editing altogether
    Abort,
}

/// Where an Ex command comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// `--cmd`
    PreVimrc,
    /// `$MOCHIINIT` or `$EXINIT`
    Environment(&'static str),
    /// `+`, `-c` or `-S`
    CommandLine,
    /// A line of a sourced script
    Script,
    /// A hook handler
    Hook(Hook),
    /// Typed by the user
    User,
}

impl CommandOrigin {
    /// Name shown in error messages
    pub fn label(self) -> &'static str {
        match self {
            CommandOrigin::PreVimrc => "pre-vimrc command line",
            CommandOrigin::Environment(name) => name,
            CommandOrigin::CommandLine => "command line",
            CommandOrigin::Script => "sourced script",
            CommandOrigin::Hook(hook) => hook.name(),
            CommandOrigin::User => "user",
        }
    }
}

/// Everything the core needs from the rest of the editor.
///
/// Methods with a default body are optional. All of them run on the one
/// editor thread and get the session explicitly.
pub trait Host {
    /// Screen size as (columns, rows)
    fn screen_size(&self) -> (u16, u16) {
        (80, 24)
    }

    /// Start reading keys from `stream`
    fn start_input(&mut self, _stream: crate::terminal::InputStream) {}

    /// Stop reading from the startup input stream
    fn stop_input(&mut self) {}

    fn show_message(&mut self, session: &mut Session, message: &str);

    /// Report an error message
    fn show_error(&mut self, session: &mut Session, message: &str) {
        session.exit.error_displayed = true;
        session.flags.emsg_on_display = true;
        if session.mode.ex_mode.is_some() {
            session.exit.ex_error_count += 1;
        }
        self.show_message(session, message);
    }

    fn execute_command(&mut self, session: &mut Session, command: &str, origin: CommandOrigin);

    fn source_script(&mut self, session: &mut Session, path: &Path) -> Result<(), HostError>;

    /// Load `buffer` (named or not) into memory
    fn open_document(&mut self, session: &mut Session, buffer: BufferId) -> OpenOutcome;

    /// Read the current buffer from stdin
    fn read_stdin_document(&mut self, session: &mut Session) -> OpenOutcome;

    fn load_error_file(&mut self, session: &mut Session, path: &Path) -> Result<(), HostError>;

    fn jump_to_first_error(&mut self, _session: &mut Session) {}

    /// Recover the current buffer from its swap file
    fn recover(&mut self, session: &mut Session) -> Result<(), HostError>;

    fn list_swap_files(&mut self, _session: &mut Session) {}

    /// Take over the screen
    fn start_ui(&mut self, _session: &mut Session) {}

    fn has_hook(&self, hook: Hook) -> bool;

    fn fire_hook(&mut self, session: &mut Session, hook: Hook, buffer: Option<BufferId>);

    /// Typeahead is waiting
    fn input_pending(&self) -> bool;

    fn stuff_input(&mut self, keys: &str);

    fn flush_input(&mut self);

    /// Consume a pending interrupt
    fn interrupt_check(&mut self) -> bool;

    /// Peek at the interrupt latch without consuming it
    fn interrupt_pending(&self) -> bool {
        false
    }

    fn check_timestamps(&mut self, _session: &mut Session) {}

    /// "Press ENTER" prompt
    fn wait_return(&mut self, session: &mut Session);

    fn update_viewport(&mut self, _session: &mut Session) {}

    fn redraw(&mut self, session: &mut Session, kind: RedrawKind);

    fn show_fileinfo(&mut self, _session: &mut Session) {}

    /// Put the terminal cursor where the window cursor is
    fn place_cursor(&mut self, _session: &mut Session) {}

    /// One Normal-mode command
    fn modal_step(&mut self, session: &mut Session) -> StepOutcome;

    /// One Ex-mode line
    fn line_step(&mut self, session: &mut Session, improved: bool) -> StepOutcome;

    fn cursor_goto(&mut self, _row: u16, _col: u16) {}

    /// Give the terminal back
    fn release_resources(&mut self) {}
}

/// Operations listed by `--api-info`
pub const HOST_OPERATIONS: &[&str] = &[
    "screen_size",
    "start_input",
    "stop_input",
    "show_message",
    "show_error",
    "execute_command",
    "source_script",
    "open_document",
    "read_stdin_document",
    "load_error_file",
    "jump_to_first_error",
    "recover",
    "list_swap_files",
    "start_ui",
    "has_hook",
    "fire_hook",
    "input_pending",
    "stuff_input",
    "flush_input",
    "interrupt_check",
    "interrupt_pending",
    "check_timestamps",
    "wait_return",
    "update_viewport",
    "redraw",
    "show_fileinfo",
    "place_cursor",
    "modal_step",
    "line_step",
    "cursor_goto",
    "release_resources",
];
