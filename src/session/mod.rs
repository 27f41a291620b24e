//! Session state
//!
//! One [`Session`] is created by startup, mutated by every loop iteration
//! and consumed by shutdown. Everything that would otherwise be a global
//! flag lives here and is passed explicitly.

mod layout;
mod options;
mod state;

pub use layout::{Buffer, BufferId, Layout, Position, TabPage, Window, WindowId};
pub use options::{Locale, Options, DEFAULT_TABPAGEMAX, DEFAULT_UPDATECOUNT, DIFF_MIN_COLUMNS};
pub use state::{ExitState, ModeState, RedrawType, ShadowState, UiFlags};

use std::path::PathBuf;

use crate::app::StartupTimer;
use crate::args::ScriptFiles;
use crate::history::PersistedState;
use crate::terminal::InputStream;

/// The editor session
#[derive(Debug)]
pub struct Session {
    pub layout: Layout,
    /// Argument list, in editing order
    pub args: Vec<PathBuf>,
    /// The last argument has been opened
    pub arg_had_last: bool,
    pub flags: UiFlags,
    pub shadow: ShadowState,
    pub mode: ModeState,
    pub exit: ExitState,
    pub options: Options,
    /// Message shown once after the next redraw
    pub keep_msg: Option<String>,
    /// `":{first command}\r"` for swap-file messages
    pub swap_command: Option<String>,
    pub history: PersistedState,
    pub scripts: ScriptFiles,
    /// Startup has not finished
    pub starting: bool,
    /// VimEnter has fired
    pub vim_entered: bool,
    pub silent_mode: bool,
    pub recovery_mode: bool,
    /// Stream keyboard input comes from, if any
    pub reading_input: Option<InputStream>,
    /// Quit was chosen at a swap dialog during a tag jump
    pub swap_quit: bool,
    pub timer: Option<StartupTimer>,
}

impl Session {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            args: Vec::new(),
            arg_had_last: false,
            flags: UiFlags::default(),
            shadow: ShadowState::default(),
            mode: ModeState::default(),
            exit: ExitState::default(),
            options: Options::default(),
            keep_msg: None,
            swap_command: None,
            history: PersistedState::default(),
            scripts: ScriptFiles::default(),
            starting: true,
            vim_entered: false,
            silent_mode: false,
            recovery_mode: false,
            reading_input: None,
            swap_quit: false,
            timer: None,
        }
    }

    /// Add a line to the startup time log
    pub fn time_mark(&mut self, message: &str) {
        if let Some(timer) = self.timer.as_mut() {
            timer.mark(message);
        }
    }

    /// Cursor of the current window
    pub fn cursor(&self) -> Position {
        self.layout.current_window().cursor
    }

    pub fn set_cursor(&mut self, cursor: Position) {
        self.layout.current_window_mut().cursor = cursor;
    }

    /// Line count of the current buffer
    pub fn line_count(&self) -> usize {
        self.layout
            .current_buffer()
            .map(|b| b.line_count)
            .unwrap_or(1)
    }

    /// Files named by buffers, for the recent-file list
    pub fn named_buffers(&self) -> Vec<PathBuf> {
        self.layout
            .buffers()
            .iter()
            .filter_map(|b| b.name.clone())
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Layout::new())
    }
}
