//! Loop flags and shadow state

use super::layout::{BufferId, Position};
use crate::args::ExMode;

/// How much of the screen needs repainting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RedrawType {
    /// Everything needs redrawing, but the screen contents are known
    NotValid,
    /// Clear the screen first
    Clear,
}

/// Flags the loop, startup and the host use to talk to each other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiFlags {
    /// A redraw was asked for even though input is pending
    pub needs_redraw: bool,
    /// Skip the next redraw sub-phase
    pub skip_redraw: bool,
    /// Latched interrupt
    pub interrupt_requested: bool,
    /// Advisory for the host, set by the top-level loop only
    pub garbage_collect_allowed: bool,
    pub must_redraw: Option<RedrawType>,
    pub redraw_cmdline: bool,
    pub need_wait_return: bool,
    pub need_check_timestamps: bool,
    pub need_start_insertmode: bool,
    pub need_fileinfo: bool,
    pub emsg_on_display: bool,
    pub msg_didany: bool,
    /// The more-prompt was quit; don't flush typeahead on interrupt
    pub quit_more: bool,
    pub msg_scroll: bool,
    /// Redrawing is held off during startup
    pub redrawing_disabled: bool,
}

impl Default for UiFlags {
    fn default() -> Self {
        Self {
            needs_redraw: false,
            skip_redraw: false,
            interrupt_requested: false,
            garbage_collect_allowed: false,
            must_redraw: None,
            redraw_cmdline: false,
            need_wait_return: false,
            need_check_timestamps: false,
            need_start_insertmode: false,
            need_fileinfo: false,
            emsg_on_display: false,
            msg_didany: false,
            quit_more: false,
            msg_scroll: false,
            redrawing_disabled: true,
        }
    }
}

impl UiFlags {
    /// Ask for at least `kind` of redraw
    pub fn redraw_later(&mut self, kind: RedrawType) {
        self.must_redraw = Some(match self.must_redraw {
            Some(current) => current.max(kind),
            None => kind,
        });
    }
}

/// What the previous loop iteration saw, for change detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowState {
    pub last_cursor: Position,
    pub last_changedtick: u64,
    pub last_changedtick_buf: Option<BufferId>,
}

/// Interpreter modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeState {
    pub ex_mode: Option<ExMode>,
    pub visual_active: bool,
    pub insert_active: bool,
    /// A `:global` command is running
    pub global_busy: bool,
    /// An operator is pending
    pub finish_op: bool,
    /// Set when the command-line window is left
    pub cmdwin_result: Option<i32>,
}

/// Everything shutdown needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitState {
    /// An error message is on screen and was not acknowledged
    pub error_displayed: bool,
    /// Exit code asked for by a command such as `:q` or `:cq`
    pub requested_code: Option<i32>,
    /// Errors counted while in Ex mode
    pub ex_error_count: i32,
    /// Times shutdown has been entered
    pub attempts: u32,
    pub exiting: bool,
}

impl ExitState {
    /// Ask the loop to end with `code`
    pub fn request(&mut self, code: i32) {
        self.requested_code = Some(code);
    }
}
