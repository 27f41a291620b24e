//! Startup orchestration
//!
//! Turns [`StartupParameters`] into a ready [`Session`]. The phases run in a
//! fixed order because each one reads state the earlier ones set up:
//!
//! 1. allocate the first window and buffer
//! 2. derive option defaults from screen size and locale
//! 3. terminal checks and the input stream
//! 4. `--cmd` commands
//! 5. startup scripts
//! 6. plugins
//! 7. deferred layout choice, swap listing, late option fixes
//! 8. persisted state
//! 9. quickfix file
//! 10. document from stdin
//! 11. the UI
//! 12. windows and the initial file loads, tag jump
//! 13. `+` / `-c` / `-S` commands
//! 14. VimEnter
//!
//! Phases 1, 7 (swap listing), 9 and 12 can end the process; everything
//! else degrades quietly.

mod scripts;
mod windows;

use std::mem;
use std::path::PathBuf;

use crate::app::{Config, StartupTimer, PROGRAM_NAME};
use crate::args::{EditMode, StartupParameters, WindowCount};
use crate::error::{Classify, ErrorClass};
use crate::history::PersistedState;
use crate::host::{CommandOrigin, Hook, Host, HostError, OpenOutcome};
use crate::session::{Layout, Locale, Options, RedrawType, Session};
use crate::terminal;

use windows::WindowPlan;

/// Error type for startup
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to allocate the first window")]
    FirstWindow,

    #[error("{source}")]
    Quickfix {
        path: PathBuf,
        #[source]
        source: HostError,
    },

    #[error("Recovery failed: {0}")]
    Recovery(#[source] HostError),

    #[error("Editing aborted")]
    Quit,

    #[error("Swap files listed")]
    SwapFilesListed,
}

impl StartupError {
    /// Exit through the shutdown sequence rather than straight away
    pub fn runs_shutdown(&self) -> bool {
        matches!(self, StartupError::Quit | StartupError::Recovery(_))
    }
}

impl Classify for StartupError {
    fn class(&self) -> ErrorClass {
        match self {
            StartupError::FirstWindow => ErrorClass::Unrecoverable,
            StartupError::Quickfix { .. } => ErrorClass::FatalLoad(3),
            StartupError::Recovery(_) | StartupError::Quit => ErrorClass::FatalLoad(1),
            StartupError::SwapFilesListed => ErrorClass::FatalLoad(0),
        }
    }
}

/// Startup orchestrator
pub struct Startup {
    params: StartupParameters,
    config: Config,
    plan: WindowPlan,
}

impl Startup {
    pub fn new(params: StartupParameters, config: Config) -> Self {
        let plan = WindowPlan {
            layout: params.window_layout,
            count: 1,
        };
        Self {
            params,
            config,
            plan,
        }
    }

    /// Phase 1: the first window and buffer, and the argument list
    pub fn allocate(&mut self) -> Result<Session, StartupError> {
        let layout = Layout::try_new().map_err(|e| {
            tracing::error!("first window: {e}");
            StartupError::FirstWindow
        })?;
        let mut session = Session::new(layout);
        session.timer = Some(StartupTimer::new(
            self.params.overrides.startuptime.as_deref(),
        ));

        let files = mem::take(&mut self.params.files);
        session.args = expand_diff_args(files, self.params.diff_mode);
        if let Some(first) = session.args.first().cloned() {
            if let Some(buffer) = session.layout.current_buffer_mut() {
                buffer.name = Some(first);
            }
        }
        for file in session.args.iter().skip(1).cloned().collect::<Vec<_>>() {
            session.layout.add_buffer(Some(file));
        }
        session.layout.current_window_mut().arg_idx = (!session.args.is_empty()).then_some(0);

        session.scripts = mem::take(&mut self.params.scripts);
        session.swap_command = self.params.swap_command.take();
        session.mode.ex_mode = self.params.overrides.ex_mode;
        session.silent_mode = self.params.overrides.silent;
        session.recovery_mode = self.params.overrides.recovery;
        session.time_mark("allocated first window");
        Ok(session)
    }

    /// Phases 2 to 14
    pub fn run<H: Host + ?Sized>(
        mut self,
        session: &mut Session,
        host: &mut H,
    ) -> Result<(), StartupError> {
        self.init_options(session, host);
        self.init_terminal(session, host);
        self.run_pre_commands(session, host);
        scripts::source_startup_scripts(
            session,
            host,
            self.params.use_vimrc.as_ref(),
            &self.config.startup,
        );
        session.time_mark("sourcing startup scripts");
        scripts::load_plugins(session, host, &self.config.runtime_dirs);
        session.time_mark("loading plugins");
        self.finish_settings(session, host)?;
        self.restore_history(session);
        self.load_quickfix(session, host)?;
        self.read_stdin(session, host)?;
        self.start_ui(session, host);
        self.open_windows(session, host)?;
        self.run_commands(session, host);
        self.enter(session, host);
        Ok(())
    }

    /// Phase 2
    fn init_options<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) {
        let (columns, rows) = host.screen_size();
        let mut options = Options::derive(columns, rows, &Locale::from_env());
        let overrides = &self.params.overrides;
        options.apply_overrides(overrides);
        options.errorfile = self.config.errorfile.clone();
        options.shada = match &overrides.shada_file {
            Some(path) if path.as_os_str() == "NONE" => None,
            Some(path) => Some(path.clone()),
            None => self.config.shada_file.clone(),
        };
        options.term = self.params.terminal_name.clone();
        options.debug_break_level = self.params.debug_break_level;
        options.diff = self.params.diff_mode;
        session.options = options;

        if self.params.diff_mode && self.params.window_count == WindowCount::Unset {
            self.params.window_count = WindowCount::OnePerFile;
        }
        self.plan.count = self.params.window_count.resolve(session.args.len());

        if session.args.len() > 1 && !session.silent_mode {
            let message = format!("{} files to edit", session.args.len());
            host.show_message(session, &message);
        }
        session.time_mark("init options");
    }

    /// Phase 3
    fn init_terminal<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) {
        let params = &self.params;
        let check = terminal::check_tty(
            params.headless,
            session.mode.ex_mode.is_some(),
            params.want_full_screen && !session.silent_mode,
            params.tty,
            session.scripts.input.is_some(),
        );
        if check.silent {
            session.silent_mode = true;
        }
        terminal::report_tty_check(PROGRAM_NAME, &check);
        if !check.warnings.is_empty() {
            session.time_mark("warning delay");
        }

        session.reading_input = terminal::select_input_stream(
            params.headless,
            params.tty,
            params.edit_mode == EditMode::ReadStdin,
        );
        if let Some(stream) = session.reading_input {
            host.start_input(stream);
        }
        session.time_mark("init terminal");
    }

    /// Phase 4
    fn run_pre_commands<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) {
        let commands = mem::take(&mut self.params.pre_commands);
        if commands.is_empty() {
            return;
        }
        for command in commands {
            host.execute_command(session, &command, CommandOrigin::PreVimrc);
        }
        session.time_mark("--cmd commands");
    }

    /// Phase 7
    fn finish_settings<H: Host + ?Sized>(
        &mut self,
        session: &mut Session,
        host: &mut H,
    ) -> Result<(), StartupError> {
        if self.params.diff_mode && self.plan.layout == crate::args::WindowLayout::Unset {
            self.plan.layout = session.options.diff_layout(session.args.len());
        }

        if session.recovery_mode && session.args.is_empty() {
            host.list_swap_files(session);
            return Err(StartupError::SwapFilesListed);
        }

        if self.params.no_swap_file {
            session.options.updatecount = 0;
        }
        session.options.reconcile_keymaps();
        session.time_mark("init options after scripts");
        Ok(())
    }

    /// Phase 8
    fn restore_history(&mut self, session: &mut Session) {
        if let Some(path) = session.options.shada.clone() {
            session.history = PersistedState::load_or_default(&path);
            session.time_mark("reading persisted state");
        }
    }

    /// Phase 9
    fn load_quickfix<H: Host + ?Sized>(
        &mut self,
        session: &mut Session,
        host: &mut H,
    ) -> Result<(), StartupError> {
        if !matches!(self.params.edit_mode, EditMode::QuickfixFile(_)) {
            return Ok(());
        }
        if let Some(path) = &self.params.errorfile_override {
            session.options.errorfile = path.clone();
        }
        let path = session.options.errorfile.clone();
        host.load_error_file(session, &path)
            .map_err(|source| StartupError::Quickfix { path, source })?;
        session.time_mark("reading errorfile");
        Ok(())
    }

    /// Phase 10
    fn read_stdin<H: Host + ?Sized>(
        &mut self,
        session: &mut Session,
        host: &mut H,
    ) -> Result<(), StartupError> {
        if self.params.edit_mode == EditMode::ReadStdin && !session.recovery_mode {
            match host.read_stdin_document(session) {
                OpenOutcome::Opened => session.time_mark("reading stdin"),
                OpenOutcome::Quit | OpenOutcome::Abort => return Err(StartupError::Quit),
            }
        }
        if session.reading_input.is_some()
            && (session.flags.need_wait_return || session.flags.msg_didany)
        {
            host.wait_return(session);
        }
        Ok(())
    }

    /// Phase 11
    fn start_ui<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) {
        if !self.params.headless {
            host.stop_input();
            host.start_ui(session);
            session.time_mark("starting UI");
        }
        if session.mode.ex_mode.is_none() {
            session.flags.redraw_later(RedrawType::Clear);
        }
    }

    /// Phase 12
    fn open_windows<H: Host + ?Sized>(
        &mut self,
        session: &mut Session,
        host: &mut H,
    ) -> Result<(), StartupError> {
        windows::create_windows(session, host, &mut self.plan)?;
        session.time_mark("opening buffers");
        session.swap_command = None;

        if session.mode.ex_mode.is_some() {
            windows::cursor_to_last_line(session);
        }
        let buffer = session.layout.current_window().buffer;
        host.fire_hook(session, Hook::BufEnter, Some(buffer));
        session.time_mark("BufEnter autocommands");

        let quickfix = matches!(self.params.edit_mode, EditMode::QuickfixFile(_));
        if quickfix {
            host.jump_to_first_error(session);
            session.time_mark("jump to first error");
        }

        windows::edit_buffers(session, host, &self.plan)?;
        session.time_mark("editing files in windows");

        if self.params.diff_mode {
            let tab = session.layout.current_tab_index();
            for window in session.layout.windows_mut() {
                window.diff = true;
            }
            tracing::debug!(tab, "diff options applied");
        }

        if let Some(tag) = self.params.tag_name.clone() {
            session.swap_quit = false;
            host.execute_command(session, &format!("ta {tag}"), CommandOrigin::CommandLine);
            if session.swap_quit {
                return Err(StartupError::Quit);
            }
            session.time_mark("jumping to tag");
        }
        Ok(())
    }

    /// Phase 13
    fn run_commands<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) {
        let commands = mem::take(&mut self.params.pending_commands);
        if commands.is_empty() {
            return;
        }

        session.flags.msg_scroll = true;
        if self.params.tag_name.is_none() && session.cursor().line <= 1 {
            let mut cursor = session.cursor();
            cursor.line = 0;
            session.set_cursor(cursor);
        }
        for command in commands {
            host.execute_command(session, &command, CommandOrigin::CommandLine);
        }
        if session.cursor().line == 0 {
            let mut cursor = session.cursor();
            cursor.line = 1;
            session.set_cursor(cursor);
        }
        if session.mode.ex_mode.is_none() {
            session.flags.msg_scroll = false;
        }

        if matches!(self.params.edit_mode, EditMode::QuickfixFile(_)) {
            host.jump_to_first_error(session);
        }
        session.time_mark("executing command arguments");
    }

    /// Phase 14
    fn enter<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) {
        session.flags.redrawing_disabled = false;
        session.flags.redraw_later(RedrawType::NotValid);
        session.starting = false;

        if session.options.insertmode {
            session.flags.need_start_insertmode = true;
        }

        if !session.vim_entered {
            session.vim_entered = true;
            let buffer = session.layout.current_window().buffer;
            host.fire_hook(session, Hook::VimEnter, Some(buffer));
            session.time_mark("VimEnter autocommands");
        }
        session.time_mark("before starting main loop");
    }
}

/// In diff mode a directory argument means "the same file in that
/// directory" as the first argument
fn expand_diff_args(files: Vec<PathBuf>, diff_mode: bool) -> Vec<PathBuf> {
    if !diff_mode {
        return files;
    }
    let first = files.first().filter(|f| !f.is_dir()).cloned();
    files
        .into_iter()
        .enumerate()
        .map(|(i, file)| match (&first, i) {
            (Some(first), i) if i > 0 && file.is_dir() => match first.file_name() {
                Some(tail) => file.join(tail),
                None => file,
            },
            _ => file,
        })
        .collect()
}

/// Allocate and run every phase
pub fn start<H: Host + ?Sized>(
    params: StartupParameters,
    config: Config,
    host: &mut H,
) -> Result<Session, StartupError> {
    let mut startup = Startup::new(params, config);
    let mut session = startup.allocate()?;
    startup.run(&mut session, host)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_diff_args() {
        let dir = tempfile::tempdir().unwrap();
        let first = PathBuf::from("src/notes.txt");
        let files = vec![first.clone(), dir.path().to_path_buf()];

        let expanded = expand_diff_args(files.clone(), true);
        assert_eq!(expanded[0], first);
        assert_eq!(expanded[1], dir.path().join("notes.txt"));

        assert_eq!(expand_diff_args(files.clone(), false), files);
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(StartupError::FirstWindow.exit_code(), 0);
        assert_eq!(StartupError::Quit.exit_code(), 1);
        assert_eq!(StartupError::SwapFilesListed.exit_code(), 0);
        assert_eq!(
            StartupError::Quickfix {
                path: PathBuf::from("errors.err"),
                source: HostError::Quickfix("E40".into()),
            }
            .exit_code(),
            3
        );
        assert!(StartupError::Quit.runs_shutdown());
        assert!(!StartupError::FirstWindow.runs_shutdown());
    }

    #[test]
    fn test_allocate_names_buffers() {
        let params = StartupParameters {
            files: vec![PathBuf::from("a"), PathBuf::from("b")],
            ..StartupParameters::default()
        };
        let mut startup = Startup::new(params, Config::default());
        let session = startup.allocate().unwrap();
        assert_eq!(session.args.len(), 2);
        assert_eq!(
            session.layout.current_buffer().unwrap().name,
            Some(PathBuf::from("a"))
        );
        assert_eq!(session.layout.buffers().len(), 2);
        assert_eq!(session.layout.current_window().arg_idx, Some(0));
    }
}
