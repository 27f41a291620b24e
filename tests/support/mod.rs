//! Recording host shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use mochi_edit::args::{scan, ScanOutcome, StartupParameters};
use mochi_edit::host::{CommandOrigin, Hook, Host, HostError, OpenOutcome, RedrawKind, StepOutcome};
use mochi_edit::session::{BufferId, Session};

/// Parse arguments that must start the editor
pub fn params(args: &[&str]) -> StartupParameters {
    match scan(args.iter().copied()) {
        Ok(ScanOutcome::Start(params)) => params,
        other => panic!("expected parameters, got {other:?}"),
    }
}

/// Records every call in order. Behaviour is configured through the pub
/// fields.
#[derive(Default)]
pub struct RecordingHost {
    pub events: Vec<String>,
    /// Scripts that source successfully
    pub scripts: HashSet<PathBuf>,
    /// Outcome per buffer name; anything else opens
    pub open_outcomes: HashMap<PathBuf, OpenOutcome>,
    pub stdin_outcome: Option<OpenOutcome>,
    pub quickfix_error: Option<String>,
    pub recover_loads: bool,
    /// Hooks with handlers
    pub hooks: HashSet<Hook>,
    /// Lines each opened document gets
    pub line_count: usize,
    /// `:ta` quits at the swap dialog
    pub tag_quits: bool,
    pub steps: VecDeque<StepOutcome>,
    pub interrupts: VecDeque<bool>,
    /// Ctrl-C waiting when a swap dialog is answered
    pub interrupt_pending: bool,
    pub typeahead: String,
    /// Cursor line when each command ran
    pub exec_cursors: Vec<usize>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            line_count: 1,
            ..Self::default()
        }
    }

    fn record(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    /// Position of the first event starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.events.iter().position(|e| e.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events.iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn has_hook_fired(&self, hook: Hook) -> bool {
        self.position(&format!("hook:{}", hook.name())).is_some()
    }

    /// Assert the events appear in this order
    pub fn assert_order(&self, prefixes: &[&str]) {
        let positions: Vec<usize> = prefixes
            .iter()
            .map(|p| {
                self.position(p)
                    .unwrap_or_else(|| panic!("no event {p:?} in {:#?}", self.events))
            })
            .collect();
        assert!(
            positions.windows(2).all(|w| w[0] < w[1]),
            "events out of order: {prefixes:?} in {:#?}",
            self.events
        );
    }
}

impl Host for RecordingHost {
    fn start_input(&mut self, stream: mochi_edit::terminal::InputStream) {
        self.record(format!("start_input:{stream:?}"));
    }

    fn stop_input(&mut self) {
        self.record("stop_input");
    }

    fn show_message(&mut self, _session: &mut Session, message: &str) {
        self.record(format!("message:{message}"));
    }

    fn execute_command(&mut self, session: &mut Session, command: &str, origin: CommandOrigin) {
        self.record(format!("exec:{}:{command}", origin.label()));
        self.exec_cursors.push(session.cursor().line);
        if self.tag_quits && command.starts_with("ta ") {
            session.swap_quit = true;
        }
    }

    fn source_script(&mut self, _session: &mut Session, path: &Path) -> Result<(), HostError> {
        if self.scripts.contains(path) {
            self.record(format!("source:{}", path.display()));
            Ok(())
        } else {
            Err(HostError::NotFound(path.to_path_buf()))
        }
    }

    fn open_document(&mut self, session: &mut Session, buffer: BufferId) -> OpenOutcome {
        let name = session
            .layout
            .buffer(buffer)
            .and_then(|b| b.name.clone())
            .unwrap_or_default();
        self.record(format!("open:{}", name.display()));
        let outcome = self
            .open_outcomes
            .get(&name)
            .copied()
            .unwrap_or(OpenOutcome::Opened);
        if outcome == OpenOutcome::Opened {
            if let Some(buf) = session.layout.buffer_mut(buffer) {
                buf.loaded = true;
                buf.line_count = self.line_count;
            }
        }
        outcome
    }

    fn read_stdin_document(&mut self, session: &mut Session) -> OpenOutcome {
        self.record("read_stdin");
        if let Some(buf) = session.layout.current_buffer_mut() {
            buf.loaded = true;
        }
        self.stdin_outcome.unwrap_or(OpenOutcome::Opened)
    }

    fn load_error_file(&mut self, _session: &mut Session, path: &Path) -> Result<(), HostError> {
        self.record(format!("load_error_file:{}", path.display()));
        match &self.quickfix_error {
            Some(message) => Err(HostError::Quickfix(message.clone())),
            None => Ok(()),
        }
    }

    fn jump_to_first_error(&mut self, _session: &mut Session) {
        self.record("jump_to_first_error");
    }

    fn recover(&mut self, session: &mut Session) -> Result<(), HostError> {
        self.record("recover");
        if self.recover_loads {
            if let Some(buf) = session.layout.current_buffer_mut() {
                buf.loaded = true;
            }
        }
        Ok(())
    }

    fn list_swap_files(&mut self, _session: &mut Session) {
        self.record("list_swap_files");
    }

    fn start_ui(&mut self, _session: &mut Session) {
        self.record("start_ui");
    }

    fn has_hook(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }

    fn fire_hook(&mut self, _session: &mut Session, hook: Hook, _buffer: Option<BufferId>) {
        self.record(format!("hook:{}", hook.name()));
    }

    fn input_pending(&self) -> bool {
        !self.typeahead.is_empty()
    }

    fn stuff_input(&mut self, keys: &str) {
        self.typeahead.push_str(keys);
    }

    fn flush_input(&mut self) {
        self.record("flush_input");
        self.typeahead.clear();
    }

    fn interrupt_check(&mut self) -> bool {
        self.interrupts.pop_front().unwrap_or(false)
    }

    fn interrupt_pending(&self) -> bool {
        self.interrupt_pending
    }

    fn wait_return(&mut self, _session: &mut Session) {
        self.record("wait_return");
    }

    fn redraw(&mut self, _session: &mut Session, kind: RedrawKind) {
        self.record(format!("redraw:{kind:?}"));
    }

    fn modal_step(&mut self, _session: &mut Session) -> StepOutcome {
        self.record("modal_step");
        self.typeahead.clear();
        self.steps.pop_front().unwrap_or(StepOutcome::Exit(0))
    }

    fn line_step(&mut self, _session: &mut Session, improved: bool) -> StepOutcome {
        self.record(format!("line_step:{improved}"));
        self.steps.pop_front().unwrap_or(StepOutcome::Exit(0))
    }

    fn cursor_goto(&mut self, row: u16, col: u16) {
        self.record(format!("cursor_goto:{row},{col}"));
    }
}
