//! Main dispatch loop
//!
//! Each iteration checks the idle work, samples the interrupt latch once,
//! redraws what changed and hands one command to the interpreter. The same
//! loop serves the command-line window (`cmdwin`) and `:global` followed by
//! `:visual` (`noexmode`).

use std::ops::ControlFlow;

use crate::host::{Hook, Host, RedrawKind, StepOutcome};
use crate::session::{Position, Session};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The interpreter asked to end the session
    Exit(i32),
    /// Ex mode was entered in a `noexmode` loop, or the command-line
    /// window produced a result
    Returned,
}

/// Loop state that lives across iterations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MainLoop {
    /// Running inside the command-line window
    pub cmdwin: bool,
    /// Return as soon as Ex mode is entered
    pub noexmode: bool,
    /// The previous iteration saw an interrupt
    previous_interrupt: bool,
}

impl MainLoop {
    /// The loop startup hands the session to
    pub fn top_level() -> Self {
        Self::default()
    }

    pub fn new(cmdwin: bool, noexmode: bool) -> Self {
        Self {
            cmdwin,
            noexmode,
            previous_interrupt: false,
        }
    }

    pub fn previous_interrupt(&self) -> bool {
        self.previous_interrupt
    }

    /// Iterate until the interpreter or the command-line window ends it
    pub fn run<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) -> LoopExit {
        tracing::info!(cmdwin = self.cmdwin, noexmode = self.noexmode, "entering main loop");
        loop {
            if self.cmdwin && session.mode.cmdwin_result.is_some() {
                return LoopExit::Returned;
            }
            if let ControlFlow::Break(exit) = self.iterate(session, host) {
                tracing::debug!(?exit, "main loop finished");
                return exit;
            }
        }
    }

    /// One cycle of the loop
    pub fn iterate<H: Host + ?Sized>(
        &mut self,
        session: &mut Session,
        host: &mut H,
    ) -> ControlFlow<LoopExit> {
        let input_empty = !host.input_pending();
        if input_empty {
            self.idle_work(session, host);
        }

        self.handle_interrupt(session, host);

        if session.flags.skip_redraw || session.mode.ex_mode.is_some() {
            session.flags.skip_redraw = false;
        } else if session.flags.needs_redraw || !host.input_pending() {
            self.redraw(session, host);
        }

        session.flags.garbage_collect_allowed = !self.cmdwin && !self.noexmode;

        let outcome = match session.mode.ex_mode {
            Some(_) if self.noexmode => return ControlFlow::Break(LoopExit::Returned),
            Some(ex_mode) => host.line_step(session, ex_mode == crate::args::ExMode::Improved),
            None => host.modal_step(session),
        };
        match outcome {
            StepOutcome::Continue => ControlFlow::Continue(()),
            StepOutcome::Exit(code) => ControlFlow::Break(LoopExit::Exit(code)),
        }
    }

    /// Work done only when no typeahead is waiting
    fn idle_work<H: Host + ?Sized>(&self, session: &mut Session, host: &mut H) {
        if session.flags.need_check_timestamps {
            session.flags.need_check_timestamps = false;
            host.check_timestamps(session);
        }
        if session.flags.need_wait_return {
            session.flags.need_wait_return = false;
            host.wait_return(session);
        }
        if session.flags.need_start_insertmode
            && session.options.insertmode
            && !session.mode.visual_active
        {
            session.flags.need_start_insertmode = false;
            host.stuff_input("i");
            // Shown after Insert mode ends instead
            session.flags.need_fileinfo = false;
        }
    }

    /// Absorb a single interrupt. A second one in a row during
    /// `:global/pat/visual` drops back to Ex mode with the interrupt kept,
    /// so that it aborts the `:global`.
    fn handle_interrupt<H: Host + ?Sized>(&mut self, session: &mut Session, host: &mut H) {
        if host.interrupt_check() {
            session.flags.interrupt_requested = true;
        }

        if session.flags.interrupt_requested {
            let mode = &mut session.mode;
            if self.noexmode && mode.global_busy && mode.ex_mode.is_none() && self.previous_interrupt
            {
                tracing::debug!("second interrupt, back to Ex mode");
                mode.ex_mode = Some(crate::args::ExMode::Normal);
                mode.insert_active = false;
            } else if !mode.global_busy || mode.ex_mode.is_none() {
                if !session.flags.quit_more {
                    host.flush_input();
                }
                session.flags.interrupt_requested = false;
            }
            self.previous_interrupt = true;
        } else {
            self.previous_interrupt = false;
        }

        if session.mode.ex_mode.is_none() {
            session.flags.msg_scroll = false;
        }
        session.flags.quit_more = false;
    }

    fn redraw<H: Host + ?Sized>(&self, session: &mut Session, host: &mut H) {
        self.fire_change_hooks(session, host);

        host.update_viewport(session);
        validate_cursor(session);

        let kind = if session.mode.visual_active {
            Some(RedrawKind::VisualInverted)
        } else if let Some(kind) = session.flags.must_redraw.take() {
            Some(RedrawKind::Full(kind))
        } else if session.flags.redraw_cmdline {
            session.flags.redraw_cmdline = false;
            Some(RedrawKind::ModeLine)
        } else {
            None
        };
        if let Some(kind) = kind {
            host.redraw(session, kind);
        }
        host.redraw(session, RedrawKind::StatusLines);

        if let Some(message) = session.keep_msg.take() {
            host.show_message(session, &message);
        }
        if session.flags.need_fileinfo {
            host.show_fileinfo(session);
            session.flags.need_fileinfo = false;
        }

        session.flags.emsg_on_display = false;
        session.exit.error_displayed = false;
        session.flags.msg_didany = false;
        host.place_cursor(session);
        session.flags.needs_redraw = false;

        if let Some(timer) = session.timer.take() {
            timer.finish();
        }
    }

    /// CursorMoved, then TextChanged. Shadows move only after the hook
    /// has run.
    fn fire_change_hooks<H: Host + ?Sized>(&self, session: &mut Session, host: &mut H) {
        if session.mode.finish_op {
            return;
        }

        let cursor = session.cursor();
        if host.has_hook(Hook::CursorMoved) && cursor != session.shadow.last_cursor {
            let buffer = session.layout.current_window().buffer;
            host.fire_hook(session, Hook::CursorMoved, Some(buffer));
            session.shadow.last_cursor = cursor;
        }

        let buffer = session.layout.current_window().buffer;
        let Some(tick) = session.layout.buffer(buffer).map(|b| b.changedtick) else {
            return;
        };
        if host.has_hook(Hook::TextChanged) && tick != session.shadow.last_changedtick {
            if session.shadow.last_changedtick_buf == Some(buffer) {
                host.fire_hook(session, Hook::TextChanged, Some(buffer));
            }
            session.shadow.last_changedtick_buf = Some(buffer);
            session.shadow.last_changedtick = tick;
        }
    }
}

/// Keep the cursor inside the buffer
fn validate_cursor(session: &mut Session) {
    let cursor = session.cursor();
    let last = session.line_count().max(1);
    let line = cursor.line.clamp(1, last);
    if line != cursor.line {
        session.set_cursor(Position::new(line, cursor.col));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CommandOrigin, HostError, OpenOutcome};
    use crate::session::BufferId;
    use std::path::Path;

    #[derive(Default)]
    struct StubHost {
        hooks: Vec<Hook>,
        fired: Vec<Hook>,
        interrupts: Vec<bool>,
        flushed: usize,
        redraws: Vec<RedrawKind>,
        messages: Vec<String>,
        steps: usize,
        stuffed: String,
    }

    impl Host for StubHost {
        fn show_message(&mut self, _session: &mut Session, message: &str) {
            self.messages.push(message.to_string());
        }
        fn execute_command(&mut self, _: &mut Session, _: &str, _: CommandOrigin) {}
        fn source_script(&mut self, _: &mut Session, path: &Path) -> Result<(), HostError> {
            Err(HostError::NotFound(path.to_path_buf()))
        }
        fn open_document(&mut self, _: &mut Session, _: BufferId) -> OpenOutcome {
            OpenOutcome::Opened
        }
        fn read_stdin_document(&mut self, _: &mut Session) -> OpenOutcome {
            OpenOutcome::Opened
        }
        fn load_error_file(&mut self, _: &mut Session, _: &Path) -> Result<(), HostError> {
            Ok(())
        }
        fn recover(&mut self, _: &mut Session) -> Result<(), HostError> {
            Ok(())
        }
        fn has_hook(&self, hook: Hook) -> bool {
            self.hooks.contains(&hook)
        }
        fn fire_hook(&mut self, _: &mut Session, hook: Hook, _: Option<BufferId>) {
            self.fired.push(hook);
        }
        fn input_pending(&self) -> bool {
            !self.stuffed.is_empty()
        }
        fn stuff_input(&mut self, keys: &str) {
            self.stuffed.push_str(keys);
        }
        fn flush_input(&mut self) {
            self.flushed += 1;
            self.stuffed.clear();
        }
        fn interrupt_check(&mut self) -> bool {
            if self.interrupts.is_empty() {
                false
            } else {
                self.interrupts.remove(0)
            }
        }
        fn wait_return(&mut self, _: &mut Session) {}
        fn redraw(&mut self, _: &mut Session, kind: RedrawKind) {
            self.redraws.push(kind);
        }
        fn modal_step(&mut self, _: &mut Session) -> StepOutcome {
            self.steps += 1;
            StepOutcome::Continue
        }
        fn line_step(&mut self, _: &mut Session, _: bool) -> StepOutcome {
            StepOutcome::Exit(7)
        }
    }

    #[test]
    fn test_cursor_moved_before_text_changed() {
        let mut session = Session::default();
        let mut host = StubHost {
            hooks: vec![Hook::CursorMoved, Hook::TextChanged],
            ..StubHost::default()
        };
        let mut main = MainLoop::top_level();

        // Prime the changedtick shadow on the current buffer
        session.layout.current_buffer_mut().unwrap().touch();
        let _ = main.iterate(&mut session, &mut host);
        host.fired.clear();

        session.layout.current_buffer_mut().unwrap().line_count = 5;
        session.layout.current_buffer_mut().unwrap().touch();
        session.set_cursor(Position::new(3, 0));
        let _ = main.iterate(&mut session, &mut host);
        assert_eq!(host.fired, vec![Hook::CursorMoved, Hook::TextChanged]);

        host.fired.clear();
        let _ = main.iterate(&mut session, &mut host);
        assert!(host.fired.is_empty());
    }

    #[test]
    fn test_no_hooks_while_operator_pending() {
        let mut session = Session::default();
        session.mode.finish_op = true;
        session.set_cursor(Position::new(1, 4));
        let mut host = StubHost {
            hooks: vec![Hook::CursorMoved],
            ..StubHost::default()
        };
        let _ = MainLoop::top_level().iterate(&mut session, &mut host);
        assert!(host.fired.is_empty());
    }

    #[test]
    fn test_single_interrupt_absorbed() {
        let mut session = Session::default();
        let mut host = StubHost {
            interrupts: vec![true],
            ..StubHost::default()
        };
        let mut main = MainLoop::top_level();
        let _ = main.iterate(&mut session, &mut host);
        assert!(!session.flags.interrupt_requested);
        assert_eq!(host.flushed, 1);
        assert!(main.previous_interrupt());
    }

    #[test]
    fn test_second_interrupt_escalates_during_global() {
        let mut session = Session::default();
        session.mode.global_busy = true;
        let mut host = StubHost {
            interrupts: vec![true, true],
            ..StubHost::default()
        };
        let mut main = MainLoop::new(false, true);

        // First one is absorbed; the :global keeps going
        assert_eq!(main.iterate(&mut session, &mut host), ControlFlow::Continue(()));
        assert!(!session.flags.interrupt_requested);
        assert!(session.mode.ex_mode.is_none());

        // Second one drops back to Ex mode and the loop returns
        assert_eq!(
            main.iterate(&mut session, &mut host),
            ControlFlow::Break(LoopExit::Returned)
        );
        assert!(session.flags.interrupt_requested);
        assert_eq!(session.mode.ex_mode, Some(crate::args::ExMode::Normal));
    }

    #[test]
    fn test_redraw_pass_and_keep_msg() {
        let mut session = Session::default();
        session.flags.redraw_later(crate::session::RedrawType::Clear);
        session.keep_msg = Some("written".into());
        session.exit.error_displayed = true;
        let mut host = StubHost::default();
        let _ = MainLoop::top_level().iterate(&mut session, &mut host);

        assert_eq!(
            host.redraws,
            vec![
                RedrawKind::Full(crate::session::RedrawType::Clear),
                RedrawKind::StatusLines
            ]
        );
        assert_eq!(host.messages, vec!["written".to_string()]);
        assert!(session.keep_msg.is_none());
        assert!(!session.exit.error_displayed);
        assert_eq!(host.steps, 1);
    }

    #[test]
    fn test_skip_redraw_consumed() {
        let mut session = Session::default();
        session.flags.skip_redraw = true;
        let mut host = StubHost::default();
        let _ = MainLoop::top_level().iterate(&mut session, &mut host);
        assert!(host.redraws.is_empty());
        assert!(!session.flags.skip_redraw);
    }

    #[test]
    fn test_auto_insert_when_idle() {
        let mut session = Session::default();
        session.options.insertmode = true;
        session.flags.need_start_insertmode = true;
        session.flags.need_fileinfo = true;
        let mut host = StubHost::default();
        let _ = MainLoop::top_level().iterate(&mut session, &mut host);
        assert_eq!(host.stuffed, "i");
        assert!(!session.flags.need_fileinfo);
        assert!(!session.flags.need_start_insertmode);
    }

    #[test]
    fn test_garbage_collect_only_at_top_level() {
        let mut session = Session::default();
        let mut host = StubHost::default();
        let _ = MainLoop::top_level().iterate(&mut session, &mut host);
        assert!(session.flags.garbage_collect_allowed);
        let _ = MainLoop::new(true, false).iterate(&mut session, &mut host);
        assert!(!session.flags.garbage_collect_allowed);
    }

    #[test]
    fn test_ex_mode_line_step_exit() {
        let mut session = Session::default();
        session.mode.ex_mode = Some(crate::args::ExMode::Improved);
        let mut host = StubHost::default();
        assert_eq!(MainLoop::top_level().run(&mut session, &mut host), LoopExit::Exit(7));
    }

    #[test]
    fn test_cmdwin_returns_on_result() {
        let mut session = Session::default();
        session.mode.cmdwin_result = Some(1);
        let mut host = StubHost::default();
        assert_eq!(MainLoop::new(true, false).run(&mut session, &mut host), LoopExit::Returned);
        assert_eq!(host.steps, 0);
    }

    #[test]
    fn test_cursor_clamped_to_buffer() {
        let mut session = Session::default();
        session.set_cursor(Position::new(40, 2));
        let mut host = StubHost::default();
        let _ = MainLoop::top_level().iterate(&mut session, &mut host);
        assert_eq!(session.cursor(), Position::new(1, 2));
    }
}
