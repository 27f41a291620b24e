//! Window creation and the initial file loads

use crate::args::WindowLayout;
use crate::host::{Host, HostError, OpenOutcome};
use crate::session::{Position, Session};

use super::StartupError;

/// Guard against hooks that keep unloading buffers
const MAX_OPEN_ROUNDS: usize = 1000;

/// Layout and count, resolved as windows get created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct WindowPlan {
    pub layout: WindowLayout,
    pub count: usize,
}

/// Split or tab the screen, then load a buffer into every window that has
/// none yet. Recovery mode recovers into the first window instead.
pub(super) fn create_windows<H: Host + ?Sized>(
    session: &mut Session,
    host: &mut H,
    plan: &mut WindowPlan,
) -> Result<(), StartupError> {
    if plan.count > 1 {
        if plan.layout == WindowLayout::Unset {
            plan.layout = WindowLayout::Horizontal;
        }
        plan.count = match plan.layout {
            WindowLayout::Tabs => session
                .layout
                .make_tabs(plan.count, session.options.tabpagemax),
            layout if session.layout.window_count() == 1 => {
                let vertical = layout == WindowLayout::Vertical;
                let space = if vertical {
                    session.options.columns
                } else {
                    session.options.lines - session.options.cmdheight
                };
                session.layout.split(plan.count, vertical, space)
            },
            _ => session.layout.window_count(),
        };
    } else {
        plan.count = 1;
    }
    tracing::debug!(layout = ?plan.layout, count = plan.count, "windows created");

    if session.recovery_mode {
        session.flags.msg_scroll = true;
        host.recover(session).map_err(StartupError::Recovery)?;
        let recovered = session.layout.current_buffer().is_some_and(|b| b.loaded);
        if !recovered {
            return Err(StartupError::Recovery(HostError::Recovery(
                "E305: No swap file found".to_string(),
            )));
        }
        return Ok(());
    }

    let tabs = plan.layout == WindowLayout::Tabs;
    let mut rewind = true;
    for _ in 0..MAX_OPEN_ROUNDS {
        if rewind {
            rewind_windows(session, tabs);
        } else if tabs {
            if !session.layout.next_tab() {
                break;
            }
        } else if !session.layout.next_window() {
            break;
        }
        rewind = false;

        let buffer = session.layout.current_window().buffer;
        let loaded = session.layout.buffer(buffer).is_some_and(|b| b.loaded);
        if !loaded {
            match host.open_document(session, buffer) {
                OpenOutcome::Opened => {},
                outcome => {
                    latch_interrupt(session, host);
                    if outcome == OpenOutcome::Abort
                        || session.flags.interrupt_requested
                        || session.layout.only_one_window()
                    {
                        session.exit.error_displayed = false;
                        return Err(StartupError::Quit);
                    }
                    // Closed once every window is filled
                    if let Some(buf) = session.layout.buffer_mut(buffer) {
                        buf.name = None;
                        buf.loaded = true;
                    }
                    let window = session.layout.current_window_mut();
                    window.arg_idx = None;
                    window.close_pending = true;
                },
            }
            rewind = true;
        }

        if host.interrupt_check() {
            host.flush_input();
            break;
        }
    }

    rewind_windows(session, tabs);
    Ok(())
}

/// Ctrl-C typed at the swap dialog
fn latch_interrupt<H: Host + ?Sized>(session: &mut Session, host: &H) {
    if host.interrupt_pending() {
        session.flags.interrupt_requested = true;
    }
}

fn rewind_windows(session: &mut Session, tabs: bool) {
    if tabs {
        session.layout.goto_first_tab();
    }
    session.layout.goto_first_window();
}

/// Edit the remaining arguments in the other windows
pub(super) fn edit_buffers<H: Host + ?Sized>(
    session: &mut Session,
    host: &mut H,
    plan: &WindowPlan,
) -> Result<(), StartupError> {
    let tabs = plan.layout == WindowLayout::Tabs;
    let mut advance = true;

    if session.layout.current_window().close_pending {
        session.layout.close_current_window();
        advance = false;
    }

    let mut arg_idx = 1;
    for _ in 1..plan.count {
        if session.layout.current_window().close_pending {
            arg_idx += 1;
            session.layout.close_current_window();
            advance = false;
            continue;
        }
        if advance {
            let moved = if tabs {
                session.layout.next_tab()
            } else {
                session.layout.next_window()
            };
            if !moved {
                break;
            }
        }
        advance = true;

        let current = session.layout.current_window().buffer;
        let unnamed = session
            .layout
            .buffer(current)
            .map_or(true, |b| b.name.is_none());
        if Some(current) == first_window_buffer(session) || unnamed {
            session.layout.current_window_mut().arg_idx = Some(arg_idx);
            let name = session.args.get(arg_idx).cloned();
            let target = session.layout.add_buffer(name);
            session.layout.show_buffer(target);

            let loaded = session.layout.buffer(target).is_some_and(|b| b.loaded);
            if !loaded {
                match host.open_document(session, target) {
                    OpenOutcome::Opened => {},
                    outcome => {
                        latch_interrupt(session, host);
                        if outcome == OpenOutcome::Abort
                            || session.flags.interrupt_requested
                            || session.layout.only_one_window()
                        {
                            session.exit.error_displayed = false;
                            return Err(StartupError::Quit);
                        }
                        session.layout.close_current_window();
                        advance = false;
                    },
                }
            }
            if arg_idx + 1 == session.args.len() {
                session.arg_had_last = true;
            }
            arg_idx += 1;
        }

        if host.interrupt_check() {
            host.flush_input();
            break;
        }
    }

    if tabs {
        session.layout.goto_first_tab();
    }
    // Make the first window current, skipping a preview window
    let preview_free = session
        .layout
        .current_tab()
        .windows
        .iter()
        .position(|w| !w.preview)
        .unwrap_or(0);
    let tab = session.layout.current_tab_index();
    session.layout.set_current(tab, preview_free);
    Ok(())
}

fn first_window_buffer(session: &Session) -> Option<crate::session::BufferId> {
    session
        .layout
        .tabs()
        .first()
        .and_then(|t| t.windows.first())
        .map(|w| w.buffer)
}

/// Ex mode starts on the last line
pub(super) fn cursor_to_last_line(session: &mut Session) {
    let last = session.line_count().max(1);
    session.set_cursor(Position::new(last, 0));
}
