//! Shutdown sequence
//!
//! Fires the exit hooks, writes the persisted state and works out the final
//! exit code. A hook may start another shutdown; the user-visible hooks
//! only fire on the first attempt.

use std::path::{self, PathBuf};

use crate::host::{Hook, Host};
use crate::session::{BufferId, Session};

/// Run the exit hooks and persist state, returning the code to exit with
pub fn run<H: Host + ?Sized>(session: &mut Session, host: &mut H, code: i32) -> i32 {
    session.exit.exiting = true;
    session.exit.attempts += 1;
    let first_attempt = session.exit.attempts == 1;
    tracing::info!(code, attempt = session.exit.attempts, "shutting down");

    let mut code = code;
    if session.mode.ex_mode.is_some() {
        code += session.exit.ex_error_count;
    }

    cursor_to_bottom(session, host);

    if first_attempt {
        fire_window_leave(session, host);
        fire_unload(session, host);
        let buffer = current_buffer(session);
        host.fire_hook(session, Hook::VimLeavePre, buffer);
    }

    write_history(session);

    if first_attempt {
        let buffer = current_buffer(session);
        host.fire_hook(session, Hook::VimLeave, buffer);
    }

    if session.exit.error_displayed {
        host.wait_return(session);
    }

    // Hooks may have moved it
    cursor_to_bottom(session, host);
    code
}

/// Run the sequence, give the terminal back and end the process
pub fn exit<H: Host + ?Sized>(mut session: Session, host: &mut H, code: i32) -> ! {
    let code = run(&mut session, host, code);
    host.release_resources();
    // Closes the script files
    drop(session);
    std::process::exit(code)
}

fn current_buffer(session: &Session) -> Option<BufferId> {
    Some(session.layout.current_window().buffer)
}

fn cursor_to_bottom<H: Host + ?Sized>(session: &Session, host: &mut H) {
    host.cursor_goto(session.options.lines.saturating_sub(1), 0);
}

/// BufWinLeave once per buffer, starting over after every hook since
/// handlers may close windows
fn fire_window_leave<H: Host + ?Sized>(session: &mut Session, host: &mut H) {
    loop {
        let next = session
            .layout
            .tabs()
            .iter()
            .flat_map(|tab| tab.windows.iter())
            .map(|window| window.buffer)
            .find(|&id| session.layout.buffer(id).is_some_and(|b| !b.leave_fired));
        let Some(buffer) = next else {
            break;
        };
        if let Some(buf) = session.layout.buffer_mut(buffer) {
            buf.leave_fired = true;
        }
        host.fire_hook(session, Hook::BufWinLeave, Some(buffer));
    }
}

/// BufUnload for each loaded buffer. Stops when a handler deleted the
/// buffer it was called for.
fn fire_unload<H: Host + ?Sized>(session: &mut Session, host: &mut H) {
    let loaded: Vec<BufferId> = session
        .layout
        .buffers()
        .iter()
        .filter(|b| b.loaded)
        .map(|b| b.id)
        .collect();
    for buffer in loaded {
        if !session.layout.buffer(buffer).is_some_and(|b| b.loaded) {
            continue;
        }
        host.fire_hook(session, Hook::BufUnload, Some(buffer));
        if session.layout.buffer(buffer).is_none() {
            tracing::debug!(?buffer, "buffer deleted by BufUnload handler");
            break;
        }
    }
}

/// Files edited this session, current buffer first, then the newest
fn recent_files(session: &Session) -> Vec<PathBuf> {
    let current = session.layout.current_window().buffer;
    let mut buffers: Vec<_> = session.layout.buffers().iter().collect();
    buffers.sort_by_key(|b| (b.id != current, std::cmp::Reverse(b.id)));
    buffers
        .into_iter()
        .filter_map(|b| b.name.as_deref())
        .map(|name| path::absolute(name).unwrap_or_else(|_| name.to_path_buf()))
        .collect()
}

fn write_history(session: &mut Session) {
    let Some(path) = session.options.shada.clone() else {
        tracing::debug!("persisted state disabled");
        return;
    };
    let recent = recent_files(session);
    session.history.merge_oldfiles(recent);
    if let Err(e) = session.history.write(&path) {
        tracing::warn!("{e}");
    }
}
