//! Interrupt latch
//!
//! `SIGINT` (and a Ctrl-C byte read in raw mode) sets a process-wide flag.
//! The dispatch loop samples it once per iteration through
//! [`crate::host::Host::interrupt_check`].

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use super::{TerminalError, TerminalResult};

/// Byte produced by Ctrl-C in raw mode
pub const CTRL_C: u8 = 0x03;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_signal: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the `SIGINT` handler
pub fn install_interrupt_handler() -> TerminalResult<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only stores to an atomic.
    unsafe { sigaction(Signal::SIGINT, &action) }.map_err(TerminalError::Signal)?;
    tracing::debug!("SIGINT handler installed");
    Ok(())
}

/// Latch an interrupt
pub fn raise_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Whether an interrupt is latched, without clearing it
pub fn interrupt_pending() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Consume the latch
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}
