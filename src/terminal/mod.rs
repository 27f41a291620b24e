//! Terminal plumbing
//!
//! Probing which standard streams are terminals, choosing the stream that
//! keyboard input is read from, raw mode and the window size. Everything
//! here talks to the OS through `nix`.

pub mod signal;

use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::io::RawFd;
use std::time::Duration;

use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};

/// Error type for terminal operations
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("Failed to read terminal attributes: {0}")]
    GetAttributes(#[source] nix::Error),

    #[error("Failed to set terminal attributes: {0}")]
    SetAttributes(#[source] nix::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] nix::Error),

    #[error("Failed to read input: {0}")]
    Read(#[source] nix::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type TerminalResult<T> = Result<T, TerminalError>;

/// How long the "not a terminal" warning stays up
pub const WARNING_DELAY: Duration = Duration::from_secs(2);

/// Which standard streams are connected to a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TtyState {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
}

impl TtyState {
    /// Ask the OS about all three streams
    pub fn probe() -> Self {
        let check = |fd: RawFd| nix::unistd::isatty(fd).unwrap_or(false);
        let state = Self {
            stdin: check(nix::libc::STDIN_FILENO),
            stdout: check(nix::libc::STDOUT_FILENO),
            stderr: check(nix::libc::STDERR_FILENO),
        };
        tracing::debug!(?state, "probed terminal streams");
        state
    }

    /// All three streams are terminals
    pub fn all() -> Self {
        Self {
            stdin: true,
            stdout: true,
            stderr: true,
        }
    }

    pub fn any(&self) -> bool {
        self.stdin || self.stdout || self.stderr
    }
}

/// A standard stream used for keyboard input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStream {
    Stdin,
    Stdout,
    Stderr,
}

impl InputStream {
    pub fn raw_fd(self) -> RawFd {
        match self {
            InputStream::Stdin => nix::libc::STDIN_FILENO,
            InputStream::Stdout => nix::libc::STDOUT_FILENO,
            InputStream::Stderr => nix::libc::STDERR_FILENO,
        }
    }

    fn with_fd<R>(self, f: impl FnOnce(BorrowedFd<'_>) -> R) -> R {
        match self {
            InputStream::Stdin => f(io::stdin().as_fd()),
            InputStream::Stdout => f(io::stdout().as_fd()),
            InputStream::Stderr => f(io::stderr().as_fd()),
        }
    }
}

/// Pick the stream keyboard input is read from during startup.
///
/// Nothing is opened when headless or when no stream is a terminal. Stdin
/// is preferred unless the document itself comes from stdin; after that a
/// terminal stderr, and stdout last.
pub fn select_input_stream(
    headless: bool,
    tty: TtyState,
    document_from_stdin: bool,
) -> Option<InputStream> {
    if headless || !tty.any() {
        return None;
    }
    if tty.stdin && !document_from_stdin {
        Some(InputStream::Stdin)
    } else if tty.stderr {
        Some(InputStream::Stderr)
    } else {
        Some(InputStream::Stdout)
    }
}

/// What the startup terminal check decided
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TtyCheck {
    pub warnings: Vec<&'static str>,
    /// Block for [`WARNING_DELAY`] after printing the warnings
    pub delay: bool,
    /// Ex mode without a terminal on stdin runs silently
    pub silent: bool,
}

/// Decide whether to warn about missing terminals
pub fn check_tty(
    headless: bool,
    ex_mode: bool,
    want_full_screen: bool,
    tty: TtyState,
    has_script_input: bool,
) -> TtyCheck {
    let mut check = TtyCheck::default();
    if headless {
        return check;
    }
    if ex_mode {
        check.silent = !tty.stdin;
    } else if want_full_screen && !tty.stderr && (!tty.stdout || !tty.stdin) {
        if !tty.stdout {
            check.warnings.push("Output is not to a terminal");
        }
        if !tty.stdin {
            check.warnings.push("Input is not from a terminal");
        }
        check.delay = !has_script_input;
    }
    check
}

/// Print the warnings from [`check_tty`] and wait if asked to
pub fn report_tty_check(program: &str, check: &TtyCheck) {
    if check.warnings.is_empty() {
        return;
    }
    let mut stderr = io::stderr();
    for warning in &check.warnings {
        let _ = writeln!(stderr, "{program}: Warning: {warning}");
    }
    let _ = stderr.flush();
    if check.delay {
        std::thread::sleep(WARNING_DELAY);
    }
}

/// Window size of the terminal on `fd` as (columns, rows)
pub fn window_size(fd: RawFd) -> Option<(u16, u16)> {
    use nix::libc;
    use nix::pty::Winsize;

    let mut ws = Winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some((ws.ws_col, ws.ws_row))
    } else {
        None
    }
}

/// RAII guard for raw terminal mode
pub struct RawModeGuard {
    stream: InputStream,
    original: Termios,
}

impl RawModeGuard {
    pub fn new(stream: InputStream) -> TerminalResult<Self> {
        let original = stream
            .with_fd(|fd| termios::tcgetattr(fd))
            .map_err(TerminalError::GetAttributes)?;

        let mut raw = original.clone();
        raw.local_flags.remove(LocalFlags::ICANON);
        raw.local_flags.remove(LocalFlags::ECHO);
        raw.local_flags.remove(LocalFlags::ISIG);
        raw.local_flags.remove(LocalFlags::IEXTEN);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        stream
            .with_fd(|fd| termios::tcsetattr(fd, SetArg::TCSANOW, &raw))
            .map_err(TerminalError::SetAttributes)?;

        Ok(Self { stream, original })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let original = &self.original;
        let _ = self
            .stream
            .with_fd(|fd| termios::tcsetattr(fd, SetArg::TCSANOW, original));
    }
}

/// Read one byte from `fd`. `None` at end of input.
pub fn read_byte(fd: RawFd) -> TerminalResult<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match nix::unistd::read(fd, &mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(nix::errno::Errno::EINTR) => {
                if signal::interrupt_pending() {
                    return Ok(Some(signal::CTRL_C));
                }
            },
            Err(e) => return Err(TerminalError::Read(e)),
        }
    }
}
