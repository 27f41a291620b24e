//! Startup timing
//!
//! `--startuptime {file}` appends one line per startup phase. Each line has
//! the elapsed time since start and the time since the previous line, both
//! in milliseconds.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

#[derive(Debug)]
pub struct StartupTimer {
    start: Instant,
    prev: Instant,
    out: Option<BufWriter<File>>,
}

impl StartupTimer {
    /// Start timing. Without a usable file, phases are only traced.
    pub fn new(path: Option<&Path>) -> Self {
        let out = path.and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(BufWriter::new(file)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "cannot open startup time log: {e}");
                    None
                },
            }
        });
        let now = Instant::now();
        let mut timer = Self {
            start: now,
            prev: now,
            out,
        };
        if let Some(out) = timer.out.as_mut() {
            let _ = writeln!(out, "\n\ntimes in msec\n clock   self: sourced script\n");
        }
        timer.mark("--- MOCHI STARTING ---");
        timer
    }

    /// Record the end of a phase
    pub fn mark(&mut self, message: &str) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start).as_secs_f64() * 1000.0;
        let own = now.duration_since(self.prev).as_secs_f64() * 1000.0;
        self.prev = now;

        tracing::debug!(elapsed_ms = elapsed, self_ms = own, "{message}");
        if let Some(out) = self.out.as_mut() {
            let _ = writeln!(out, "{elapsed:07.3}  {own:07.3}: {message}");
        }
    }

    /// Close the log after the first screen update
    pub fn finish(mut self) {
        self.mark("--- MOCHI STARTED ---");
        if let Some(mut out) = self.out.take() {
            let _ = out.flush();
        }
    }

    pub fn is_logging(&self) -> bool {
        self.out.is_some()
    }
}
