//! Terminal host
//!
//! A small line editor behind the [`Host`] trait so the binary runs on its
//! own: documents are plain line vectors, the screen shows the current
//! window, and a handful of Normal-mode keys and Ex commands work. Keys come
//! from typeahead first, then the `-s` script, then the terminal.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use unicode_width::UnicodeWidthChar;

use super::commands::{self, ExCommand, LineSpec};
use super::{CommandOrigin, Hook, Host, HostError, OpenOutcome, RedrawKind, StepOutcome};
use crate::app::Config;
use crate::args::ExMode;
use crate::session::{BufferId, Position, RedrawType, Session};
use crate::terminal::{self, signal, InputStream, RawModeGuard};

const ESC: u8 = 0x1b;
const BACKSPACE: u8 = 0x7f;
const CTRL_H: u8 = 0x08;

/// Nested `:source` limit
const MAX_SOURCE_DEPTH: usize = 200;

/// Messages kept for `messages()`
const MAX_MESSAGES: usize = 100;

/// One location from the error file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickfixEntry {
    pub file: PathBuf,
    pub line: usize,
    pub col: usize,
    pub text: String,
}

impl QuickfixEntry {
    /// `file:line:col: text` or `file:line: text`
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, ':');
        let file = parts.next().filter(|f| !f.trim().is_empty())?;
        let lnum = parts.next()?.trim().parse().ok()?;
        let rest = parts.next().unwrap_or("");
        let (col, text) = match rest.split_once(':') {
            Some((col, text)) if col.trim().parse::<usize>().is_ok() => {
                (col.trim().parse().unwrap_or(1), text)
            },
            _ => (1, rest),
        };
        Some(Self {
            file: PathBuf::from(file.trim()),
            line: lnum,
            col,
            text: text.trim().to_string(),
        })
    }
}

/// Answer to the swap-file dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwapChoice {
    Edit,
    ReadOnly,
    Recover,
    Quit,
    Abort,
}

/// The bundled host
pub struct BasicHost {
    headless: bool,
    config: Config,
    documents: HashMap<BufferId, Vec<String>>,
    mtimes: HashMap<BufferId, SystemTime>,
    swap_files: HashMap<BufferId, PathBuf>,
    hooks: HashMap<Hook, Vec<String>>,
    firing: Vec<Hook>,
    quickfix: Vec<QuickfixEntry>,
    typeahead: VecDeque<u8>,
    stream: Option<InputStream>,
    raw: Option<RawModeGuard>,
    stdin_consumed: bool,
    ui_active: bool,
    top: usize,
    source_depth: usize,
    messages: Vec<String>,
}

impl BasicHost {
    pub fn new(headless: bool, config: Config) -> Self {
        Self {
            headless,
            config,
            documents: HashMap::new(),
            mtimes: HashMap::new(),
            swap_files: HashMap::new(),
            hooks: HashMap::new(),
            firing: Vec::new(),
            quickfix: Vec::new(),
            typeahead: VecDeque::new(),
            stream: None,
            raw: None,
            stdin_consumed: false,
            ui_active: false,
            top: 0,
            source_depth: 0,
            messages: Vec::new(),
        }
    }

    /// Text of a loaded buffer
    pub fn document(&self, buffer: BufferId) -> Option<&[String]> {
        self.documents.get(&buffer).map(Vec::as_slice)
    }

    /// The last messages shown, oldest first
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn quickfix(&self) -> &[QuickfixEntry] {
        &self.quickfix
    }

    // Input

    fn next_key(&mut self, session: &mut Session) -> Option<u8> {
        if let Some(key) = self.typeahead.pop_front() {
            return Some(key);
        }

        let mut key = None;
        if let Some(script) = session.scripts.input.as_mut() {
            let mut buf = [0u8; 1];
            match script.file.read(&mut buf) {
                Ok(1) => key = Some(buf[0]),
                Ok(_) => {
                    tracing::debug!(path = %script.path.display(), "script input finished");
                    session.scripts.input = None;
                },
                Err(e) => {
                    tracing::warn!(path = %script.path.display(), "script input: {e}");
                    session.scripts.input = None;
                },
            }
        }
        let key = match key {
            Some(key) => key,
            None => self.read_terminal()?,
        };

        if key == signal::CTRL_C {
            signal::raise_interrupt();
        }
        if let Some(out) = session.scripts.output.as_mut() {
            if let Err(e) = out.file.write_all(&[key]) {
                tracing::warn!(path = %out.path.display(), "script output: {e}");
            }
        }
        Some(key)
    }

    fn read_terminal(&mut self) -> Option<u8> {
        let fd = match self.stream {
            Some(stream) => stream.raw_fd(),
            None if self.headless || self.stdin_consumed => return None,
            None => nix::libc::STDIN_FILENO,
        };
        match terminal::read_byte(fd) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("{e}");
                None
            },
        }
    }

    /// A whole UTF-8 character starting with `first`
    fn read_char(&mut self, session: &mut Session, first: u8) -> Option<char> {
        let len = match first {
            0x00..=0x7f => 1,
            0xc0..=0xdf => 2,
            0xe0..=0xef => 3,
            _ => 4,
        };
        let mut bytes = vec![first];
        while bytes.len() < len {
            bytes.push(self.next_key(session)?);
        }
        std::str::from_utf8(&bytes).ok()?.chars().next()
    }

    /// Read up to Enter. `None` at end of input with nothing typed; Escape
    /// gives an empty line.
    fn read_line(&mut self, session: &mut Session, prompt: Option<char>) -> Option<String> {
        let mut line = String::new();
        loop {
            if let Some(prompt) = prompt {
                self.draw_bottom_line(session, &format!("{prompt}{line}"));
            }
            let Some(key) = self.next_key(session) else {
                return (!line.is_empty()).then_some(line);
            };
            match key {
                b'\r' | b'\n' => return Some(line),
                ESC | signal::CTRL_C => return Some(String::new()),
                BACKSPACE | CTRL_H => {
                    if line.pop().is_none() && prompt.is_some() {
                        return Some(String::new());
                    }
                },
                _ => {
                    if let Some(c) = self.read_char(session, key) {
                        line.push(c);
                    }
                },
            }
        }
    }

    // Documents

    fn current_lines(&self, session: &Session) -> &[String] {
        let buffer = session.layout.current_window().buffer;
        self.document(buffer).unwrap_or(&[])
    }

    fn current_lines_mut(&mut self, session: &Session) -> &mut Vec<String> {
        let buffer = session.layout.current_window().buffer;
        self.documents
            .entry(buffer)
            .or_insert_with(|| vec![String::new()])
    }

    fn load(&mut self, session: &mut Session, buffer: BufferId, lines: Vec<String>) {
        if let Some(buf) = session.layout.buffer_mut(buffer) {
            buf.loaded = true;
            buf.line_count = lines.len();
            buf.readonly = session.options.readonly;
            buf.modifiable = session.options.modifiable;
        }
        self.documents.insert(buffer, lines);
    }

    fn can_modify(&mut self, session: &mut Session) -> bool {
        let modifiable = session.options.modifiable
            && session.layout.current_buffer().is_some_and(|b| b.modifiable);
        if !modifiable {
            self.show_error(session, "E21: Cannot make changes, 'modifiable' is off");
        }
        modifiable
    }

    /// Bump the change counter and keep the swap file in step
    fn changed(&mut self, session: &mut Session) {
        let buffer = session.layout.current_window().buffer;
        let line_count = self.current_lines(session).len();
        let updatecount = session.options.updatecount as u64;
        let Some(buf) = session.layout.buffer_mut(buffer) else {
            return;
        };
        buf.touch();
        buf.line_count = line_count;
        let tick = buf.changedtick;
        let name = buf.name.clone();
        if updatecount > 0 && (tick - 1) % updatecount == 0 {
            if let Some(name) = name {
                self.write_swap(buffer, &name);
            }
        }
    }

    fn write_swap(&mut self, buffer: BufferId, name: &Path) {
        let Some(swap) = self.config.swap_file_for(name) else {
            return;
        };
        let Some(lines) = self.documents.get(&buffer) else {
            return;
        };
        let result = swap
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&swap, join_lines(lines)));
        match result {
            Ok(()) => {
                self.swap_files.insert(buffer, swap);
            },
            Err(e) => tracing::warn!(path = %swap.display(), "swap file: {e}"),
        }
    }

    fn remove_swap(&mut self, buffer: BufferId) {
        if let Some(swap) = self.swap_files.remove(&buffer) {
            let _ = fs::remove_file(swap);
        }
    }

    fn swap_dialog(&mut self, session: &mut Session, path: &Path) -> SwapChoice {
        if session.options.updatecount == 0 {
            return SwapChoice::Edit;
        }
        let Some(swap) = self.config.swap_file_for(path).filter(|s| s.exists()) else {
            return SwapChoice::Edit;
        };
        let mut message = format!(
            "E325: ATTENTION\nFound a swap file \"{}\" while opening \"{}\"",
            swap.display(),
            path.display()
        );
        if let Some(command) = &session.swap_command {
            message.push_str(&format!("\nStartup command: {}", command.trim_end()));
        }
        self.show_message(session, &message);

        if self.headless || (self.stream.is_none() && !self.ui_active) {
            return SwapChoice::Edit;
        }
        self.show_message(
            session,
            "[O]pen Read-Only, (E)dit anyway, (R)ecover, (Q)uit, (A)bort: ",
        );
        match self.next_key(session).map(|k| k.to_ascii_lowercase()) {
            Some(b'e') => SwapChoice::Edit,
            Some(b'r') => SwapChoice::Recover,
            Some(b'q') => SwapChoice::Quit,
            Some(b'a') | None => SwapChoice::Abort,
            Some(_) => SwapChoice::ReadOnly,
        }
    }

    fn write_buffer(&mut self, session: &mut Session, path: Option<&str>, force: bool) -> bool {
        if !session.options.write {
            self.show_error(
                session,
                "E142: File not written: Writing is disabled by 'write' option",
            );
            return false;
        }
        let buffer = session.layout.current_window().buffer;
        let Some((name, readonly)) = session
            .layout
            .buffer(buffer)
            .map(|b| (b.name.clone(), b.readonly))
        else {
            return false;
        };
        if readonly && !force && path.is_none() {
            self.show_error(session, "E45: 'readonly' option is set (add ! to override)");
            return false;
        }
        let Some(target) = path.map(PathBuf::from).or_else(|| name.clone()) else {
            self.show_error(session, "E32: No file name");
            return false;
        };

        let lines = self.current_lines(session);
        let count = lines.len();
        if let Err(e) = fs::write(&target, join_lines(lines)) {
            tracing::warn!(path = %target.display(), "write failed: {e}");
            let message = format!("E212: Can't open file for writing: {}", target.display());
            self.show_error(session, &message);
            return false;
        }

        if name.is_none() || name.as_deref() == Some(target.as_path()) {
            if let Some(buf) = session.layout.buffer_mut(buffer) {
                buf.name = Some(target.clone());
                buf.saved_tick = buf.changedtick;
            }
            if let Ok(mtime) = fs::metadata(&target).and_then(|m| m.modified()) {
                self.mtimes.insert(buffer, mtime);
            }
            self.remove_swap(buffer);
        }
        let message = format!("\"{}\" {count}L written", target.display());
        self.show_message(session, &message);
        true
    }

    fn quit(&mut self, session: &mut Session, all: bool, force: bool) {
        if all {
            let modified = session.layout.buffers().iter().find(|b| b.is_modified());
            if let (Some(buffer), false) = (modified, force) {
                let message = format!(
                    "E162: No write since last change for buffer \"{}\"",
                    buffer.display_name()
                );
                self.show_error(session, &message);
                return;
            }
            session.exit.request(0);
            return;
        }

        let modified = session.layout.current_buffer().is_some_and(|b| b.is_modified());
        if session.layout.only_one_window() {
            if modified && !force {
                self.show_error(session, "E37: No write since last change (add ! to override)");
            } else {
                session.exit.request(0);
            }
        } else {
            session.layout.close_current_window();
            session.flags.redraw_later(RedrawType::NotValid);
        }
    }

    fn edit(&mut self, session: &mut Session, path: &str, force: bool) {
        let modified = session.layout.current_buffer().is_some_and(|b| b.is_modified());
        if modified && !force {
            self.show_error(session, "E37: No write since last change (add ! to override)");
            return;
        }
        let buffer = session.layout.add_buffer(Some(PathBuf::from(path)));
        session.layout.show_buffer(buffer);
        let loaded = session.layout.buffer(buffer).is_some_and(|b| b.loaded);
        if !loaded && self.open_document(session, buffer) != OpenOutcome::Opened {
            return;
        }
        session.set_cursor(Position::new(1, 0));
        self.fire_hook(session, Hook::BufEnter, Some(buffer));
    }

    fn goto_line(&mut self, session: &mut Session, line: usize) {
        let last = session.line_count().max(1);
        session.set_cursor(Position::new(line.clamp(1, last), 0));
    }

    fn search(&mut self, session: &mut Session, pattern: &str) -> bool {
        session.history.remember_search(pattern);
        let start = session.cursor().line;
        let lines = self.current_lines(session);
        let count = lines.len();
        let found = (0..count)
            .map(|offset| (start + offset) % count.max(1))
            .find_map(|idx| {
                lines[idx]
                    .find(pattern)
                    .map(|byte| (idx + 1, lines[idx][..byte].chars().count()))
            });
        match found {
            Some((line, col)) => {
                session.set_cursor(Position::new(line, col));
                true
            },
            None => {
                let message = format!("E486: Pattern not found: {pattern}");
                self.show_error(session, &message);
                false
            },
        }
    }

    fn jump_to_error(&mut self, session: &mut Session, index: usize) {
        if self.quickfix.is_empty() {
            self.show_error(session, "E42: No Errors");
            return;
        }
        let Some(entry) = self.quickfix.get(index).cloned() else {
            self.show_error(session, "E553: No more items");
            return;
        };
        let buffer = session.layout.add_buffer(Some(entry.file.clone()));
        session.layout.show_buffer(buffer);
        let loaded = session.layout.buffer(buffer).is_some_and(|b| b.loaded);
        if !loaded && self.open_document(session, buffer) != OpenOutcome::Opened {
            return;
        }
        self.goto_line(session, entry.line);
        let mut cursor = session.cursor();
        cursor.col = entry.col.saturating_sub(1);
        session.set_cursor(cursor);
        let message = format!("({} of {}): {}", index + 1, self.quickfix.len(), entry.text);
        self.show_message(session, &message);
    }

    /// `:tag` through the configured tags file (`name<Tab>file<Tab>address`)
    fn jump_to_tag(&mut self, session: &mut Session, name: &str) {
        let text = match fs::read_to_string(&self.config.tags) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("tags file: {e}");
                self.show_error(session, "E433: No tags file");
                return;
            },
        };
        let entry = text.lines().find_map(|line| {
            let mut fields = line.split('\t');
            (fields.next() == Some(name))
                .then(|| Some((fields.next()?.to_string(), fields.next().unwrap_or("").to_string())))
                .flatten()
        });
        let Some((file, address)) = entry else {
            let message = format!("E426: tag not found: {name}");
            self.show_error(session, &message);
            return;
        };

        let buffer = session.layout.add_buffer(Some(PathBuf::from(file)));
        session.layout.show_buffer(buffer);
        let loaded = session.layout.buffer(buffer).is_some_and(|b| b.loaded);
        if !loaded {
            match self.open_document(session, buffer) {
                OpenOutcome::Opened => {},
                OpenOutcome::Quit | OpenOutcome::Abort => {
                    session.swap_quit = true;
                    return;
                },
            }
        }

        let address = address.trim_end_matches(";\"");
        if let Ok(line) = address.parse() {
            self.goto_line(session, line);
        } else if let Some(pattern) = address.strip_prefix('/') {
            let pattern = pattern.strip_suffix('/').unwrap_or(pattern);
            let pattern = pattern.trim_start_matches('^').trim_end_matches('$');
            session.set_cursor(Position::new(1, 0));
            self.search(session, pattern);
        }
    }

    /// Common tail of `modal_step` and `line_step`
    fn finish_step(&self, session: &mut Session) -> StepOutcome {
        // Recheck files read from disk once the loop is idle again
        if !self.mtimes.is_empty() {
            session.flags.need_check_timestamps = true;
        }
        match session.exit.requested_code.take() {
            Some(code) => StepOutcome::Exit(code),
            None => StepOutcome::Continue,
        }
    }

    // Keys

    fn normal_key(&mut self, session: &mut Session, key: u8) {
        let cursor = session.cursor();
        let line_len = self
            .current_lines(session)
            .get(cursor.line.saturating_sub(1))
            .map_or(0, |l| l.chars().count());
        match key {
            b'h' => session.set_cursor(Position::new(cursor.line, cursor.col.saturating_sub(1))),
            b'l' => {
                let col = (cursor.col + 1).min(line_len.saturating_sub(1));
                session.set_cursor(Position::new(cursor.line, col));
            },
            b'j' => self.goto_line(session, cursor.line + 1),
            b'k' => self.goto_line(session, cursor.line.saturating_sub(1)),
            b'0' => session.set_cursor(Position::new(cursor.line, 0)),
            b'$' => session.set_cursor(Position::new(cursor.line, line_len.saturating_sub(1))),
            b'G' => self.goto_line(session, usize::MAX),
            b'x' => {
                if line_len > 0 && self.can_modify(session) {
                    let text = &mut self.current_lines_mut(session)[cursor.line - 1];
                    let start = byte_index(text, cursor.col);
                    let end = byte_index(text, cursor.col + 1);
                    text.replace_range(start..end, "");
                    self.changed(session);
                    let col = cursor.col.min(line_len.saturating_sub(2));
                    session.set_cursor(Position::new(cursor.line, col));
                }
            },
            b'i' => self.start_insert(session),
            b'a' => {
                session.set_cursor(Position::new(cursor.line, (cursor.col + 1).min(line_len)));
                self.start_insert(session);
            },
            b'o' => {
                if self.can_modify(session) {
                    self.current_lines_mut(session)
                        .insert(cursor.line, String::new());
                    self.changed(session);
                    session.set_cursor(Position::new(cursor.line + 1, 0));
                    session.mode.insert_active = true;
                    session.flags.redraw_cmdline = true;
                }
            },
            b':' => {
                if let Some(line) = self.read_line(session, Some(':')) {
                    self.execute_command(session, &line, CommandOrigin::User);
                }
                session.flags.redraw_cmdline = true;
            },
            b'/' => {
                if let Some(pattern) = self.read_line(session, Some('/')) {
                    if !pattern.is_empty() {
                        self.search(session, &pattern);
                    }
                }
                session.flags.redraw_cmdline = true;
            },
            b'Q' => session.mode.ex_mode = Some(ExMode::Normal),
            b'v' => {
                session.mode.visual_active = !session.mode.visual_active;
                session.flags.redraw_cmdline = true;
            },
            ESC => {
                session.mode.visual_active = false;
                session.flags.redraw_cmdline = true;
            },
            _ => tracing::trace!(key, "unmapped key"),
        }
    }

    fn start_insert(&mut self, session: &mut Session) {
        if self.can_modify(session) {
            session.mode.insert_active = true;
            session.flags.redraw_cmdline = true;
        }
    }

    fn insert_key(&mut self, session: &mut Session, key: u8) {
        let cursor = session.cursor();
        let row = cursor.line.saturating_sub(1);
        match key {
            ESC => {
                session.mode.insert_active = false;
                session.flags.redraw_cmdline = true;
                session.set_cursor(Position::new(cursor.line, cursor.col.saturating_sub(1)));
                return;
            },
            b'\r' | b'\n' => {
                let lines = self.current_lines_mut(session);
                let at = byte_index(&lines[row], cursor.col);
                let tail = lines[row].split_off(at);
                lines.insert(row + 1, tail);
                session.set_cursor(Position::new(cursor.line + 1, 0));
            },
            BACKSPACE | CTRL_H => {
                let lines = self.current_lines_mut(session);
                if cursor.col > 0 {
                    let start = byte_index(&lines[row], cursor.col - 1);
                    let end = byte_index(&lines[row], cursor.col);
                    lines[row].replace_range(start..end, "");
                    session.set_cursor(Position::new(cursor.line, cursor.col - 1));
                } else if row > 0 {
                    let line = lines.remove(row);
                    let col = lines[row - 1].chars().count();
                    lines[row - 1].push_str(&line);
                    session.set_cursor(Position::new(cursor.line - 1, col));
                } else {
                    return;
                }
            },
            _ => {
                let Some(c) = self.read_char(session, key) else {
                    return;
                };
                if c.is_control() && c != '\t' {
                    return;
                }
                let text = &mut self.current_lines_mut(session)[row];
                let at = byte_index(text, cursor.col);
                text.insert(at, c);
                session.set_cursor(Position::new(cursor.line, cursor.col + 1));
            },
        }
        self.changed(session);
    }

    // Screen

    fn text_rows(session: &Session) -> usize {
        (session.options.lines as usize).saturating_sub(2).max(1)
    }

    fn write_screen(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn draw_window(&self, session: &Session, clear: bool) {
        let width = session.options.columns as usize;
        let lines = self.current_lines(session);
        let mut out = String::new();
        if clear {
            out.push_str("\x1b[2J");
        }
        out.push_str("\x1b[H");
        for row in 0..Self::text_rows(session) {
            match lines.get(self.top + row) {
                Some(line) => out.push_str(&fit(line, width)),
                None => out.push('~'),
            }
            out.push_str("\x1b[K\r\n");
        }
        self.write_screen(&out);
        self.draw_status_line(session);
    }

    fn draw_status_line(&self, session: &Session) {
        let width = session.options.columns as usize;
        let row = Self::text_rows(session) + 1;
        let buffer = session.layout.current_buffer();
        let name = buffer.map_or_else(|| "[No Name]".to_string(), |b| b.display_name());
        let flag = if buffer.is_some_and(|b| b.is_modified()) { " [+]" } else { "" };
        let cursor = session.cursor();
        let left = format!("{name}{flag}");
        let right = format!("{},{}", cursor.line, cursor.col + 1);
        let pad = width.saturating_sub(left.chars().count() + right.len() + 1);
        let status = fit(&format!("{left}{}{right} ", " ".repeat(pad)), width);
        self.write_screen(&format!("\x1b[{row};1H\x1b[7m{status}\x1b[0m\x1b[K"));
    }

    fn draw_bottom_line(&self, session: &Session, text: &str) {
        if !self.ui_active {
            return;
        }
        let row = session.options.lines;
        let width = session.options.columns as usize;
        self.write_screen(&format!("\x1b[{row};1H{}\x1b[K", fit(text, width)));
    }

    fn mode_text(session: &Session) -> &'static str {
        if session.mode.insert_active {
            "-- INSERT --"
        } else if session.mode.visual_active {
            "-- VISUAL --"
        } else {
            ""
        }
    }
}

impl Host for BasicHost {
    fn screen_size(&self) -> (u16, u16) {
        if self.headless {
            return (80, 24);
        }
        terminal::window_size(nix::libc::STDOUT_FILENO)
            .or_else(|| self.stream.and_then(|s| terminal::window_size(s.raw_fd())))
            .unwrap_or((80, 24))
    }

    fn start_input(&mut self, stream: InputStream) {
        tracing::debug!(?stream, "reading keys");
        self.stream = Some(stream);
    }

    fn stop_input(&mut self) {
        self.raw = None;
    }

    fn show_message(&mut self, session: &mut Session, message: &str) {
        tracing::debug!(text = message, "message shown");
        if self.messages.len() == MAX_MESSAGES {
            self.messages.remove(0);
        }
        self.messages.push(message.to_string());
        if self.ui_active {
            session.flags.msg_didany = true;
            self.draw_bottom_line(session, message);
        } else if !session.silent_mode || session.flags.emsg_on_display {
            eprintln!("{message}");
        }
    }

    fn show_error(&mut self, session: &mut Session, message: &str) {
        session.exit.error_displayed = true;
        session.flags.emsg_on_display = true;
        if !self.ui_active && session.starting {
            session.flags.msg_didany = true;
        }
        if session.mode.ex_mode.is_some() {
            session.exit.ex_error_count += 1;
        }
        tracing::info!(text = message, "error shown");
        self.show_message(session, message);
    }

    fn execute_command(&mut self, session: &mut Session, line: &str, origin: CommandOrigin) {
        tracing::trace!(origin = origin.label(), line, "executing");
        if origin == CommandOrigin::User {
            session.history.remember_command(line.trim());
        }
        let command = match commands::parse(line) {
            Ok(command) => command,
            Err(message) => {
                if origin != CommandOrigin::User {
                    let context = format!("Error detected while processing {}:", origin.label());
                    self.show_message(session, &context);
                }
                self.show_error(session, &message);
                return;
            },
        };
        if session.options.secure
            && matches!(command, ExCommand::Autocmd { .. } | ExCommand::Write { .. })
        {
            self.show_error(session, "E523: Not allowed here");
            return;
        }

        match command {
            ExCommand::Nop => {},
            ExCommand::Goto(LineSpec::Number(line)) => self.goto_line(session, line),
            ExCommand::Goto(LineSpec::Last) => self.goto_line(session, usize::MAX),
            ExCommand::Quit { all, force } => self.quit(session, all, force),
            ExCommand::QuitWithError => session.exit.request(1),
            ExCommand::Write { path, force, quit } => {
                if self.write_buffer(session, path, force) && quit {
                    self.quit(session, false, true);
                }
            },
            ExCommand::Edit { path, force } => self.edit(session, path, force),
            ExCommand::Source(path) => match self.source_script(session, Path::new(path)) {
                Ok(()) | Err(HostError::TooRecursive) => {},
                Err(_) => {
                    let message = format!("E484: Can't open file {path}");
                    self.show_error(session, &message);
                },
            },
            ExCommand::Set(args) => {
                for arg in args.split_whitespace() {
                    if let Err(message) = session.options.set_flag(arg) {
                        self.show_error(session, &message);
                    }
                }
                let (readonly, modifiable) =
                    (session.options.readonly, session.options.modifiable);
                if let Some(buffer) = session.layout.current_buffer_mut() {
                    buffer.readonly = readonly;
                    buffer.modifiable = modifiable;
                }
            },
            ExCommand::Echo(text) => self.show_message(session, text),
            ExCommand::Autocmd { event, command } => match Hook::from_name(event) {
                Some(hook) => self.hooks.entry(hook).or_default().push(command.to_string()),
                None => {
                    let message = format!("E216: No such group or event: {event}");
                    self.show_error(session, &message);
                },
            },
            ExCommand::StartInsert => {
                if session.mode.ex_mode.is_none() {
                    session.mode.insert_active = true;
                }
            },
            ExCommand::Tag(name) => self.jump_to_tag(session, name),
            ExCommand::Quickfix(n) => self.jump_to_error(session, n.unwrap_or(1).saturating_sub(1)),
            ExCommand::Visual => session.mode.ex_mode = None,
            ExCommand::Search(pattern) => {
                self.search(session, pattern);
            },
            ExCommand::Redraw => session.flags.redraw_later(RedrawType::Clear),
        }
    }

    fn source_script(&mut self, session: &mut Session, path: &Path) -> Result<(), HostError> {
        if self.source_depth >= MAX_SOURCE_DEPTH {
            let error = HostError::TooRecursive;
            self.show_error(session, &error.to_string());
            return Err(error);
        }
        let text = fs::read_to_string(path).map_err(|e| HostError::io(path, e))?;
        tracing::debug!(path = %path.display(), depth = self.source_depth, "sourcing");
        self.source_depth += 1;
        for line in text.lines() {
            self.execute_command(session, line, CommandOrigin::Script);
        }
        self.source_depth -= 1;
        Ok(())
    }

    fn open_document(&mut self, session: &mut Session, buffer: BufferId) -> OpenOutcome {
        let Some(name) = session.layout.buffer(buffer).map(|b| b.name.clone()) else {
            return OpenOutcome::Opened;
        };
        let Some(path) = name else {
            self.load(session, buffer, vec![String::new()]);
            return OpenOutcome::Opened;
        };

        let choice = self.swap_dialog(session, &path);
        match choice {
            SwapChoice::Quit => return OpenOutcome::Quit,
            SwapChoice::Abort => return OpenOutcome::Abort,
            SwapChoice::Recover => {
                session.layout.show_buffer(buffer);
                if let Err(e) = self.recover(session) {
                    self.show_error(session, &e.to_string());
                }
                return OpenOutcome::Opened;
            },
            SwapChoice::Edit | SwapChoice::ReadOnly => {},
        }

        let lines = match fs::read(&path) {
            Ok(bytes) => {
                let lines = split_lines(&String::from_utf8_lossy(&bytes));
                if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                    self.mtimes.insert(buffer, mtime);
                }
                let message = format!("\"{}\" {}L", path.display(), lines.len());
                self.show_message(session, &message);
                lines
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let message = format!("\"{}\" [New]", path.display());
                self.show_message(session, &message);
                vec![String::new()]
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "open failed: {e}");
                let message = format!("E484: Can't open file {}", path.display());
                self.show_error(session, &message);
                vec![String::new()]
            },
        };
        self.load(session, buffer, lines);
        if choice == SwapChoice::ReadOnly {
            if let Some(buf) = session.layout.buffer_mut(buffer) {
                buf.readonly = true;
            }
        }
        OpenOutcome::Opened
    }

    fn read_stdin_document(&mut self, session: &mut Session) -> OpenOutcome {
        let mut bytes = Vec::new();
        if let Err(e) = io::stdin().lock().read_to_end(&mut bytes) {
            let message = format!("Error reading stdin: {e}");
            self.show_error(session, &message);
        }
        self.stdin_consumed = true;
        let lines = split_lines(&String::from_utf8_lossy(&bytes));
        let buffer = session.layout.current_window().buffer;
        self.load(session, buffer, lines);
        if let Some(buf) = session.layout.buffer_mut(buffer) {
            buf.touch();
        }
        OpenOutcome::Opened
    }

    fn load_error_file(&mut self, _session: &mut Session, path: &Path) -> Result<(), HostError> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                HostError::Quickfix(format!("E40: Can't open errorfile {}", path.display()))
            },
            _ => HostError::io(path, e),
        })?;
        let entries: Vec<_> = text.lines().filter_map(QuickfixEntry::parse).collect();
        if entries.is_empty() {
            return Err(HostError::Quickfix("E42: No Errors".to_string()));
        }
        tracing::debug!(count = entries.len(), "loaded error file");
        self.quickfix = entries;
        Ok(())
    }

    fn jump_to_first_error(&mut self, session: &mut Session) {
        self.jump_to_error(session, 0);
    }

    fn recover(&mut self, session: &mut Session) -> Result<(), HostError> {
        let buffer = session.layout.current_window().buffer;
        let name = session.layout.buffer(buffer).and_then(|b| b.name.clone());
        let Some(name) = name else {
            return Err(HostError::Recovery("E305: No swap file found".to_string()));
        };
        let text = self
            .config
            .swap_file_for(&name)
            .and_then(|swap| fs::read_to_string(swap).ok())
            .ok_or_else(|| {
                HostError::Recovery(format!("E305: No swap file found for {}", name.display()))
            })?;
        self.load(session, buffer, split_lines(&text));
        if let Some(buf) = session.layout.buffer_mut(buffer) {
            buf.touch();
        }
        let message = format!("Recovery completed for \"{}\"", name.display());
        self.show_message(session, &message);
        Ok(())
    }

    fn list_swap_files(&mut self, session: &mut Session) {
        self.show_message(session, "Swap files found:");
        let mut found: Vec<PathBuf> = self
            .config
            .swap_dir
            .as_deref()
            .and_then(|dir| fs::read_dir(dir).ok())
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "swp"))
            .collect();
        found.sort();
        if found.is_empty() {
            self.show_message(session, "   -- none --");
        }
        for (i, swap) in found.iter().enumerate() {
            let message = format!("{}.    {}", i + 1, swap.display());
            self.show_message(session, &message);
        }
    }

    fn start_ui(&mut self, session: &mut Session) {
        let Some(stream) = self.stream else {
            tracing::debug!("no terminal, staying in line mode");
            return;
        };
        match RawModeGuard::new(stream) {
            Ok(guard) => self.raw = Some(guard),
            Err(e) => {
                tracing::warn!("raw mode: {e}");
                return;
            },
        }
        self.write_screen("\x1b[?1049h");
        self.ui_active = true;
        session.flags.redraw_later(RedrawType::Clear);
    }

    fn has_hook(&self, hook: Hook) -> bool {
        self.hooks.get(&hook).is_some_and(|commands| !commands.is_empty())
    }

    fn fire_hook(&mut self, session: &mut Session, hook: Hook, buffer: Option<BufferId>) {
        if self.firing.contains(&hook) {
            return;
        }
        let Some(commands) = self.hooks.get(&hook).cloned() else {
            return;
        };
        tracing::debug!(hook = hook.name(), ?buffer, "firing");
        self.firing.push(hook);
        for command in commands {
            self.execute_command(session, &command, CommandOrigin::Hook(hook));
        }
        self.firing.retain(|h| *h != hook);
    }

    fn input_pending(&self) -> bool {
        !self.typeahead.is_empty()
    }

    fn stuff_input(&mut self, keys: &str) {
        self.typeahead.extend(keys.bytes());
    }

    fn flush_input(&mut self) {
        self.typeahead.clear();
    }

    fn interrupt_check(&mut self) -> bool {
        signal::take_interrupt()
    }

    fn interrupt_pending(&self) -> bool {
        signal::interrupt_pending()
    }

    fn check_timestamps(&mut self, session: &mut Session) {
        let mut changed = Vec::new();
        for (buffer, seen) in self.mtimes.iter_mut() {
            let Some(name) = session.layout.buffer(*buffer).and_then(|b| b.name.as_deref()) else {
                continue;
            };
            if let Ok(mtime) = fs::metadata(name).and_then(|m| m.modified()) {
                if mtime > *seen {
                    *seen = mtime;
                    changed.push(name.display().to_string());
                }
            }
        }
        for name in changed {
            let message = format!("W11: Warning: File \"{name}\" has changed since editing started");
            self.show_message(session, &message);
        }
    }

    fn wait_return(&mut self, session: &mut Session) {
        session.flags.need_wait_return = false;
        if self.stream.is_none() && !self.ui_active {
            return;
        }
        let prompt = "Press ENTER or type command to continue";
        if self.ui_active {
            self.draw_bottom_line(session, prompt);
        } else {
            eprintln!("{prompt}");
        }
        if let Some(b':') = self.next_key(session) {
            self.typeahead.push_front(b':');
        }
        if self.ui_active {
            session.flags.redraw_later(RedrawType::Clear);
        }
    }

    fn update_viewport(&mut self, session: &mut Session) {
        let rows = Self::text_rows(session);
        let line = session.cursor().line.saturating_sub(1);
        if line < self.top {
            self.top = line;
        } else if line >= self.top + rows {
            self.top = line + 1 - rows;
        }
    }

    fn redraw(&mut self, session: &mut Session, kind: RedrawKind) {
        if !self.ui_active {
            return;
        }
        match kind {
            RedrawKind::Full(kind) => self.draw_window(session, kind == RedrawType::Clear),
            RedrawKind::VisualInverted => self.draw_window(session, false),
            RedrawKind::ModeLine => self.draw_bottom_line(session, Self::mode_text(session)),
            RedrawKind::StatusLines => self.draw_status_line(session),
        }
    }

    fn show_fileinfo(&mut self, session: &mut Session) {
        let Some(buffer) = session.layout.current_buffer() else {
            return;
        };
        let message = format!("\"{}\" {} lines", buffer.display_name(), buffer.line_count);
        self.show_message(session, &message);
    }

    fn place_cursor(&mut self, session: &mut Session) {
        if !self.ui_active {
            return;
        }
        let cursor = session.cursor();
        let row = cursor.line.saturating_sub(self.top).max(1);
        let col = self
            .current_lines(session)
            .get(cursor.line.saturating_sub(1))
            .map_or(0, |line| {
                line.chars()
                    .take(cursor.col)
                    .map(|c| c.width().unwrap_or(0))
                    .sum::<usize>()
            });
        self.write_screen(&format!("\x1b[{row};{}H", col + 1));
    }

    fn modal_step(&mut self, session: &mut Session) -> StepOutcome {
        if let Some(code) = session.exit.requested_code.take() {
            return StepOutcome::Exit(code);
        }
        let Some(key) = self.next_key(session) else {
            self.show_error(session, "Error reading input, exiting...");
            return StepOutcome::Exit(1);
        };
        if session.mode.insert_active {
            self.insert_key(session, key);
        } else {
            self.normal_key(session, key);
        }
        self.finish_step(session)
    }

    fn line_step(&mut self, session: &mut Session, _improved: bool) -> StepOutcome {
        if let Some(code) = session.exit.requested_code.take() {
            return StepOutcome::Exit(code);
        }
        if !session.silent_mode {
            eprint!(":");
        }
        let Some(line) = self.read_line(session, None) else {
            return StepOutcome::Exit(0);
        };
        self.execute_command(session, &line, CommandOrigin::User);
        self.finish_step(session)
    }

    fn cursor_goto(&mut self, row: u16, col: u16) {
        if self.ui_active {
            self.write_screen(&format!("\x1b[{};{}H", row + 1, col + 1));
        }
    }

    fn release_resources(&mut self) {
        let swaps: Vec<BufferId> = self.swap_files.keys().copied().collect();
        for buffer in swaps {
            self.remove_swap(buffer);
        }
        if self.ui_active {
            self.write_screen("\x1b[?1049l");
            self.ui_active = false;
        }
        self.raw = None;
    }
}

fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Byte offset of character `col`, or the end of the line
fn byte_index(line: &str, col: usize) -> usize {
    line.char_indices().nth(col).map_or(line.len(), |(i, _)| i)
}

/// Cut `text` to `width` display columns
fn fit(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let c = if c == '\t' { ' ' } else { c };
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> BasicHost {
        BasicHost::new(true, Config::default())
    }

    fn session_with(host: &mut BasicHost, lines: &[&str]) -> Session {
        let mut session = Session::default();
        let buffer = session.layout.current_window().buffer;
        host.load(
            &mut session,
            buffer,
            lines.iter().map(|l| l.to_string()).collect(),
        );
        session.flags.redrawing_disabled = false;
        session
    }

    fn run_keys(host: &mut BasicHost, session: &mut Session, keys: &str) {
        host.stuff_input(keys);
        while host.input_pending() {
            if let StepOutcome::Exit(_) = host.modal_step(session) {
                break;
            }
        }
    }

    fn current_text(host: &BasicHost, session: &Session) -> Vec<String> {
        host.current_lines(session).to_vec()
    }

    #[test]
    fn test_quickfix_entry_parse() {
        assert_eq!(
            QuickfixEntry::parse("src/main.rs:12:5: expected `;`"),
            Some(QuickfixEntry {
                file: PathBuf::from("src/main.rs"),
                line: 12,
                col: 5,
                text: "expected `;`".into(),
            })
        );
        let entry = QuickfixEntry::parse("lib.c:7: warning: unused").unwrap();
        assert_eq!(entry.col, 1);
        assert_eq!(entry.text, "warning: unused");
        assert_eq!(QuickfixEntry::parse("no location here"), None);
    }

    #[test]
    fn test_insert_and_escape() {
        let mut host = host();
        let mut session = session_with(&mut host, &["world"]);
        run_keys(&mut host, &mut session, "ihello \x1b");
        assert_eq!(current_text(&host, &session), vec!["hello world"]);
        assert_eq!(session.cursor(), Position::new(1, 5));
        assert!(!session.mode.insert_active);
        assert!(session.layout.current_buffer().unwrap().is_modified());
    }

    #[test]
    fn test_open_line_and_delete() {
        let mut host = host();
        let mut session = session_with(&mut host, &["abc"]);
        run_keys(&mut host, &mut session, "xoline two\x1b");
        assert_eq!(current_text(&host, &session), vec!["bc", "line two"]);
        assert_eq!(session.line_count(), 2);
    }

    #[test]
    fn test_multibyte_insert() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        run_keys(&mut host, &mut session, "ié漢\x1b");
        assert_eq!(current_text(&host, &session), vec!["é漢"]);
    }

    #[test]
    fn test_motions() {
        let mut host = host();
        let mut session = session_with(&mut host, &["one", "two", "three"]);
        run_keys(&mut host, &mut session, "jj$");
        assert_eq!(session.cursor(), Position::new(3, 4));
        run_keys(&mut host, &mut session, "k0");
        assert_eq!(session.cursor(), Position::new(2, 0));
        run_keys(&mut host, &mut session, "G");
        assert_eq!(session.cursor().line, 3);
    }

    #[test]
    fn test_colon_quit_requests_exit() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        host.stuff_input(":q\r");
        assert_eq!(host.modal_step(&mut session), StepOutcome::Exit(0));
    }

    #[test]
    fn test_quit_refused_when_modified() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        session.layout.current_buffer_mut().unwrap().touch();
        host.execute_command(&mut session, "q", CommandOrigin::User);
        assert_eq!(session.exit.requested_code, None);
        assert!(host.messages().last().unwrap().starts_with("E37"));
        host.execute_command(&mut session, "q!", CommandOrigin::User);
        assert_eq!(session.exit.requested_code, Some(0));
    }

    #[test]
    fn test_cquit() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        host.execute_command(&mut session, "cq", CommandOrigin::CommandLine);
        assert_eq!(host.modal_step(&mut session), StepOutcome::Exit(1));
    }

    #[test]
    fn test_write_and_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut host = host();
        let mut session = session_with(&mut host, &["first", "second"]);
        session.layout.current_buffer_mut().unwrap().touch();

        let command = format!("w {}", path.display());
        host.execute_command(&mut session, &command, CommandOrigin::User);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
        assert!(!session.layout.current_buffer().unwrap().is_modified());

        let other = dir.path().join("other.txt");
        fs::write(&other, "a\nb\nc\n").unwrap();
        let command = format!("e {}", other.display());
        host.execute_command(&mut session, &command, CommandOrigin::User);
        assert_eq!(current_text(&host, &session), vec!["a", "b", "c"]);
        assert_eq!(session.line_count(), 3);
    }

    #[test]
    fn test_write_disabled() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        session.options.write = false;
        host.execute_command(&mut session, "w /tmp/never", CommandOrigin::User);
        assert!(host.messages().last().unwrap().starts_with("E142"));
        assert!(session.exit.error_displayed);
    }

    #[test]
    fn test_not_modifiable() {
        let mut host = host();
        let mut session = session_with(&mut host, &["keep"]);
        session.options.modifiable = false;
        run_keys(&mut host, &mut session, "x");
        assert_eq!(current_text(&host, &session), vec!["keep"]);
        assert!(host.messages().last().unwrap().starts_with("E21"));
    }

    #[test]
    fn test_autocmd_fires_commands() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        host.execute_command(&mut session, "au VimEnter * echo entered", CommandOrigin::Script);
        assert!(host.has_hook(Hook::VimEnter));
        assert!(!host.has_hook(Hook::BufEnter));
        host.fire_hook(&mut session, Hook::VimEnter, None);
        assert_eq!(host.messages().last().unwrap(), "entered");

        host.execute_command(&mut session, "au Nope * echo x", CommandOrigin::Script);
        assert!(host.messages().last().unwrap().starts_with("E216"));
    }

    #[test]
    fn test_secure_mode_blocks_autocmd() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        session.options.secure = true;
        host.execute_command(&mut session, "au VimEnter * q", CommandOrigin::Script);
        assert!(!host.has_hook(Hook::VimEnter));
        assert!(host.messages().last().unwrap().starts_with("E523"));
    }

    #[test]
    fn test_error_context_for_scripts() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        host.execute_command(&mut session, "bogus", CommandOrigin::Environment("EXINIT"));
        let messages = host.messages();
        assert_eq!(messages[messages.len() - 2], "Error detected while processing EXINIT:");
        assert!(messages[messages.len() - 1].starts_with("E492"));
    }

    #[test]
    fn test_source_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("init.vim");
        fs::write(&script, "\" settings\nset noloadplugins\nset insertmode\n").unwrap();
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        host.source_script(&mut session, &script).unwrap();
        assert!(!session.options.loadplugins);
        assert!(session.options.insertmode);
        assert!(matches!(
            host.source_script(&mut session, &dir.path().join("missing.vim")),
            Err(HostError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_error_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.c");
        fs::write(&source, "int main() {\n  return 0\n}\n").unwrap();
        let errors = dir.path().join("errors.err");
        fs::write(&errors, format!("{}:2:11: expected ';'\n", source.display())).unwrap();

        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        host.load_error_file(&mut session, &errors).unwrap();
        host.jump_to_first_error(&mut session);
        assert_eq!(session.cursor(), Position::new(2, 10));
        assert_eq!(
            session.layout.current_buffer().unwrap().name.as_deref(),
            Some(source.as_path())
        );

        let empty = dir.path().join("empty.err");
        fs::write(&empty, "nothing useful\n").unwrap();
        assert!(matches!(
            host.load_error_file(&mut session, &empty),
            Err(HostError::Quickfix(_))
        ));
        assert!(matches!(
            host.load_error_file(&mut session, &dir.path().join("missing.err")),
            Err(HostError::Quickfix(_))
        ));
    }

    #[test]
    fn test_open_missing_file_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host();
        let mut session = Session::default();
        let buffer = session.layout.current_window().buffer;
        session.layout.buffer_mut(buffer).unwrap().name = Some(dir.path().join("new.txt"));
        assert_eq!(host.open_document(&mut session, buffer), OpenOutcome::Opened);
        assert!(session.layout.buffer(buffer).unwrap().loaded);
        assert!(host.messages().last().unwrap().ends_with("[New]"));
    }

    #[test]
    fn test_recover_from_swap_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            swap_dir: Some(dir.path().join("swap")),
            ..Config::default()
        };
        let file = dir.path().join("notes.txt");
        let swap = config.swap_file_for(&file).unwrap();
        fs::create_dir_all(swap.parent().unwrap()).unwrap();
        fs::write(&swap, "unsaved\nwork\n").unwrap();

        let mut host = BasicHost::new(true, config);
        let mut session = Session::default();
        session.layout.current_buffer_mut().unwrap().name = Some(file.clone());
        host.recover(&mut session).unwrap();
        assert_eq!(current_text(&host, &session), vec!["unsaved", "work"]);
        assert!(session.layout.current_buffer().unwrap().is_modified());

        session.layout.current_buffer_mut().unwrap().name = Some(dir.path().join("other"));
        assert!(matches!(host.recover(&mut session), Err(HostError::Recovery(_))));
    }

    #[test]
    fn test_tag_jump() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lib.rs");
        fs::write(&source, "use std::io;\n\nfn parse_line() {}\n").unwrap();
        let tags = dir.path().join("tags");
        let entry = format!("parse_line\t{}\t/^fn parse_line() {{}}$/;\"\tf\n", source.display());
        fs::write(&tags, entry).unwrap();

        let mut host = BasicHost::new(
            true,
            Config {
                tags,
                ..Config::default()
            },
        );
        let mut session = session_with(&mut host, &[""]);
        host.execute_command(&mut session, "ta parse_line", CommandOrigin::CommandLine);
        assert_eq!(session.cursor(), Position::new(3, 0));
        assert_eq!(
            session.layout.current_buffer().unwrap().name.as_deref(),
            Some(source.as_path())
        );

        host.execute_command(&mut session, "ta missing", CommandOrigin::CommandLine);
        assert!(host.messages().last().unwrap().starts_with("E426"));
    }

    #[test]
    fn test_missing_tags_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = BasicHost::new(
            true,
            Config {
                tags: dir.path().join("tags"),
                ..Config::default()
            },
        );
        let mut session = session_with(&mut host, &[""]);
        host.execute_command(&mut session, "ta anything", CommandOrigin::CommandLine);
        assert!(host.messages().last().unwrap().starts_with("E433"));
    }

    #[test]
    fn test_self_sourcing_script_stops_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("loop.vim");
        fs::write(&script, format!("set insertmode\nso {}\n", script.display())).unwrap();

        // Same stack as the binary's main thread
        std::thread::Builder::new()
            .stack_size(8 << 20)
            .spawn(move || {
                let mut host = host();
                let mut session = session_with(&mut host, &[""]);
                host.source_script(&mut session, &script).unwrap();

                assert!(session.options.insertmode);
                assert!(session.exit.error_displayed);
                let errors: Vec<&String> =
                    host.messages().iter().filter(|m| m.starts_with('E')).collect();
                assert_eq!(errors, vec!["E169: Command too recursive"]);
                assert_eq!(host.source_depth, 0);
            })
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn test_nested_sources_within_limit() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner.vim");
        let outer = dir.path().join("outer.vim");
        fs::write(&inner, "set noloadplugins\n").unwrap();
        fs::write(&outer, format!("so {}\nso {}\n", inner.display(), inner.display())).unwrap();

        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        host.source_script(&mut session, &outer).unwrap();
        assert!(!session.options.loadplugins);
        assert!(!session.exit.error_displayed);
    }

    #[test]
    fn test_source_missing_from_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        let command = format!("so {}", dir.path().join("absent.vim").display());
        host.execute_command(&mut session, &command, CommandOrigin::Script);
        assert!(host.messages().last().unwrap().starts_with("E484"));
    }

    #[test]
    fn test_message_history_is_capped() {
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        session.silent_mode = true;
        for i in 0..MAX_MESSAGES + 25 {
            host.execute_command(&mut session, &format!("echo line {i}"), CommandOrigin::Script);
        }
        let messages = host.messages();
        assert_eq!(messages.len(), MAX_MESSAGES);
        assert_eq!(messages[0], "line 25");
        assert_eq!(messages[MAX_MESSAGES - 1], format!("line {}", MAX_MESSAGES + 24));
    }

    #[test]
    fn test_changed_file_warns_once_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watched.txt");
        fs::write(&path, "one\ntwo\n").unwrap();
        let mut host = host();
        let mut session = Session::default();
        let buffer = session.layout.current_window().buffer;
        session.layout.buffer_mut(buffer).unwrap().name = Some(path.clone());
        assert_eq!(host.open_document(&mut session, buffer), OpenOutcome::Opened);

        run_keys(&mut host, &mut session, "j");
        assert!(session.flags.need_check_timestamps);
        let mut main = crate::dispatch::MainLoop::top_level();
        let _ = main.iterate(&mut session, &mut host);
        assert!(!host.messages().iter().any(|m| m.starts_with("W11")));

        let later = SystemTime::now() + std::time::Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        run_keys(&mut host, &mut session, "k");
        let _ = main.iterate(&mut session, &mut host);
        let warnings: Vec<&String> = host.messages().iter().filter(|m| m.starts_with("W11")).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("watched.txt"));

        // Reported once per change
        run_keys(&mut host, &mut session, "j");
        let _ = main.iterate(&mut session, &mut host);
        assert_eq!(host.messages().iter().filter(|m| m.starts_with("W11")).count(), 1);
    }

    #[test]
    fn test_own_write_is_not_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.txt");
        fs::write(&path, "one\n").unwrap();
        let old = SystemTime::now() - std::time::Duration::from_secs(3600);
        fs::File::options().write(true).open(&path).unwrap().set_modified(old).unwrap();

        let mut host = host();
        let mut session = Session::default();
        let buffer = session.layout.current_window().buffer;
        session.layout.buffer_mut(buffer).unwrap().name = Some(path.clone());
        host.open_document(&mut session, buffer);
        session.layout.current_buffer_mut().unwrap().touch();
        host.execute_command(&mut session, "w", CommandOrigin::User);

        session.flags.need_check_timestamps = true;
        let _ = crate::dispatch::MainLoop::top_level().iterate(&mut session, &mut host);
        assert!(!host.messages().iter().any(|m| m.starts_with("W11")));
    }

    #[test]
    fn test_search_wraps() {
        let mut host = host();
        let mut session = session_with(&mut host, &["alpha", "beta", "gamma"]);
        session.set_cursor(Position::new(3, 0));
        host.execute_command(&mut session, "/ph", CommandOrigin::User);
        assert_eq!(session.cursor(), Position::new(1, 2));
        assert_eq!(session.history.search_history, vec!["ph".to_string()]);
    }

    #[test]
    fn test_line_step_reads_until_end() {
        let mut host = host();
        let mut session = session_with(&mut host, &["one", "two"]);
        session.mode.ex_mode = Some(ExMode::Improved);
        session.silent_mode = true;
        host.stuff_input("2\n");
        assert_eq!(host.line_step(&mut session, true), StepOutcome::Continue);
        assert_eq!(session.cursor().line, 2);
        assert_eq!(host.line_step(&mut session, true), StepOutcome::Exit(0));
    }

    #[test]
    fn test_script_input_recorded_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("keys.in");
        let output = dir.path().join("keys.out");
        fs::write(&input, "ihi\x1b").unwrap();
        let mut host = host();
        let mut session = session_with(&mut host, &[""]);
        session.scripts.input = Some(crate::args::ScriptFile {
            path: input.clone(),
            file: fs::File::open(&input).unwrap(),
        });
        session.scripts.output = Some(crate::args::ScriptFile {
            path: output.clone(),
            file: fs::File::create(&output).unwrap(),
        });
        for _ in 0..4 {
            assert_eq!(host.modal_step(&mut session), StepOutcome::Continue);
        }
        assert_eq!(host.modal_step(&mut session), StepOutcome::Exit(1));
        assert!(session.scripts.input.is_none());
        session.scripts.output = None;

        assert_eq!(current_text(&host, &session), vec!["hi"]);
        assert_eq!(fs::read(&output).unwrap(), b"ihi\x1b");
    }

    #[test]
    fn test_fit_respects_wide_chars() {
        assert_eq!(fit("漢字abc", 5), "漢字a");
        assert_eq!(fit("a\tb", 2), "a ");
        assert_eq!(byte_index("héllo", 2), 3);
        assert_eq!(byte_index("ab", 9), 2);
    }
}
