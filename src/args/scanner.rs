//! Argument scanner
//!
//! Walks argv with an explicit cursor of (argument index, byte offset).
//! Short options may be bundled, so after each switch the offset either
//! moves to the next letter in the same token or, once a value has been
//! taken, the scanner skips to the next argument.

use std::borrow::Cow;
use std::path::PathBuf;

use super::params::{RcOverride, StartupParameters, Verbosity, WindowCount, SESSION_FILE};
use super::switches::{self, Flag, LongAction, Missing, SwitchAction, ValueTarget};
use super::{EditMode, InfoRequest, ScanError, ScanOutcome};

/// Verbose level used by a bare `-V`
const DEFAULT_VERBOSE: u32 = 10;

/// Window height used by `-w` when the number can't be read
const DEFAULT_WINDOW_HEIGHT: u32 = 10;

/// Scan an argument vector, program name excluded.
///
/// Returns the parameters to start with, or an [`InfoRequest`] when the
/// caller should print help, version or api-info and exit.
pub fn scan<I, S>(args: I) -> Result<ScanOutcome, ScanError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let argv: Vec<String> = args.into_iter().map(Into::into).collect();
    Scanner::new(&argv).run()
}

struct Scanner<'a> {
    argv: &'a [String],
    /// Current argument
    arg: usize,
    /// Byte offset of the next option letter in `argv[arg]`, `None` once
    /// the rest of the argument has been consumed
    offset: Option<usize>,
    /// A bare `--` was seen
    had_minmin: bool,
    params: StartupParameters,
}

impl<'a> Scanner<'a> {
    fn new(argv: &'a [String]) -> Self {
        Self {
            argv,
            arg: 0,
            offset: Some(1),
            had_minmin: false,
            params: StartupParameters::default(),
        }
    }

    fn run(mut self) -> Result<ScanOutcome, ScanError> {
        let argv = self.argv;
        while self.arg < argv.len() {
            let token = argv[self.arg].as_str();
            if token.starts_with('+') && !self.had_minmin {
                let command = if token.len() == 1 {
                    Cow::Borrowed("$")
                } else {
                    Cow::Owned(token[1..].to_string())
                };
                self.params.pending_commands.push(command)?;
                self.offset = None;
            } else if token.starts_with('-') && !self.had_minmin {
                if let Some(request) = self.option(token)? {
                    return Ok(ScanOutcome::Info(request));
                }
            } else {
                self.file_argument(token)?;
                self.offset = None;
            }
            self.advance();
        }

        let mut params = self.params;
        params.swap_command = params.pending_commands.first().map(|c| format!(":{c}\r"));
        tracing::debug!(
            files = params.files.len(),
            commands = params.pending_commands.len(),
            "arguments scanned"
        );
        Ok(ScanOutcome::Start(params))
    }

    /// Move to the next option letter, or the next argument
    fn advance(&mut self) {
        match self.offset {
            Some(offset) if offset < self.argv[self.arg].len() => {},
            _ => {
                self.arg += 1;
                self.offset = Some(1);
            },
        }
    }

    /// Text after the current offset
    fn rest(&self, token: &'a str) -> &'a str {
        match self.offset {
            Some(offset) => token.get(offset..).unwrap_or(""),
            None => "",
        }
    }

    fn option(&mut self, token: &'a str) -> Result<Option<InfoRequest>, ScanError> {
        let rest = self.rest(token);
        let Some(letter) = rest.chars().next() else {
            // "-" on its own
            if self.params.overrides.ex_mode.is_some() {
                self.params.overrides.silent = true;
            } else {
                self.select_edit_mode(EditMode::ReadStdin, token)?;
            }
            self.offset = None;
            return Ok(None);
        };

        if letter == '-' {
            return self.long_option(token, &rest[1..]);
        }

        self.offset = self.offset.map(|offset| offset + letter.len_utf8());
        let action =
            switches::lookup(letter).ok_or_else(|| ScanError::UnknownOption(token.to_string()))?;

        match action {
            SwitchAction::Flag(flag) => self.set_flag(flag),
            SwitchAction::Layout(layout) => {
                let count = self.number().unwrap_or(0);
                self.params.window_layout = layout;
                self.params.window_count = if count == 0 {
                    WindowCount::OnePerFile
                } else {
                    WindowCount::Exactly(count)
                };
            },
            SwitchAction::Value {
                target,
                inline,
                missing,
            } => self.value_option(token, target, inline, missing)?,
            SwitchAction::Verbose => {
                let level = self
                    .number()
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(DEFAULT_VERBOSE);
                let file = self.rest(token);
                let file = if file.is_empty() {
                    None
                } else {
                    self.offset = None;
                    Some(PathBuf::from(file))
                };
                self.params.overrides.verbose = Some(Verbosity { level, file });
            },
            SwitchAction::WindowOrScriptOut => {
                if self.rest(token).starts_with(|c: char| c.is_ascii_digit()) {
                    let height = self.number().and_then(|n| u32::try_from(n).ok());
                    self.params.overrides.window_height =
                        Some(height.unwrap_or(DEFAULT_WINDOW_HEIGHT));
                } else {
                    self.value_option(token, ValueTarget::ScriptOutAppend, false, Missing::Error)?;
                }
            },
            SwitchAction::SilentOrScriptIn => {
                if self.params.overrides.ex_mode.is_some() {
                    self.params.overrides.silent = true;
                } else {
                    self.value_option(token, ValueTarget::ScriptIn, false, Missing::Error)?;
                }
            },
            SwitchAction::Info(request) => return Ok(Some(request)),
            SwitchAction::Gui => return Err(ScanError::NoGui),
        }
        Ok(None)
    }

    fn long_option(
        &mut self,
        token: &'a str,
        name: &'a str,
    ) -> Result<Option<InfoRequest>, ScanError> {
        self.offset = None;
        if name.is_empty() {
            self.had_minmin = true;
            return Ok(None);
        }

        let (spec, remainder) = switches::lookup_long(name)
            .ok_or_else(|| ScanError::UnknownOption(token.to_string()))?;
        match spec.action {
            LongAction::Info(request) => return Ok(Some(request)),
            LongAction::Headless => self.params.headless = true,
            LongAction::Embed => {
                self.params.embedded = true;
                self.params.headless = true;
            },
            LongAction::Literal => self.params.overrides.literal = true,
            LongAction::NoPlugin => self.params.overrides.load_plugins = false,
            LongAction::Ignored => {},
            LongAction::Value(target) => {
                if !remainder.is_empty() {
                    return Err(ScanError::TrailingGarbageAfterOption(token.to_string()));
                }
                let value = self.next_argument(token, Missing::Error)?;
                self.assign(target, token, value)?;
            },
        }
        Ok(None)
    }

    fn value_option(
        &mut self,
        token: &'a str,
        target: ValueTarget,
        inline: bool,
        missing: Missing,
    ) -> Result<(), ScanError> {
        if matches!(target, ValueTarget::Tag | ValueTarget::Quickfix)
            && !self.params.edit_mode.is_none()
        {
            return Err(ScanError::TooManyEditTargets(token.to_string()));
        }

        let rest = self.rest(token);
        let value = if !rest.is_empty() {
            if !inline {
                return Err(ScanError::TrailingGarbageAfterOption(token.to_string()));
            }
            self.offset = None;
            Some(rest)
        } else {
            self.next_argument(token, missing)?
        };
        self.assign(target, token, value)
    }

    /// Take the whole next argument as a value.
    ///
    /// An argument that looks like an option does not count. Options whose
    /// value is optional get `None` and leave it for the next round.
    fn next_argument(
        &mut self,
        token: &'a str,
        missing: Missing,
    ) -> Result<Option<&'a str>, ScanError> {
        let argv = self.argv;
        self.offset = None;
        match argv.get(self.arg + 1) {
            Some(next) if !next.starts_with('-') => {
                self.arg += 1;
                Ok(Some(next.as_str()))
            },
            _ => match missing {
                Missing::Error => Err(ScanError::MissingOptionArgument(token.to_string())),
                Missing::Default => Ok(None),
            },
        }
    }

    fn assign(
        &mut self,
        target: ValueTarget,
        token: &'a str,
        value: Option<&'a str>,
    ) -> Result<(), ScanError> {
        let params = &mut self.params;
        match (target, value) {
            (ValueTarget::Session, value) => {
                let file = value.unwrap_or(SESSION_FILE);
                params.pending_commands.push(format!("so {file}"))?;
            },
            (ValueTarget::Quickfix, value) => {
                let path = value.map(PathBuf::from);
                params.errorfile_override = path.clone();
                params.edit_mode = EditMode::QuickfixFile(path);
            },
            (_, None) => return Err(ScanError::MissingOptionArgument(token.to_string())),
            (ValueTarget::Command, Some(value)) => {
                params.pending_commands.push(value.to_string())?;
            },
            (ValueTarget::PreCommand, Some(value)) => {
                params.pre_commands.push(value.to_string())?;
            },
            (ValueTarget::Tag, Some(value)) => {
                params.tag_name = Some(value.to_string());
                params.edit_mode = EditMode::JumpToTag(value.to_string());
            },
            (ValueTarget::Shada, Some(value)) => {
                params.overrides.shada_file = Some(PathBuf::from(value));
            },
            (ValueTarget::TermName, Some(value)) => {
                params.terminal_name = Some(value.to_string());
            },
            (ValueTarget::Vimrc, Some(value)) => {
                params.use_vimrc = Some(RcOverride::parse(value));
            },
            (ValueTarget::GuiRc, Some(_)) => {},
            (ValueTarget::ScriptIn, Some(value)) => {
                params.scripts.open_input(token, value)?;
            },
            (ValueTarget::ScriptOutAppend, Some(value)) => {
                // `-w 30` gives the window height, anything else is a file
                if value.starts_with(|c: char| c.is_ascii_digit()) {
                    let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
                    params.overrides.window_height =
                        Some(digits.parse().unwrap_or(DEFAULT_WINDOW_HEIGHT));
                } else {
                    params.scripts.open_output(token, value, true)?;
                }
            },
            (ValueTarget::ScriptOutWrite, Some(value)) => {
                params.scripts.open_output(token, value, false)?;
            },
            (ValueTarget::StartupTime, Some(value)) => {
                params.overrides.startuptime = Some(PathBuf::from(value));
            },
        }
        Ok(())
    }

    fn set_flag(&mut self, flag: Flag) {
        let params = &mut self.params;
        match flag {
            Flag::Arabic => params.overrides.arabic = true,
            Flag::Binary => params.overrides.binary = true,
            Flag::Debug => params.debug_break_level = Some(9999),
            Flag::Diff => params.diff_mode = true,
            Flag::Ex(mode) => params.overrides.ex_mode = Some(mode),
            Flag::Farsi => params.overrides.farsi = true,
            Flag::Hebrew => params.overrides.hebrew = true,
            Flag::Lisp => params.overrides.lisp = true,
            Flag::NoSwap => params.no_swap_file = true,
            Flag::NoWrite => params.overrides.no_write = true,
            Flag::NotModifiable => {
                params.overrides.not_modifiable = true;
                params.overrides.no_write = true;
            },
            Flag::Readonly => params.overrides.readonly = true,
            Flag::Recovery => params.overrides.recovery = true,
            Flag::Restricted => params.overrides.restricted = true,
            Flag::Ignored => {},
        }
    }

    /// Read a decimal number at the cursor, if there is one
    fn number(&mut self) -> Option<usize> {
        let offset = self.offset?;
        let token = self.argv[self.arg].as_str();
        let digits = token[offset..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count();
        if digits == 0 {
            return None;
        }
        self.offset = Some(offset + digits);
        Some(token[offset..offset + digits].parse().unwrap_or(usize::MAX))
    }

    fn select_edit_mode(&mut self, mode: EditMode, token: &str) -> Result<(), ScanError> {
        if !self.params.edit_mode.is_none() {
            return Err(ScanError::TooManyEditTargets(token.to_string()));
        }
        self.params.edit_mode = mode;
        Ok(())
    }

    fn file_argument(&mut self, token: &str) -> Result<(), ScanError> {
        match self.params.edit_mode {
            EditMode::None | EditMode::FileList => {},
            _ => return Err(ScanError::TooManyEditTargets(token.to_string())),
        }
        self.params.edit_mode = EditMode::FileList;
        self.params.files.push(PathBuf::from(token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ExMode, WindowLayout, MAX_ARG_CMDS};

    fn start(args: &[&str]) -> StartupParameters {
        match scan(args.iter().copied()) {
            Ok(ScanOutcome::Start(params)) => params,
            other => panic!("expected start parameters, got {other:?}"),
        }
    }

    fn error(args: &[&str]) -> ScanError {
        match scan(args.iter().copied()) {
            Err(e) => e,
            Ok(outcome) => panic!("expected an error, got {outcome:?}"),
        }
    }

    #[test]
    fn test_empty_argv() {
        let params = start(&[]);
        assert_eq!(params.edit_mode, EditMode::None);
        assert!(params.files.is_empty());
        assert!(params.swap_command.is_none());
    }

    #[test]
    fn test_files_in_order() {
        let params = start(&["a.txt", "b.txt", "c.txt"]);
        assert_eq!(params.edit_mode, EditMode::FileList);
        assert_eq!(
            params.files,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("c.txt")
            ]
        );
    }

    #[test]
    fn test_tabs_with_count() {
        let params = start(&["-p3", "file1", "file2", "file3"]);
        assert_eq!(params.window_layout, WindowLayout::Tabs);
        assert_eq!(params.window_count, WindowCount::Exactly(3));
        assert_eq!(params.files.len(), 3);
    }

    #[test]
    fn test_split_without_count_is_one_per_file() {
        let params = start(&["-O", "a", "b"]);
        assert_eq!(params.window_layout, WindowLayout::Vertical);
        assert_eq!(params.window_count, WindowCount::OnePerFile);
    }

    #[test]
    fn test_minmin_stops_options() {
        let params = start(&["--", "-notreallyanoption"]);
        assert_eq!(params.files, vec![PathBuf::from("-notreallyanoption")]);
    }

    #[test]
    fn test_minmin_makes_plus_a_file() {
        let params = start(&["--", "+10", "--x"]);
        assert_eq!(params.files, vec![PathBuf::from("+10"), PathBuf::from("--x")]);
        assert!(params.pending_commands.is_empty());
    }

    #[test]
    fn test_plus_commands() {
        let params = start(&["+", "+42", "+/needle", "file"]);
        let commands: Vec<&str> = params.pending_commands.iter().collect();
        assert_eq!(commands, vec!["$", "42", "/needle"]);
        assert_eq!(params.swap_command.as_deref(), Some(":$\r"));
    }

    #[test]
    fn test_bundled_flags() {
        let params = start(&["-nR", "file"]);
        assert!(params.no_swap_file);
        assert!(params.overrides.readonly);
    }

    #[test]
    fn test_command_inline_and_separate() {
        let params = start(&["-cset nu", "-c", "echo 1"]);
        let commands: Vec<&str> = params.pending_commands.iter().collect();
        assert_eq!(commands, vec!["set nu", "echo 1"]);
    }

    #[test]
    fn test_command_missing_argument() {
        assert!(matches!(
            error(&["-c"]),
            ScanError::MissingOptionArgument(t) if t == "-c"
        ));
        assert!(matches!(
            error(&["-c", "-n"]),
            ScanError::MissingOptionArgument(_)
        ));
    }

    #[test]
    fn test_too_many_commands() {
        let mut args = Vec::new();
        for _ in 0..=MAX_ARG_CMDS {
            args.push("-c");
            args.push("echo");
        }
        assert!(matches!(error(&args), ScanError::TooManyCommands));
    }

    #[test]
    fn test_pre_commands_have_own_capacity() {
        let mut args = Vec::new();
        for _ in 0..MAX_ARG_CMDS {
            args.extend(["--cmd", "a", "-c", "b"]);
        }
        let params = start(&args);
        assert_eq!(params.pre_commands.len(), MAX_ARG_CMDS);
        assert_eq!(params.pending_commands.len(), MAX_ARG_CMDS);
    }

    #[test]
    fn test_two_edit_modes() {
        assert!(matches!(
            error(&["-t", "main", "-q", "errors"]),
            ScanError::TooManyEditTargets(t) if t == "-q"
        ));
        assert!(matches!(
            error(&["-t", "main", "file"]),
            ScanError::TooManyEditTargets(t) if t == "file"
        ));
        assert!(matches!(
            error(&["file", "-"]),
            ScanError::TooManyEditTargets(_)
        ));
    }

    #[test]
    fn test_tag_inline() {
        let params = start(&["-tmain"]);
        assert_eq!(params.edit_mode, EditMode::JumpToTag("main".into()));
        assert_eq!(params.tag_name.as_deref(), Some("main"));
    }

    #[test]
    fn test_quickfix_default_file() {
        let params = start(&["-q"]);
        assert_eq!(params.edit_mode, EditMode::QuickfixFile(None));

        let params = start(&["-q", "-n"]);
        assert_eq!(params.edit_mode, EditMode::QuickfixFile(None));
        assert!(params.no_swap_file);

        let params = start(&["-q", "build.log"]);
        assert_eq!(
            params.errorfile_override,
            Some(PathBuf::from("build.log"))
        );
    }

    #[test]
    fn test_session_default() {
        let params = start(&["-S"]);
        assert_eq!(params.pending_commands.first(), Some("so Session.vim"));

        let params = start(&["-S", "-n"]);
        assert_eq!(params.pending_commands.first(), Some("so Session.vim"));
        assert!(params.no_swap_file);

        let params = start(&["-S", "work.vim"]);
        assert_eq!(params.pending_commands.first(), Some("so work.vim"));
    }

    #[test]
    fn test_garbage_after_option() {
        assert!(matches!(
            error(&["-ufoo"]),
            ScanError::TrailingGarbageAfterOption(t) if t == "-ufoo"
        ));
        assert!(matches!(
            error(&["--cmdx", "echo"]),
            ScanError::TrailingGarbageAfterOption(_)
        ));
    }

    #[test]
    fn test_unknown_options() {
        assert!(matches!(error(&["-y"]), ScanError::UnknownOption(t) if t == "-y"));
        assert!(matches!(
            error(&["--frobnicate"]),
            ScanError::UnknownOption(t) if t == "--frobnicate"
        ));
    }

    #[test]
    fn test_long_options() {
        let params = start(&["--HEADLESS", "--noplugins", "--literal"]);
        assert!(params.headless);
        assert!(!params.overrides.load_plugins);
        assert!(params.overrides.literal);

        let params = start(&["--embed"]);
        assert!(params.embedded);
        assert!(params.headless);
    }

    #[test]
    fn test_info_requests() {
        assert!(matches!(
            scan(["--version", "-y"]),
            Ok(ScanOutcome::Info(InfoRequest::Version))
        ));
        assert!(matches!(
            scan(["-h"]),
            Ok(ScanOutcome::Info(InfoRequest::Help))
        ));
        assert!(matches!(
            scan(["--api-info"]),
            Ok(ScanOutcome::Info(InfoRequest::ApiInfo))
        ));
    }

    #[test]
    fn test_verbose() {
        let params = start(&["-V12log.txt"]);
        assert_eq!(
            params.overrides.verbose,
            Some(Verbosity {
                level: 12,
                file: Some(PathBuf::from("log.txt"))
            })
        );

        let params = start(&["-V"]);
        assert_eq!(params.overrides.verbose.map(|v| v.level), Some(10));
    }

    #[test]
    fn test_window_height() {
        let params = start(&["-w40"]);
        assert_eq!(params.overrides.window_height, Some(40));

        let params = start(&["-w", "12"]);
        assert_eq!(params.overrides.window_height, Some(12));
    }

    #[test]
    fn test_stdin_or_silent() {
        let params = start(&["-"]);
        assert_eq!(params.edit_mode, EditMode::ReadStdin);

        let params = start(&["-e", "-"]);
        assert_eq!(params.edit_mode, EditMode::None);
        assert!(params.overrides.silent);

        let params = start(&["-es"]);
        assert_eq!(params.overrides.ex_mode, Some(ExMode::Normal));
        assert!(params.overrides.silent);
    }

    #[test]
    fn test_not_modifiable_implies_no_write() {
        let params = start(&["-M"]);
        assert!(params.overrides.not_modifiable);
        assert!(params.overrides.no_write);
    }

    #[test]
    fn test_rc_override() {
        assert_eq!(start(&["-u", "NONE"]).use_vimrc, Some(RcOverride::None));
        assert_eq!(start(&["-u", "NORC"]).use_vimrc, Some(RcOverride::NoRc));
        assert_eq!(
            start(&["-u", "my.vim"]).use_vimrc,
            Some(RcOverride::Path(PathBuf::from("my.vim")))
        );
    }

    #[test]
    fn test_gui_unavailable() {
        assert!(matches!(error(&["-g"]), ScanError::NoGui));
    }

    #[test]
    fn test_debug_and_diff() {
        let params = start(&["-dD", "a", "b"]);
        assert!(params.diff_mode);
        assert_eq!(params.debug_break_level, Some(9999));
    }

    #[test]
    fn test_script_output_twice() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("one.out");
        let second = dir.path().join("two.out");
        let err = error(&[
            "-w",
            first.to_str().unwrap(),
            "-W",
            second.to_str().unwrap(),
        ]);
        assert!(matches!(err, ScanError::ScriptAlreadyOpen { .. }));
    }

    #[test]
    fn test_script_input_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.keys");
        let err = error(&["-s", missing.to_str().unwrap()]);
        assert!(matches!(err, ScanError::ScriptOpen { .. }));
    }

    #[test]
    fn test_script_input_opened() {
        let dir = tempfile::tempdir().unwrap();
        let keys = dir.path().join("in.keys");
        std::fs::write(&keys, b":q\n").unwrap();
        let params = start(&["-s", keys.to_str().unwrap()]);
        let input = params.scripts.input.expect("script input");
        assert_eq!(input.path, keys);
    }
}
