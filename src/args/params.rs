//! Startup parameters
//!
//! The value produced by the argument scanner. Everything the orchestrator
//! needs to know about the invocation lives here; nothing in it is touched
//! again once scanning finishes.

use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::ScanError;
use crate::terminal::TtyState;

/// Maximum number of commands from `+`, `-c`, `-S` or `--cmd` arguments
pub const MAX_ARG_CMDS: usize = 10;

/// Session file sourced by a bare `-S`
pub const SESSION_FILE: &str = "Session.vim";

/// What the first window should edit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditMode {
    /// No edit target given
    #[default]
    None,
    /// File name arguments, edited from the argument list
    FileList,
    /// `-`: read the document from stdin
    ReadStdin,
    /// `-t {tag}`: edit the file where the tag is defined
    JumpToTag(String),
    /// `-q [errorfile]`: start from the first quickfix entry
    QuickfixFile(Option<PathBuf>),
}

impl EditMode {
    pub fn is_none(&self) -> bool {
        matches!(self, EditMode::None)
    }
}

/// How multiple windows are arranged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowLayout {
    #[default]
    Unset,
    /// `-o`: horizontal splits
    Horizontal,
    /// `-O`: vertical splits
    Vertical,
    /// `-p`: one tab page per window
    Tabs,
}

/// Number of windows requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowCount {
    #[default]
    Unset,
    /// `-o` without a count: one window per file
    OnePerFile,
    /// `-o3`
    Exactly(usize),
}

impl WindowCount {
    /// Resolve against the number of file arguments
    pub fn resolve(self, files: usize) -> usize {
        match self {
            WindowCount::Unset => 1,
            WindowCount::OnePerFile => files,
            WindowCount::Exactly(n) => n,
        }
    }
}

/// Line-oriented interpreter flavour selected by `-e` / `-E`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExMode {
    Normal,
    Improved,
}

/// `-u` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RcOverride {
    /// Source only this file
    Path(PathBuf),
    /// `NONE`: no startup scripts and no plugins
    None,
    /// `NORC`: no startup scripts, plugins still load
    NoRc,
}

impl RcOverride {
    pub fn parse(value: &str) -> Self {
        match value {
            "NONE" => RcOverride::None,
            "NORC" => RcOverride::NoRc,
            path => RcOverride::Path(PathBuf::from(path)),
        }
    }
}

/// A command run during startup. Literal defaults are borrowed, everything
/// taken from argv or built by the scanner is owned.
pub type StartupCommand = Cow<'static, str>;

/// Ordered command list with a fixed capacity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandList {
    items: Vec<StartupCommand>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command, failing once the list is full
    pub fn push(&mut self, command: impl Into<StartupCommand>) -> Result<(), ScanError> {
        if self.items.len() >= MAX_ARG_CMDS {
            return Err(ScanError::TooManyCommands);
        }
        self.items.push(command.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.items.first().map(|c| c.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|c| c.as_ref())
    }
}

impl IntoIterator for CommandList {
    type Item = StartupCommand;
    type IntoIter = std::vec::IntoIter<StartupCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// `-V[N][file]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verbosity {
    pub level: u32,
    pub file: Option<PathBuf>,
}

/// Option settings requested by single-letter switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOverrides {
    pub ex_mode: Option<ExMode>,
    /// `-s` in Ex mode, or `-` in Ex mode
    pub silent: bool,
    /// `-r` / `-L`
    pub recovery: bool,
    pub readonly: bool,
    /// `-m`
    pub no_write: bool,
    /// `-M`
    pub not_modifiable: bool,
    pub binary: bool,
    pub lisp: bool,
    pub restricted: bool,
    pub arabic: bool,
    pub farsi: bool,
    pub hebrew: bool,
    pub verbose: Option<Verbosity>,
    /// `-w{N}`
    pub window_height: Option<u32>,
    /// `-i {file}`
    pub shada_file: Option<PathBuf>,
    pub load_plugins: bool,
    pub startuptime: Option<PathBuf>,
    pub literal: bool,
}

impl Default for OptionOverrides {
    fn default() -> Self {
        Self {
            ex_mode: None,
            silent: false,
            recovery: false,
            readonly: false,
            no_write: false,
            not_modifiable: false,
            binary: false,
            lisp: false,
            restricted: false,
            arabic: false,
            farsi: false,
            hebrew: false,
            verbose: None,
            window_height: None,
            shada_file: None,
            load_plugins: true,
            startuptime: None,
            literal: false,
        }
    }
}

/// An open script file and the name it was opened with
#[derive(Debug)]
pub struct ScriptFile {
    pub path: PathBuf,
    pub file: File,
}

/// Script-input (`-s`) and script-output (`-w` / `-W`) files.
///
/// Both are acquired while scanning so a bad path fails before anything
/// else happens. They close when dropped.
#[derive(Debug, Default)]
pub struct ScriptFiles {
    pub input: Option<ScriptFile>,
    pub output: Option<ScriptFile>,
}

impl ScriptFiles {
    pub(crate) fn open_input(&mut self, option: &str, path: &str) -> Result<(), ScanError> {
        if self.input.is_some() {
            return Err(ScanError::ScriptAlreadyOpen {
                option: option.to_string(),
                path: path.to_string(),
            });
        }
        let file = File::open(path).map_err(|source| ScanError::ScriptOpen {
            action: "Cannot open for reading",
            path: path.to_string(),
            source,
        })?;
        self.input = Some(ScriptFile {
            path: PathBuf::from(path),
            file,
        });
        Ok(())
    }

    pub(crate) fn open_output(
        &mut self,
        option: &str,
        path: &str,
        append: bool,
    ) -> Result<(), ScanError> {
        if self.output.is_some() {
            return Err(ScanError::ScriptAlreadyOpen {
                option: option.to_string(),
                path: path.to_string(),
            });
        }
        let mut open = File::options();
        open.create(true);
        if append {
            open.append(true);
        } else {
            open.write(true).truncate(true);
        }
        let file = open.open(path).map_err(|source| ScanError::ScriptOpen {
            action: "Cannot open for script output",
            path: path.to_string(),
            source,
        })?;
        self.output = Some(ScriptFile {
            path: PathBuf::from(path),
            file,
        });
        Ok(())
    }
}

/// Everything the command line asked for
#[derive(Debug)]
pub struct StartupParameters {
    pub edit_mode: EditMode,
    /// `+`, `-c` and `-S`, run after the first file loads
    pub pending_commands: CommandList,
    /// `--cmd`, run before any startup script
    pub pre_commands: CommandList,
    pub window_layout: WindowLayout,
    pub window_count: WindowCount,
    pub headless: bool,
    pub embedded: bool,
    pub diff_mode: bool,
    pub no_swap_file: bool,
    pub use_vimrc: Option<RcOverride>,
    pub tag_name: Option<String>,
    pub errorfile_override: Option<PathBuf>,
    pub terminal_name: Option<String>,
    pub debug_break_level: Option<i32>,
    pub tty: TtyState,
    pub want_full_screen: bool,
    /// File arguments in editing order
    pub files: Vec<PathBuf>,
    /// `":{first command}\r"`, shown by swap-file recovery messages
    pub swap_command: Option<String>,
    pub overrides: OptionOverrides,
    pub scripts: ScriptFiles,
}

impl Default for StartupParameters {
    fn default() -> Self {
        Self {
            edit_mode: EditMode::None,
            pending_commands: CommandList::new(),
            pre_commands: CommandList::new(),
            window_layout: WindowLayout::Unset,
            window_count: WindowCount::Unset,
            headless: false,
            embedded: false,
            diff_mode: false,
            no_swap_file: false,
            use_vimrc: None,
            tag_name: None,
            errorfile_override: None,
            terminal_name: None,
            debug_break_level: None,
            tty: TtyState::default(),
            want_full_screen: true,
            files: Vec::new(),
            swap_command: None,
            overrides: OptionOverrides::default(),
            scripts: ScriptFiles::default(),
        }
    }
}

impl StartupParameters {
    /// Attach the result of the terminal probe
    pub fn with_tty(mut self, tty: TtyState) -> Self {
        self.tty = tty;
        self
    }

    pub fn first_file(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }
}
