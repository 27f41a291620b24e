//! Editor options
//!
//! Defaults are derived from the terminal geometry and the locale, then
//! adjusted by command-line overrides and finally by whatever the startup
//! scripts `:set`.

use std::path::PathBuf;

use crate::args::{OptionOverrides, WindowLayout};

/// Default value of `updatecount`
pub const DEFAULT_UPDATECOUNT: u32 = 200;

/// Default value of `tabpagemax`
pub const DEFAULT_TABPAGEMAX: usize = 50;

/// Below this many columns per file, diff mode splits horizontally
pub const DIFF_MIN_COLUMNS: u16 = 80;

/// Language and encoding taken from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub lang: String,
    pub encoding: String,
}

impl Locale {
    /// Resolve from `LC_ALL`, `LC_CTYPE` and `LANG`, first non-empty wins
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .filter_map(|key| lookup(*key))
            .find(|v| !v.is_empty());

        let Some(value) = value else {
            return Self::default();
        };
        let (lang, encoding) = match value.split_once('.') {
            Some((lang, rest)) => {
                // Drop a "@modifier" suffix
                let encoding = rest.split('@').next().unwrap_or(rest);
                (lang.to_string(), normalize_encoding(encoding))
            },
            None => (value.clone(), "utf-8".to_string()),
        };
        let lang = if lang == "POSIX" { "C".to_string() } else { lang };
        Self { lang, encoding }
    }

    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            lang: "C".to_string(),
            encoding: "utf-8".to_string(),
        }
    }
}

fn normalize_encoding(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "utf8" | "utf-8" => "utf-8".to_string(),
        _ => lower,
    }
}

/// Option values for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub lines: u16,
    pub columns: u16,
    /// Lines scrolled by CTRL-F
    pub window: u16,
    /// Lines scrolled by CTRL-D
    pub scroll: u16,
    pub cmdheight: u16,
    pub lang: String,
    pub encoding: String,
    pub verbose: u32,
    pub verbosefile: Option<PathBuf>,
    pub updatecount: u32,
    pub write: bool,
    pub modifiable: bool,
    pub readonly: bool,
    pub binary: bool,
    pub lisp: bool,
    pub restricted: bool,
    pub rightleft: bool,
    pub arabic: bool,
    pub hkmap: bool,
    pub fkmap: bool,
    pub altkeymap: bool,
    pub loadplugins: bool,
    pub exrc: bool,
    /// Commands from a local rc that we don't own run restricted
    pub secure: bool,
    pub insertmode: bool,
    pub diff: bool,
    /// `diffopt` contains `horizontal`
    pub diffopt_horizontal: bool,
    pub errorfile: PathBuf,
    /// Persisted-state file, `None` when disabled
    pub shada: Option<PathBuf>,
    pub tabpagemax: usize,
    pub term: Option<String>,
    pub debug_break_level: Option<i32>,
}

impl Options {
    /// Derive defaults from the screen size (columns, rows) and locale
    pub fn derive(columns: u16, lines: u16, locale: &Locale) -> Self {
        let lines = lines.max(2);
        let columns = columns.max(12);
        let cmdheight = 1;
        let window = lines - cmdheight;
        Self {
            lines,
            columns,
            window,
            scroll: window / 2,
            cmdheight,
            lang: locale.lang.clone(),
            encoding: locale.encoding.clone(),
            verbose: 0,
            verbosefile: None,
            updatecount: DEFAULT_UPDATECOUNT,
            write: true,
            modifiable: true,
            readonly: false,
            binary: false,
            lisp: false,
            restricted: false,
            rightleft: false,
            arabic: false,
            hkmap: false,
            fkmap: false,
            altkeymap: false,
            loadplugins: true,
            exrc: false,
            secure: false,
            insertmode: false,
            diff: false,
            diffopt_horizontal: false,
            errorfile: PathBuf::from("errors.err"),
            shada: None,
            tabpagemax: DEFAULT_TABPAGEMAX,
            term: None,
            debug_break_level: None,
        }
    }

    /// Apply the overrides collected from the command line
    pub fn apply_overrides(&mut self, overrides: &OptionOverrides) {
        if overrides.readonly {
            self.readonly = true;
        }
        if overrides.no_write {
            self.write = false;
        }
        if overrides.not_modifiable {
            self.modifiable = false;
        }
        if overrides.binary {
            self.binary = true;
        }
        if overrides.lisp {
            self.lisp = true;
        }
        if overrides.restricted {
            self.restricted = true;
        }
        if overrides.arabic {
            self.arabic = true;
            self.rightleft = true;
        }
        if overrides.farsi {
            self.fkmap = true;
            self.altkeymap = true;
            self.rightleft = true;
        }
        if overrides.hebrew {
            self.hkmap = true;
            self.rightleft = true;
        }
        if let Some(verbose) = &overrides.verbose {
            self.verbose = verbose.level;
            self.verbosefile = verbose.file.clone();
        }
        if let Some(height) = overrides.window_height {
            let height = u16::try_from(height).unwrap_or(u16::MAX);
            self.window = height.clamp(1, self.lines - self.cmdheight);
        }
        if !overrides.load_plugins {
            self.loadplugins = false;
        }
    }

    /// Only one right-to-left keymap can be active. Farsi wins when both
    /// `rightleft` and `altkeymap` are on.
    pub fn reconcile_keymaps(&mut self) {
        if self.rightleft && self.altkeymap {
            self.hkmap = false;
            self.arabic = false;
            self.fkmap = true;
        }
    }

    /// Pick a split direction for diff mode
    pub fn diff_layout(&self, files: usize) -> WindowLayout {
        let per_file = self.columns / u16::try_from(files.max(1)).unwrap_or(u16::MAX);
        if self.diffopt_horizontal || per_file < DIFF_MIN_COLUMNS {
            WindowLayout::Horizontal
        } else {
            WindowLayout::Vertical
        }
    }

    /// Set a boolean option by name, as `:set name` / `:set noname` does
    pub fn set_flag(&mut self, name: &str) -> Result<(), String> {
        let (name, value) = match name.strip_prefix("no") {
            Some(rest) if self.flag_mut(rest).is_some() => (rest, false),
            _ => (name, true),
        };
        match self.flag_mut(name) {
            Some(flag) => {
                *flag = value;
                Ok(())
            },
            None => Err(format!("E518: Unknown option: {name}")),
        }
    }

    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        let flag = match name {
            "write" => &mut self.write,
            "modifiable" | "ma" => &mut self.modifiable,
            "readonly" | "ro" => &mut self.readonly,
            "binary" | "bin" => &mut self.binary,
            "lisp" => &mut self.lisp,
            "rightleft" | "rl" => &mut self.rightleft,
            "loadplugins" | "lpl" => &mut self.loadplugins,
            "exrc" | "ex" => &mut self.exrc,
            "insertmode" | "im" => &mut self.insertmode,
            "diff" => &mut self.diff,
            _ => return None,
        };
        Some(flag)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::derive(80, 24, &Locale::default())
    }
}
