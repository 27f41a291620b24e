//! Switch tables
//!
//! Every option the scanner understands is a row in one of two tables.
//! The scanner itself only knows how to walk argv and apply a
//! [`SwitchAction`]; adding an option means adding a row here.

use super::params::{ExMode, WindowLayout};
use super::InfoRequest;

/// A plain on/off switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flag {
    Arabic,
    Binary,
    Debug,
    Diff,
    Ex(ExMode),
    Farsi,
    Hebrew,
    Lisp,
    NoSwap,
    NoWrite,
    NotModifiable,
    Readonly,
    Recovery,
    Restricted,
    /// Accepted for compatibility, does nothing
    Ignored,
}

/// Where a value-taking option stores its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueTarget {
    Command,
    PreCommand,
    Session,
    Tag,
    Quickfix,
    Shada,
    TermName,
    Vimrc,
    /// `-U {gvimrc}`: consumed and ignored
    GuiRc,
    ScriptIn,
    ScriptOutAppend,
    ScriptOutWrite,
    StartupTime,
}

/// What happens when a value-taking option has no usable argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Missing {
    /// `Argument missing after`
    Error,
    /// Fall back to a default and leave the next argument alone
    Default,
}

/// What a single-letter switch does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwitchAction {
    Flag(Flag),
    /// `-o[N]`, `-O[N]`, `-p[N]`
    Layout(WindowLayout),
    /// Takes a value, from the rest of the token when `inline` allows it
    Value {
        target: ValueTarget,
        inline: bool,
        missing: Missing,
    },
    /// `-V[N][file]`
    Verbose,
    /// `-w{N}`, `-w {N}` or `-w {scriptout}`
    WindowOrScriptOut,
    /// Silent mode in Ex mode, script input otherwise
    SilentOrScriptIn,
    Info(InfoRequest),
    /// `-g`
    Gui,
}

/// One row of the single-letter switch table
#[derive(Debug, Clone, Copy)]
pub(crate) struct SwitchSpec {
    pub letter: char,
    pub action: SwitchAction,
}

const fn flag(letter: char, flag: Flag) -> SwitchSpec {
    SwitchSpec {
        letter,
        action: SwitchAction::Flag(flag),
    }
}

const fn value(letter: char, target: ValueTarget, inline: bool, missing: Missing) -> SwitchSpec {
    SwitchSpec {
        letter,
        action: SwitchAction::Value {
            target,
            inline,
            missing,
        },
    }
}

pub(crate) const SWITCHES: &[SwitchSpec] = &[
    flag('A', Flag::Arabic),
    flag('b', Flag::Binary),
    value('c', ValueTarget::Command, true, Missing::Error),
    flag('D', Flag::Debug),
    flag('d', Flag::Diff),
    flag('e', Flag::Ex(ExMode::Normal)),
    flag('E', Flag::Ex(ExMode::Improved)),
    flag('F', Flag::Farsi),
    flag('f', Flag::Ignored),
    SwitchSpec {
        letter: 'g',
        action: SwitchAction::Gui,
    },
    flag('H', Flag::Hebrew),
    SwitchSpec {
        letter: 'h',
        action: SwitchAction::Info(InfoRequest::Help),
    },
    SwitchSpec {
        letter: '?',
        action: SwitchAction::Info(InfoRequest::Help),
    },
    value('i', ValueTarget::Shada, false, Missing::Error),
    flag('L', Flag::Recovery),
    flag('l', Flag::Lisp),
    flag('M', Flag::NotModifiable),
    flag('m', Flag::NoWrite),
    flag('N', Flag::Ignored),
    flag('n', Flag::NoSwap),
    SwitchSpec {
        letter: 'o',
        action: SwitchAction::Layout(WindowLayout::Horizontal),
    },
    SwitchSpec {
        letter: 'O',
        action: SwitchAction::Layout(WindowLayout::Vertical),
    },
    SwitchSpec {
        letter: 'p',
        action: SwitchAction::Layout(WindowLayout::Tabs),
    },
    value('q', ValueTarget::Quickfix, true, Missing::Default),
    flag('R', Flag::Readonly),
    flag('r', Flag::Recovery),
    value('S', ValueTarget::Session, false, Missing::Default),
    SwitchSpec {
        letter: 's',
        action: SwitchAction::SilentOrScriptIn,
    },
    value('T', ValueTarget::TermName, false, Missing::Error),
    value('t', ValueTarget::Tag, true, Missing::Error),
    value('U', ValueTarget::GuiRc, false, Missing::Error),
    value('u', ValueTarget::Vimrc, false, Missing::Error),
    SwitchSpec {
        letter: 'V',
        action: SwitchAction::Verbose,
    },
    SwitchSpec {
        letter: 'v',
        action: SwitchAction::Info(InfoRequest::Version),
    },
    value('W', ValueTarget::ScriptOutWrite, false, Missing::Error),
    SwitchSpec {
        letter: 'w',
        action: SwitchAction::WindowOrScriptOut,
    },
    flag('X', Flag::Ignored),
    flag('Z', Flag::Restricted),
];

/// Find the action for a single-letter switch
pub(crate) fn lookup(letter: char) -> Option<SwitchAction> {
    SWITCHES
        .iter()
        .find(|spec| spec.letter == letter)
        .map(|spec| spec.action)
}

/// How a long option name is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LongMatch {
    /// The whole name, ignoring case
    Exact,
    /// The name as a prefix, ignoring case
    Prefix,
}

/// What a long option does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LongAction {
    Info(InfoRequest),
    Headless,
    Embed,
    Literal,
    NoPlugin,
    Ignored,
    /// Takes the next argument; text after the name is garbage
    Value(ValueTarget),
}

/// One row of the long option table
#[derive(Debug, Clone, Copy)]
pub(crate) struct LongSpec {
    pub name: &'static str,
    pub matching: LongMatch,
    pub action: LongAction,
}

pub(crate) const LONG_OPTIONS: &[LongSpec] = &[
    LongSpec {
        name: "help",
        matching: LongMatch::Exact,
        action: LongAction::Info(InfoRequest::Help),
    },
    LongSpec {
        name: "version",
        matching: LongMatch::Exact,
        action: LongAction::Info(InfoRequest::Version),
    },
    LongSpec {
        name: "api-info",
        matching: LongMatch::Exact,
        action: LongAction::Info(InfoRequest::ApiInfo),
    },
    LongSpec {
        name: "headless",
        matching: LongMatch::Exact,
        action: LongAction::Headless,
    },
    LongSpec {
        name: "embed",
        matching: LongMatch::Exact,
        action: LongAction::Embed,
    },
    LongSpec {
        name: "literal",
        matching: LongMatch::Prefix,
        action: LongAction::Literal,
    },
    LongSpec {
        name: "nofork",
        matching: LongMatch::Prefix,
        action: LongAction::Ignored,
    },
    LongSpec {
        name: "noplugin",
        matching: LongMatch::Prefix,
        action: LongAction::NoPlugin,
    },
    LongSpec {
        name: "cmd",
        matching: LongMatch::Prefix,
        action: LongAction::Value(ValueTarget::PreCommand),
    },
    LongSpec {
        name: "startuptime",
        matching: LongMatch::Prefix,
        action: LongAction::Value(ValueTarget::StartupTime),
    },
];

/// Find a long option. Returns the row and whatever follows the matched name.
pub(crate) fn lookup_long(name: &str) -> Option<(&'static LongSpec, &str)> {
    LONG_OPTIONS.iter().find_map(|spec| match spec.matching {
        LongMatch::Exact => name.eq_ignore_ascii_case(spec.name).then_some((spec, "")),
        LongMatch::Prefix => {
            let head = name.get(..spec.name.len())?;
            if head.eq_ignore_ascii_case(spec.name) {
                Some((spec, &name[spec.name.len()..]))
            } else {
                None
            }
        },
    })
}
