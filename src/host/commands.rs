//! Ex command line parser
//!
//! Only the commands [`super::BasicHost`] understands. Names may be
//! abbreviated down to a minimum length, as in `:q` or `:so`.

/// A line number argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSpec {
    Number(usize),
    Last,
}

/// A parsed Ex command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExCommand<'a> {
    /// Empty line or comment
    Nop,
    Goto(LineSpec),
    Quit { all: bool, force: bool },
    /// `:cquit`
    QuitWithError,
    Write {
        path: Option<&'a str>,
        force: bool,
        quit: bool,
    },
    Edit { path: &'a str, force: bool },
    Source(&'a str),
    Set(&'a str),
    Echo(&'a str),
    Autocmd { event: &'a str, command: &'a str },
    StartInsert,
    Tag(&'a str),
    /// `:cc [n]`, 1-based
    Quickfix(Option<usize>),
    Visual,
    Search(&'a str),
    Redraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Name {
    Quit,
    QuitAll,
    QuitWithError,
    Write,
    WriteQuit,
    Exit,
    Edit,
    Source,
    Set,
    Echo,
    Autocmd,
    StartInsert,
    Tag,
    Quickfix,
    Visual,
    Redraw,
}

/// (full name, shortest accepted abbreviation, command)
const COMMANDS: &[(&str, usize, Name)] = &[
    ("quit", 1, Name::Quit),
    ("qall", 2, Name::QuitAll),
    ("cquit", 2, Name::QuitWithError),
    ("write", 1, Name::Write),
    ("wq", 2, Name::WriteQuit),
    ("xit", 1, Name::Exit),
    ("edit", 1, Name::Edit),
    ("source", 2, Name::Source),
    ("set", 2, Name::Set),
    ("echo", 2, Name::Echo),
    ("autocmd", 2, Name::Autocmd),
    ("startinsert", 4, Name::StartInsert),
    ("tag", 2, Name::Tag),
    ("cc", 2, Name::Quickfix),
    ("visual", 2, Name::Visual),
    ("redraw", 4, Name::Redraw),
];

fn lookup(name: &str) -> Option<Name> {
    COMMANDS
        .iter()
        .find(|(full, min, _)| name.len() >= *min && full.starts_with(name))
        .map(|&(_, _, command)| command)
}

/// Parse one command line. The error is the message to show.
pub fn parse(line: &str) -> Result<ExCommand<'_>, String> {
    let line = line.trim_start_matches([' ', '\t', ':']).trim_end();
    if line.is_empty() || line.starts_with('"') {
        return Ok(ExCommand::Nop);
    }
    if line == "$" {
        return Ok(ExCommand::Goto(LineSpec::Last));
    }
    if line.starts_with(|c: char| c.is_ascii_digit()) {
        return line
            .parse()
            .map(|n| ExCommand::Goto(LineSpec::Number(n)))
            .map_err(|_| format!("E492: Not an editor command: {line}"));
    }
    if let Some(pattern) = line.strip_prefix('/') {
        let pattern = pattern.strip_suffix('/').unwrap_or(pattern);
        return Ok(ExCommand::Search(pattern));
    }

    let name_end = line
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(line.len());
    let (name, rest) = line.split_at(name_end);
    let (force, rest) = match rest.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let arg = rest.trim();
    let Some(command) = lookup(name) else {
        return Err(format!("E492: Not an editor command: {line}"));
    };

    let path = (!arg.is_empty()).then_some(arg);
    let required = || path.ok_or_else(|| "E471: Argument required".to_string());

    Ok(match command {
        Name::Quit => ExCommand::Quit { all: false, force },
        Name::QuitAll => ExCommand::Quit { all: true, force },
        Name::QuitWithError => ExCommand::QuitWithError,
        Name::Write => ExCommand::Write {
            path,
            force,
            quit: false,
        },
        Name::WriteQuit | Name::Exit => ExCommand::Write {
            path,
            force,
            quit: true,
        },
        Name::Edit => ExCommand::Edit {
            path: required()?,
            force,
        },
        Name::Source => ExCommand::Source(required()?),
        Name::Set => ExCommand::Set(required()?),
        Name::Echo => ExCommand::Echo(unquote(arg)),
        Name::Autocmd => {
            let (event, command) = split_autocmd(required()?)?;
            ExCommand::Autocmd { event, command }
        },
        Name::StartInsert => ExCommand::StartInsert,
        Name::Tag => ExCommand::Tag(required()?),
        Name::Quickfix => match path {
            Some(n) => ExCommand::Quickfix(Some(
                n.parse()
                    .map_err(|_| format!("E488: Trailing characters: {n}"))?,
            )),
            None => ExCommand::Quickfix(None),
        },
        Name::Visual => ExCommand::Visual,
        Name::Redraw => ExCommand::Redraw,
    })
}

/// `Event [*] command`
fn split_autocmd(arg: &str) -> Result<(&str, &str), String> {
    let (event, rest) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
    let rest = rest.trim_start();
    let rest = match rest.strip_prefix('*') {
        Some(after) => after.trim_start(),
        None => rest,
    };
    if rest.is_empty() {
        return Err("E471: Argument required".to_string());
    }
    Ok((event, rest))
}

fn unquote(arg: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|q| arg.strip_prefix(q).and_then(|a| a.strip_suffix(q)))
        .unwrap_or(arg)
}
