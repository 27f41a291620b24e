//! Mochi Edit
//!
//! Scans the arguments, runs startup, hands the session to the main loop and
//! leaves through the shutdown sequence.

use std::io::{self, Write};
use std::process::ExitCode;

use mochi_edit::app::{info, logging, ApiInfo, Config, PROGRAM_NAME};
use mochi_edit::args::{self, usage, InfoRequest, ScanOutcome};
use mochi_edit::error::{Classify, ErrorClass};
use mochi_edit::host::{BasicHost, Host};
use mochi_edit::startup::{Startup, StartupError};
use mochi_edit::terminal::{signal, TtyState};
use mochi_edit::{shutdown, LoopExit, MainLoop};

fn main() -> ExitCode {
    if let Err(e) = logging::init() {
        eprintln!("{PROGRAM_NAME}: cannot open log file: {e}");
    }

    let argv = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned());
    let params = match args::scan(argv) {
        Ok(ScanOutcome::Start(params)) => params,
        Ok(ScanOutcome::Info(request)) => return print_info(request),
        Err(e) => {
            tracing::debug!("argument error: {e:?}");
            eprintln!("{PROGRAM_NAME}: {e}");
            if e.class() == ErrorClass::Parse {
                eprintln!("{}", usage::usage_hint());
            }
            return exit_code(e.exit_code());
        },
    };

    let params = params.with_tty(TtyState::probe());
    if let Err(e) = signal::install_interrupt_handler() {
        tracing::warn!("{e}");
    }

    let config = Config::from_env();
    tracing::debug!(?config, "resolved configuration");
    let mut host = BasicHost::new(params.headless, config.clone());
    let mut startup = Startup::new(params, config);

    let mut session = match startup.allocate() {
        Ok(session) => session,
        Err(e) => return fail(&mut host, &e),
    };
    if let Err(e) = startup.run(&mut session, &mut host) {
        if e.runs_shutdown() {
            if let StartupError::Recovery(source) = &e {
                host.show_error(&mut session, &source.to_string());
            }
            shutdown::exit(session, &mut host, e.exit_code());
        }
        drop(session);
        return fail(&mut host, &e);
    }

    let code = match MainLoop::top_level().run(&mut session, &mut host) {
        LoopExit::Exit(code) => code,
        LoopExit::Returned => 0,
    };
    shutdown::exit(session, &mut host, code)
}

fn print_info(request: InfoRequest) -> ExitCode {
    let text = match request {
        InfoRequest::Help => usage::usage_text(),
        InfoRequest::Version => info::version_text(),
        InfoRequest::ApiInfo => match ApiInfo::collect().to_json() {
            Ok(json) => json + "\n",
            Err(e) => {
                eprintln!("{PROGRAM_NAME}: {e}");
                return ExitCode::FAILURE;
            },
        },
    };
    let mut stdout = io::stdout().lock();
    if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
        tracing::warn!("writing to stdout: {e}");
    }
    ExitCode::SUCCESS
}

/// Print a startup error and give the terminal back
fn fail(host: &mut BasicHost, error: &StartupError) -> ExitCode {
    host.release_resources();
    if !matches!(error, StartupError::SwapFilesListed) {
        tracing::error!("startup failed: {error}");
        eprintln!("{error}");
    }
    exit_code(error.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
