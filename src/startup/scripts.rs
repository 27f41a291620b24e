//! Startup scripts and plugins

use std::fs;
use std::path::{Path, PathBuf};

use crate::app::StartupConfig;
use crate::args::RcOverride;
use crate::host::{CommandOrigin, Host};
use crate::session::Session;

/// Source the user's startup scripts.
///
/// With `-u` only the named file is sourced. Otherwise the system rc runs,
/// then the first of `$MOCHIINIT`, the user rc files, `$EXINIT` and
/// `~/.exrc` that works. Local rc files follow when `exrc` got set.
pub(super) fn source_startup_scripts<H: Host + ?Sized>(
    session: &mut Session,
    host: &mut H,
    rc: Option<&RcOverride>,
    config: &StartupConfig,
) {
    match rc {
        Some(RcOverride::None) => session.options.loadplugins = false,
        Some(RcOverride::NoRc) => {},
        Some(RcOverride::Path(path)) => {
            if host.source_script(session, path).is_err() {
                let message = format!("E282: Cannot read from \"{}\"", path.display());
                host.show_error(session, &message);
            }
        },
        None if session.silent_mode => {},
        None => {
            if let Some(system) = &config.system_rc {
                if let Err(e) = host.source_script(session, system) {
                    tracing::debug!("no system rc: {e}");
                }
            }

            let found = run_env(session, host, "MOCHIINIT", config.init_env.as_deref())
                || config
                    .user_rc
                    .iter()
                    .any(|rc| source_quiet(session, host, rc))
                || run_env(session, host, "EXINIT", config.exinit_env.as_deref())
                || config
                    .user_exrc
                    .as_deref()
                    .is_some_and(|exrc| source_quiet(session, host, exrc));
            tracing::debug!(found, "user startup scripts");

            if session.options.exrc {
                source_local_rc(session, host, config);
            }
        },
    }
}

fn run_env<H: Host + ?Sized>(
    session: &mut Session,
    host: &mut H,
    name: &'static str,
    commands: Option<&str>,
) -> bool {
    let Some(commands) = commands else {
        return false;
    };
    for line in commands.lines() {
        host.execute_command(session, line, CommandOrigin::Environment(name));
    }
    true
}

fn source_quiet<H: Host + ?Sized>(session: &mut Session, host: &mut H, path: &Path) -> bool {
    match host.source_script(session, path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "sourced startup script");
            true
        },
        Err(e) => {
            tracing::trace!("skipping {}: {e}", path.display());
            false
        },
    }
}

/// `.mochirc` or `.exrc` in the current directory. A file we don't own
/// runs in secure mode.
fn source_local_rc<H: Host + ?Sized>(session: &mut Session, host: &mut H, config: &StartupConfig) {
    let user_files: Vec<PathBuf> = config
        .user_rc
        .iter()
        .chain(config.user_exrc.iter())
        .filter_map(|p| fs::canonicalize(p).ok())
        .collect();

    for local in &config.local_rc {
        if let Ok(canonical) = fs::canonicalize(local) {
            if user_files.contains(&canonical) {
                continue;
            }
        }
        session.options.secure = !file_owned(local);
        let sourced = source_quiet(session, host, local);
        session.options.secure = false;
        if sourced {
            break;
        }
    }
}

/// The file and, for a symlink, the link itself belong to us
fn file_owned(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let uid = nix::unistd::getuid().as_raw();
    let owned = |meta: std::io::Result<fs::Metadata>| meta.map(|m| m.uid() == uid).unwrap_or(false);
    owned(fs::metadata(path)) && owned(fs::symlink_metadata(path))
}

/// Source `plugin/**/*.vim` under every runtime directory
pub(super) fn load_plugins<H: Host + ?Sized>(
    session: &mut Session,
    host: &mut H,
    runtime_dirs: &[PathBuf],
) {
    if !session.options.loadplugins {
        tracing::debug!("plugin loading disabled");
        return;
    }
    for dir in runtime_dirs {
        let mut scripts = Vec::new();
        collect_scripts(&dir.join("plugin"), &mut scripts);
        scripts.sort();
        for script in scripts {
            if let Err(e) = host.source_script(session, &script) {
                tracing::warn!("plugin {}: {e}", script.display());
            }
        }
    }
}

fn collect_scripts(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_scripts(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "vim") {
            out.push(path);
        }
    }
}
