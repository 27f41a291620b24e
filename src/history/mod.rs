//! Persisted editor state
//!
//! Registers, command and search history, and the list of recently edited
//! files survive between sessions in a JSON file. Reading it never fails
//! the startup: a missing or damaged file just means an empty history.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Most recent files remembered
pub const MAX_OLDFILES: usize = 100;

/// Entries kept per history list
pub const MAX_HISTORY: usize = 50;

/// Error type for the state file
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to access state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("State file {path} is damaged: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Contents of the state file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Register name to its lines
    pub registers: BTreeMap<String, Vec<String>>,
    pub command_history: Vec<String>,
    pub search_history: Vec<String>,
    /// Most recent first
    pub oldfiles: Vec<PathBuf>,
}

impl PersistedState {
    pub fn read(path: &Path) -> Result<Self, StateError> {
        let text = fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read the state file, falling back to an empty state
    pub fn load_or_default(path: &Path) -> Self {
        match Self::read(path) {
            Ok(state) => {
                tracing::debug!(
                    path = %path.display(),
                    oldfiles = state.oldfiles.len(),
                    "loaded persisted state"
                );
                state
            },
            Err(StateError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Self::default()
            },
            Err(e) => {
                tracing::warn!("{e}");
                Self::default()
            },
        }
    }

    /// Write the state file, creating its directory when needed
    pub fn write(&self, path: &Path) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(|source| StateError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        tracing::debug!(path = %path.display(), "wrote persisted state");
        Ok(())
    }

    /// Put `file` at the front of the recent-file list
    pub fn remember_file(&mut self, file: PathBuf) {
        self.oldfiles.retain(|f| f != &file);
        self.oldfiles.insert(0, file);
        self.oldfiles.truncate(MAX_OLDFILES);
    }

    /// Merge files edited this session, given most recent first
    pub fn merge_oldfiles(&mut self, recent: impl IntoIterator<Item = PathBuf>) {
        let recent: Vec<PathBuf> = recent.into_iter().collect();
        for file in recent.into_iter().rev() {
            self.remember_file(file);
        }
    }

    pub fn remember_command(&mut self, command: &str) {
        push_history(&mut self.command_history, command);
    }

    pub fn remember_search(&mut self, pattern: &str) {
        push_history(&mut self.search_history, pattern);
    }
}

fn push_history(list: &mut Vec<String>, entry: &str) {
    if entry.is_empty() {
        return;
    }
    list.retain(|e| e != entry);
    list.push(entry.to_string());
    if list.len() > MAX_HISTORY {
        let excess = list.len() - MAX_HISTORY;
        list.drain(..excess);
    }
}
