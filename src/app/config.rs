//! Configuration for the editor
//!
//! Paths and startup commands resolved from the environment. XDG variables
//! win; `dirs` fills in when they are unset. A `config.json` in the user
//! config directory is applied on top.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name used for every per-user directory
const APP_DIR: &str = "mochi";

const SETTINGS_FILE: &str = "config.json";

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Startup scripts, environment and files
    pub startup: StartupConfig,
    /// Directories searched for `plugin/**/*.vim`
    pub runtime_dirs: Vec<PathBuf>,
    /// Persisted-state file
    pub shada_file: Option<PathBuf>,
    /// Swap files live here
    pub swap_dir: Option<PathBuf>,
    /// Default `errorfile`
    pub errorfile: PathBuf,
    /// Tags file read by `:tag`
    pub tags: PathBuf,
}

/// Where startup scripts come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Sourced before anything else when it exists
    pub system_rc: Option<PathBuf>,
    /// `$MOCHIINIT`, run as Ex commands
    pub init_env: Option<String>,
    /// User rc files, first readable one wins
    pub user_rc: Vec<PathBuf>,
    /// `$EXINIT`, run as Ex commands
    pub exinit_env: Option<String>,
    /// Classic `~/.exrc`
    pub user_exrc: Option<PathBuf>,
    /// Local files tried when the `exrc` option is set
    pub local_rc: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup: StartupConfig::default(),
            runtime_dirs: Vec::new(),
            shada_file: None,
            swap_dir: None,
            errorfile: PathBuf::from("errors.err"),
            tags: PathBuf::from("tags"),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            system_rc: None,
            init_env: None,
            user_rc: Vec::new(),
            exinit_env: None,
            user_exrc: None,
            local_rc: vec![PathBuf::from(".mochirc"), PathBuf::from(".exrc")],
        }
    }
}

impl Config {
    /// Resolve from the process environment and apply the settings file
    pub fn from_env() -> Self {
        let lookup = |key: &str| std::env::var_os(key);
        let config = Self::resolve(lookup);
        let Some(path) = Self::settings_path(lookup).filter(|p| p.exists()) else {
            return config;
        };
        match config.clone().overlay(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "settings file applied");
                config
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring settings file: {e}");
                config
            },
        }
    }

    /// `config.json` under the user config directory
    pub fn settings_path(lookup: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
        config_home(&lookup).map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Apply the JSON settings in `path`. Keys the file leaves out keep
    /// their current values.
    pub fn overlay(self, path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: serde_json::Value = serde_json::from_str(&content)?;
        let mut merged = serde_json::to_value(&self)?;
        merge(&mut merged, settings);
        Ok(serde_json::from_value(merged)?)
    }

    /// Resolve from an environment lookup
    pub fn resolve(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let dir = |key: &str| var(key).map(PathBuf::from);

        let home = dir("HOME").or_else(dirs::home_dir);
        let config_home = config_home(&lookup);
        let data_home = dir("XDG_DATA_HOME")
            .or_else(dirs::data_dir)
            .or_else(|| home.as_ref().map(|h| h.join(".local").join("share")));
        let state_home = dir("XDG_STATE_HOME")
            .or_else(dirs::state_dir)
            .or_else(|| home.as_ref().map(|h| h.join(".local").join("state")));
        let system_config = var("XDG_CONFIG_DIRS")
            .and_then(|dirs| {
                dirs.to_string_lossy()
                    .split(':')
                    .find(|d| !d.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from("/etc/xdg"));

        let text = |key: &str| var(key).map(|v| v.to_string_lossy().into_owned());

        let mut user_rc = Vec::new();
        if let Some(config_home) = &config_home {
            user_rc.push(config_home.join(APP_DIR).join("init.vim"));
        }
        if let Some(home) = &home {
            user_rc.push(home.join(".mochirc"));
        }

        let mut runtime_dirs = Vec::new();
        if let Some(config_home) = &config_home {
            runtime_dirs.push(config_home.join(APP_DIR));
        }
        if let Some(data_home) = &data_home {
            runtime_dirs.push(data_home.join(APP_DIR).join("site"));
        }

        let defaults = Self::default();
        Self {
            startup: StartupConfig {
                system_rc: Some(system_config.join(APP_DIR).join("sysinit.vim")),
                init_env: text("MOCHIINIT"),
                user_rc,
                exinit_env: text("EXINIT"),
                user_exrc: home.as_ref().map(|h| h.join(".exrc")),
                local_rc: defaults.startup.local_rc,
            },
            runtime_dirs,
            shada_file: state_home
                .as_ref()
                .map(|s| s.join(APP_DIR).join("shada.json")),
            swap_dir: state_home.as_ref().map(|s| s.join(APP_DIR).join("swap")),
            errorfile: defaults.errorfile,
            tags: defaults.tags,
        }
    }

    /// Swap file that would belong to `file`
    pub fn swap_file_for(&self, file: &Path) -> Option<PathBuf> {
        let dir = self.swap_dir.as_ref()?;
        let absolute = std::path::absolute(file).ok()?;
        let name = absolute.to_string_lossy().replace('/', "%");
        Some(dir.join(format!("{name}.swp")))
    }
}

/// Error type for the settings file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn config_home(lookup: &impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    let dir = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
    dir("XDG_CONFIG_HOME")
        .or_else(dirs::config_dir)
        .or_else(|| dir("HOME").or_else(dirs::home_dir).map(|h| h.join(".config")))
}

/// Objects merge key by key; anything else replaces
fn merge(base: &mut serde_json::Value, settings: serde_json::Value) {
    match (base, settings) {
        (serde_json::Value::Object(base), serde_json::Value::Object(settings)) => {
            for (key, value) in settings {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    },
                }
            }
        },
        (base, settings) => *base = settings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_env(key: &str) -> Option<OsString> {
        match key {
            "HOME" => Some("/home/ada".into()),
            "XDG_CONFIG_HOME" => Some("/home/ada/.config".into()),
            "XDG_DATA_HOME" => Some("/home/ada/.local/share".into()),
            "XDG_STATE_HOME" => Some("/home/ada/.local/state".into()),
            "XDG_CONFIG_DIRS" => Some(":/opt/xdg:/etc/xdg".into()),
            "MOCHIINIT" => Some("set exrc".into()),
            "EXINIT" => Some("".into()),
            _ => None,
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.errorfile, PathBuf::from("errors.err"));
        assert!(config.shada_file.is_none());
        assert_eq!(config.startup.local_rc.len(), 2);
    }

    #[test]
    fn test_resolve_paths() {
        let config = Config::resolve(fake_env);
        assert_eq!(
            config.startup.user_rc,
            vec![
                PathBuf::from("/home/ada/.config/mochi/init.vim"),
                PathBuf::from("/home/ada/.mochirc"),
            ]
        );
        assert_eq!(
            config.startup.system_rc,
            Some(PathBuf::from("/opt/xdg/mochi/sysinit.vim"))
        );
        assert_eq!(
            config.shada_file,
            Some(PathBuf::from("/home/ada/.local/state/mochi/shada.json"))
        );
        assert_eq!(
            config.runtime_dirs,
            vec![
                PathBuf::from("/home/ada/.config/mochi"),
                PathBuf::from("/home/ada/.local/share/mochi/site"),
            ]
        );
    }

    #[test]
    fn test_resolve_env_commands() {
        let config = Config::resolve(fake_env);
        assert_eq!(config.startup.init_env.as_deref(), Some("set exrc"));
        assert_eq!(config.startup.exinit_env, None);
    }

    #[test]
    fn test_swap_file_name() {
        let config = Config::resolve(fake_env);
        let swap = config.swap_file_for(Path::new("/work/notes.txt")).unwrap();
        assert_eq!(
            swap,
            PathBuf::from("/home/ada/.local/state/mochi/swap/%work%notes.txt.swp")
        );
    }

    #[test]
    fn test_settings_path() {
        assert_eq!(
            Config::settings_path(fake_env),
            Some(PathBuf::from("/home/ada/.config/mochi/config.json"))
        );
    }

    #[test]
    fn test_overlay_keeps_unset_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "errorfile": "build.err",
                "tags": "/work/tags",
                "swap_dir": null,
                "startup": { "exinit_env": "set nu" }
            }"#,
        )
        .unwrap();

        let resolved = Config::resolve(fake_env);
        let config = resolved.clone().overlay(&path).unwrap();
        assert_eq!(config.errorfile, PathBuf::from("build.err"));
        assert_eq!(config.tags, PathBuf::from("/work/tags"));
        assert_eq!(config.swap_dir, None);
        assert_eq!(config.startup.exinit_env.as_deref(), Some("set nu"));
        assert_eq!(config.startup.user_rc, resolved.startup.user_rc);
        assert_eq!(config.startup.init_env, resolved.startup.init_env);
        assert_eq!(config.shada_file, resolved.shada_file);
    }

    #[test]
    fn test_overlay_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::default().overlay(&path),
            Err(ConfigError::Json(_))
        ));
        std::fs::write(&path, r#"{ "runtime_dirs": 3 }"#).unwrap();
        assert!(matches!(
            Config::default().overlay(&path),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            Config::default().overlay(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_partial_file_deserializes_with_defaults() {
        let config: Config = serde_json::from_str(r#"{ "errorfile": "make.err" }"#).unwrap();
        assert_eq!(config.errorfile, PathBuf::from("make.err"));
        assert_eq!(config.tags, PathBuf::from("tags"));
        assert_eq!(config.startup, StartupConfig::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::resolve(fake_env);
        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
