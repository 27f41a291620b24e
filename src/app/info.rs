//! Version text and the api-info manifest

use serde::Serialize;

use crate::host::{Hook, HOST_OPERATIONS};

pub const PROGRAM_NAME: &str = "mochi-edit";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Options a startup script may `:set`
const SETTABLE_OPTIONS: &[&str] = &[
    "binary",
    "diff",
    "exrc",
    "insertmode",
    "lisp",
    "loadplugins",
    "modifiable",
    "readonly",
    "rightleft",
    "write",
];

/// Text for `--version`
pub fn version_text() -> String {
    format!(
        "{PROGRAM_NAME} v{VERSION}\n\
         Build type: {}\n\
         \n\
         user rc file: \"$XDG_CONFIG_HOME/mochi/init.vim\"\n\
         system rc file: \"$XDG_CONFIG_DIRS/mochi/sysinit.vim\"\n",
        if cfg!(debug_assertions) { "Debug" } else { "Release" }
    )
}

/// Capability manifest printed by `--api-info`
#[derive(Debug, Clone, Serialize)]
pub struct ApiInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub hooks: Vec<&'static str>,
    pub host_operations: Vec<&'static str>,
    pub options: Vec<&'static str>,
    pub exit_codes: Vec<ExitCodeInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExitCodeInfo {
    pub code: i32,
    pub meaning: &'static str,
}

impl ApiInfo {
    pub fn collect() -> Self {
        Self {
            name: PROGRAM_NAME,
            version: VERSION,
            hooks: Hook::ALL.iter().map(|h| h.name()).collect(),
            host_operations: HOST_OPERATIONS.to_vec(),
            options: SETTABLE_OPTIONS.to_vec(),
            exit_codes: vec![
                ExitCodeInfo {
                    code: 0,
                    meaning: "normal exit",
                },
                ExitCodeInfo {
                    code: 1,
                    meaning: "argument error or failed load",
                },
                ExitCodeInfo {
                    code: 2,
                    meaning: "environment error",
                },
                ExitCodeInfo {
                    code: 3,
                    meaning: "quickfix load failure",
                },
            ],
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
