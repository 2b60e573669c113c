//! Runtime configuration from `MGSH_*` environment variables
//!
//! - `MGSH_CONTROLLER`  endpoint URL for the HTTP controller
//! - `MGSH_MODEL`       JSON model file for the in-memory controller
//! - `MGSH_MAX_NESTING` bound on block replay depth (default 64)
//! - `MGSH_MACRO_DIR`   where recorded macros are kept (default `~/.mgsh/macros`)
//! - `MGSH_BANNER`      show the startup banner

use std::env;
use std::path::PathBuf;

pub const DEFAULT_MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub controller: Option<String>,
    pub model: Option<PathBuf>,
    pub max_nesting: usize,
    pub macro_dir: Option<PathBuf>,
    pub banner: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            controller: None,
            model: None,
            max_nesting: DEFAULT_MAX_NESTING,
            macro_dir: None,
            banner: false,
        }
    }
}

/// Get home directory
pub fn dirs_home() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok(), dirs_home())
    }

    /// Build from any variable source; `home` supplies the macro dir default
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, home: Option<PathBuf>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Config {
            controller: non_empty("MGSH_CONTROLLER"),
            model: non_empty("MGSH_MODEL").map(PathBuf::from),
            max_nesting: non_empty("MGSH_MAX_NESTING")
                .and_then(|s| s.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_NESTING),
            macro_dir: non_empty("MGSH_MACRO_DIR")
                .map(PathBuf::from)
                .or_else(|| home.map(|h| h.join(".mgsh").join("macros"))),
            banner: lookup("MGSH_BANNER").is_some(),
        }
    }
}
