//! Recorded command macros
//!
//! A macro is a named list of command lines captured by `record`. Invoking
//! the name replays the lines. When a macro directory is configured each
//! macro is also written to `<dir>/<name>.mgsh` and reloaded at startup.

use crate::error::CliError;
use chrono::Local;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MACRO_EXTENSION: &str = "mgsh";

#[derive(Debug, Default)]
pub struct MacroStore {
    macros: BTreeMap<String, Vec<String>>,
    dir: Option<PathBuf>,
}

/// Macro names: letters, digits, `-` and `_`, starting with a letter
pub fn is_valid_macro_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl MacroStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: PathBuf) -> Self {
        MacroStore {
            macros: BTreeMap::new(),
            dir: Some(dir),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Load every `*.mgsh` file in the macro directory. A missing
    /// directory is not an error.
    pub fn load_dir(&mut self) -> Result<usize, CliError> {
        let dir = match &self.dir {
            Some(dir) if dir.is_dir() => dir.clone(),
            _ => return Ok(0),
        };
        let mut loaded = 0;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MACRO_EXTENSION) {
                continue;
            }
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(name) if is_valid_macro_name(name) => name.to_string(),
                _ => {
                    warn!(path = %path.display(), "skipping macro file with invalid name");
                    continue;
                }
            };
            let lines = parse_lines(&fs::read_to_string(&path)?);
            self.macros.insert(name, lines);
            loaded += 1;
        }
        debug!(loaded, dir = %dir.display(), "loaded macros");
        Ok(loaded)
    }

    /// Register (or replace) a macro, persisting it when a directory is
    /// configured. Returns the file written, if any.
    pub fn register(&mut self, name: &str, lines: Vec<String>) -> Result<Option<PathBuf>, CliError> {
        if !is_valid_macro_name(name) {
            return Err(CliError::InvalidMacroName(name.to_string()));
        }
        let written = match &self.dir {
            Some(dir) => {
                let path = dir.join(format!("{}.{}", name, MACRO_EXTENSION));
                match fs::create_dir_all(dir).and_then(|_| write_lines(&path, name, &lines)) {
                    Ok(()) => Some(path),
                    Err(e) => {
                        warn!(macro_name = name, error = %e, "could not persist macro");
                        None
                    }
                }
            }
            None => None,
        };
        self.macros.insert(name.to_string(), lines);
        Ok(written)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.macros.get(name).map(|lines| lines.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.macros.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.{}", name, MACRO_EXTENSION));
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(macro_name = name, error = %e, "could not delete macro file");
                }
            }
        }
        self.macros.remove(name).is_some()
    }
}

fn header(title: &str) -> String {
    format!("# {} recorded {}\n", title, Local::now().format("%Y-%m-%d %H:%M:%S"))
}

fn write_lines(path: &Path, title: &str, lines: &[String]) -> std::io::Result<()> {
    let mut text = header(title);
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    fs::write(path, text)
}

/// Write recorded lines to `path` under a timestamp comment
pub fn export_lines(path: &Path, lines: &[String]) -> Result<(), CliError> {
    write_lines(path, "mgsh commands", lines)?;
    Ok(())
}

/// Command lines of a recorded file: comments and blank lines dropped
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}
