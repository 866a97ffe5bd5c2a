//! Script storage: a flat directory of `<name>.lua` files.
//!
//! ## Rust concepts
//! - `fs::read_dir()` for directory traversal
//! - `Path` and `PathBuf` for cross-platform file paths
//! - Validating input before it ever becomes a path

use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

const EXTENSION: &str = "lua";

/// One stored script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScriptEntry {
    /// Name without the `.lua` extension (e.g., "rainbow")
    pub name: String,
    /// File size in bytes
    pub size: u64,
}

#[derive(Debug)]
pub enum StoreError {
    /// Empty, or contains something besides ASCII letters, digits, `-`, `_`.
    InvalidName(String),
    NotFound(String),
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid script name '{name}'"),
            Self::NotFound(name) => write!(f, "no script named '{name}'"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Scripts kept under one directory.
#[derive(Clone, Debug)]
pub struct ScriptStore {
    dir: PathBuf,
}

impl ScriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Stored scripts sorted by name. A missing directory has none.
    pub fn list(&self) -> Vec<ScriptEntry> {
        let mut entries = Vec::new();

        let read_dir = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(_) => return entries,
        };

        for entry in read_dir.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }

            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                entries.push(ScriptEntry {
                    name: name.to_string(),
                    size,
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn read(&self, name: &str) -> Result<String, StoreError> {
        let path = self.path_for(name)?;
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::Io(e),
        })
    }

    /// Write (or overwrite) a script, creating the directory if needed.
    pub fn write(&self, name: &str, source: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(path, source)?;
        Ok(())
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.{EXTENSION}")))
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
