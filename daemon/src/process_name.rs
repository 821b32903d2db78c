/// Validated executable name of a watched process.
///
/// Built once from raw config input (`"cs2.exe"`, `" valorant "`) and never
/// mutated. The stored value has its extension stripped and contains only
/// ASCII letters, digits, `_` and `-`.
///
/// Equality is case-sensitive on the normalized value. Lookups against the
/// live process list go through [`ProcessName::match_key`], which folds case.
use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessNameError {
    #[error("process name must not be empty or whitespace")]
    Empty,
    #[error("process name {0:?} may only contain letters, digits, '_' and '-'")]
    InvalidCharacters(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessName(String);

impl ProcessName {
    pub fn new(raw: &str) -> Result<Self, ProcessNameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProcessNameError::Empty);
        }

        let stem = strip_extension(trimmed);
        if stem.is_empty() {
            return Err(ProcessNameError::Empty);
        }
        if !stem.chars().all(is_allowed_char) {
            return Err(ProcessNameError::InvalidCharacters(stem.to_string()));
        }

        Ok(Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-folded key used for watched-name set membership.
    pub fn match_key(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-cased, extension-free form of an OS executable name, comparable with
/// [`ProcessName::match_key`]. Does not validate.
pub fn executable_match_key(exe_name: &str) -> String {
    strip_extension(exe_name.trim()).to_ascii_lowercase()
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
