//! Variable files (`.env`)

use std::collections::HashMap;
use std::path::Path;

use sd_core::error::SyntaxError;

/// Variables available to expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet(HashMap<String, String>);

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Insert a variable, replacing any earlier value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Parse `KEY=value` lines
///
/// Blank lines, `#` comments and lines without `=` are skipped. Later
/// definitions win.
pub fn load_variable_file(raw: &str) -> VariableSet {
    let mut vars = VariableSet::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        vars.insert(key.trim(), unquote(value.trim()));
    }

    vars
}

/// Read and parse a variable file
pub fn load_variable_file_path(path: &Path) -> Result<VariableSet, SyntaxError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SyntaxError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(load_variable_file(&raw))
}

/// Strip one pair of matching surrounding quotes
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
