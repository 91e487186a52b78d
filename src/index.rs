//! Build-time classpath index files.
//!
//! The packaging tool can record the intended component order in a small
//! YAML-shaped list, one `- "entry/path"` line per component. When present,
//! the index takes precedence over central directory order.

use crate::{Error, Result};

/// A parsed classpath index: component entry names in declared order.
#[derive(Debug, Clone)]
pub struct PathIndexFile {
    lines: Vec<String>,
}

impl PathIndexFile {
    /// Parses index content. Blank lines are ignored, duplicates keep
    /// their first position, and anything not shaped `- "path"` fails.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let mut lines = Vec::new();
        for raw in text.split('\n') {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let path = line
                .strip_prefix("- \"")
                .and_then(|rest| rest.strip_suffix('"'))
                .ok_or_else(|| Error::IndexLine {
                    line: line.to_string(),
                })?;
            if !lines.iter().any(|existing| existing == path) {
                lines.push(path.to_string());
            }
        }
        Ok(Self { lines })
    }

    /// Whether `name` is one of the indexed components.
    pub fn contains_entry(&self, name: &str) -> bool {
        self.lines.iter().any(|line| line == name)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Indexed entry names in declared order.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}
