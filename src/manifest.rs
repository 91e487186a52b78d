//! Archive manifest parsing.
//!
//! Manifests are line-oriented `Name: Value` pairs. Long values wrap onto
//! continuation lines that begin with a single space, lines may end with
//! CRLF or bare LF, and the main attribute section ends at the first blank
//! line. Attribute names compare case-insensitively.

use std::collections::HashMap;

use crate::{Error, Result};

/// Location of the manifest within an archive.
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// The main attribute section of an archive manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    attributes: HashMap<String, String>,
}

impl Manifest {
    /// Parses the main section of `bytes`. Per-entry sections after the
    /// first blank line are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes);
        let mut attributes = HashMap::new();
        let mut current: Option<(String, String)> = None;
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                match &mut current {
                    Some((_, value)) => value.push_str(continuation),
                    None => {
                        return Err(Error::Format(
                            "manifest continuation line before any attribute".into(),
                        ));
                    }
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                attributes.insert(name, value);
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                Error::Format(format!("manifest line is not an attribute: {line:?}"))
            })?;
            current = Some((
                name.trim().to_ascii_lowercase(),
                value.trim_start().to_string(),
            ));
        }
        if let Some((name, value)) = current {
            attributes.insert(name, value);
        }
        Ok(Self { attributes })
    }

    /// Looks up a main attribute, ignoring case.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_attributes() {
        let manifest = Manifest::parse(
            b"Manifest-Version: 1.0\r\nStart-Entry: lib/app.pkg\r\n\r\n",
        )
        .unwrap();
        assert_eq!(manifest.attribute("Manifest-Version"), Some("1.0"));
        assert_eq!(manifest.attribute("start-entry"), Some("lib/app.pkg"));
        assert_eq!(manifest.attribute("Missing"), None);
    }

    #[test]
    fn test_continuation_lines_join_without_the_leading_space() {
        let manifest = Manifest::parse(
            b"Class-Path: first.pkg\n second.pkg\nOther: x\n",
        )
        .unwrap();
        assert_eq!(manifest.attribute("Class-Path"), Some("first.pkgsecond.pkg"));
        assert_eq!(manifest.attribute("Other"), Some("x"));
    }

    #[test]
    fn test_entry_sections_are_ignored() {
        let manifest = Manifest::parse(
            b"Main: yes\n\nName: lib/x.pkg\nDigest: abc\n",
        )
        .unwrap();
        assert_eq!(manifest.attribute("Main"), Some("yes"));
        assert_eq!(manifest.attribute("Digest"), None);
    }

    #[test]
    fn test_bare_line_is_an_error() {
        assert!(Manifest::parse(b"not an attribute line\n").is_err());
    }

    #[test]
    fn test_leading_continuation_is_an_error() {
        assert!(Manifest::parse(b" dangling\n").is_err());
    }
}
