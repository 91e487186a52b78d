//! Error types for archive loading operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when opening packaged archives, resolving nested entries,
//! and loading components, along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`:
//!
//! ```rust,no_run
//! use nestarc::{ArchiveFile, Result};
//!
//! fn count_entries(path: &str) -> Result<usize> {
//!     let archive = ArchiveFile::open_path(path)?;
//!     Ok(archive.entry_count())
//! }
//! ```
//!
//! Lookup misses are ordinary data, not hard failures: callers probing for
//! optional entries should treat [`Error::NotFound`] and [`Error::Absent`]
//! as "not there" via [`Error::is_not_found`].

use std::io;

/// The main error type for archive loading operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | File system operations |
/// | Format | [`Format`][Self::Format] | Malformed or unlocatable ZIP structures |
/// | Bounds | [`Bounds`][Self::Bounds], [`Truncated`][Self::Truncated] | Reads outside a region's window |
/// | Lookup | [`NotFound`][Self::NotFound], [`Absent`][Self::Absent] | Missing entries or resources |
/// | Packaging | [`Configuration`][Self::Configuration] | Compressed nested archives |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch] | Corrupted entry data |
/// | Extraction | [`TempResource`][Self::TempResource] | Temp-file creation/write failures |
/// | Launch | [`Launch`][Self::Launch] | Missing mandatory entry point |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive format is invalid or not recognized.
    ///
    /// Returned when the end-of-central-directory record cannot be located
    /// within the maximum trailer window, or when a fixed header field does
    /// not match its signature. Always fatal to opening that archive.
    #[error("Invalid archive format: {0}")]
    Format(String),

    /// A read or subsection request fell outside a region's valid window.
    ///
    /// Indicates caller error or data corruption; never retried.
    #[error(
        "Range out of bounds: offset {offset} with length {length} exceeds {available} available bytes"
    )]
    Bounds {
        /// Requested offset, relative to the region start.
        offset: u64,
        /// Requested length.
        length: u64,
        /// The region's total size.
        available: u64,
    },

    /// A read started inside a region but ran past its end.
    #[error(
        "Truncated read: {length} bytes at offset {offset} run past end of {available}-byte region"
    )]
    Truncated {
        /// Requested offset, relative to the region start.
        offset: u64,
        /// Requested length.
        length: u64,
        /// The region's total size.
        available: u64,
    },

    /// An entry, nested archive, or resource was not found.
    ///
    /// Recoverable: callers probing optional paths treat this as absence.
    /// Only a missing mandatory entry point turns it fatal.
    #[error("Entry not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: String,
    },

    /// Allocation-free "not found" sentinel used during probe-mode
    /// resolution, where many candidate paths are expected to miss.
    ///
    /// See [`ResolveMode::Probe`](crate::chain::ResolveMode::Probe).
    #[error("entry not found")]
    Absent,

    /// A nested archive entry is compressed and cannot be accessed in place.
    ///
    /// Nested archives must be stored (not deflated) so that they can be
    /// addressed as byte windows of the parent. This is a packaging defect,
    /// detected at resolution time.
    #[error(
        "Unable to open nested entry '{entry}'. It has been compressed and nested archives \
         must be stored without compression. Please check the mechanism used to create \
         your executable archive"
    )]
    Configuration {
        /// The offending entry name.
        entry: String,
    },

    /// Failed to create or write an extraction target for an unpacked entry.
    ///
    /// Fatal for that specific resolution only; sibling lookups are
    /// unaffected.
    #[error("Unable to unpack entry to '{path}': {source}")]
    TempResource {
        /// The extraction target path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The CRC-32 of an entry's bytes does not match the central directory.
    #[error("CRC mismatch for entry '{entry_name}': expected {expected:#x}, got {actual:#x}")]
    CrcMismatch {
        /// The entry whose data failed verification.
        entry_name: String,
        /// The CRC declared in the central directory.
        expected: u32,
        /// The CRC computed over the extracted bytes.
        actual: u32,
    },

    /// A chained address could not be parsed.
    #[error("Invalid chained address '{address}': {reason}")]
    Address {
        /// The address text.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A classpath index file line did not match the expected quoted form.
    #[error("Malformed classpath index line [{line}]")]
    IndexLine {
        /// The offending line.
        line: String,
    },

    /// Launch orchestration failed, typically a missing mandatory entry
    /// point or an unusable package layout.
    #[error("Launch failed: {0}")]
    Launch(String),
}

impl Error {
    /// Returns `true` if this error means "the thing is not there" rather
    /// than "something broke".
    ///
    /// Covers both the descriptive [`NotFound`][Self::NotFound] and the
    /// probe-mode [`Absent`][Self::Absent] sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::Absent)
    }

    /// Returns `true` if the archive itself is malformed or corrupted.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::Format(_)
                | Error::Bounds { .. }
                | Error::Truncated { .. }
                | Error::CrcMismatch { .. }
        )
    }

    /// Returns `true` if this error indicates a packaging defect that the
    /// build step must fix (as opposed to a damaged or missing file).
    pub fn is_packaging_error(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// Adds archive context to a descriptive lookup miss, leaving other
    /// errors untouched.
    ///
    /// Probe-mode [`Absent`][Self::Absent] stays cheap and unformatted.
    pub(crate) fn with_entry_context(self, archive: &str, entry: &str) -> Self {
        match self {
            Error::NotFound { .. } => Error::NotFound {
                path: format!("{entry} in {archive}"),
            },
            other => other,
        }
    }
}

/// A specialized Result type for archive loading operations.
pub type Result<T> = std::result::Result<T, Error>;
