//! Temp-directory extraction for entries marked to be unpacked.
//!
//! Some nested archives cannot be used in place (native libraries, for
//! example) and are flagged at build time with a comment marker. Those
//! entries are copied out to a per-archive temp directory, verified against
//! the recorded checksum, and stamped with the entry's modification time.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tempfile::TempDir;

use crate::archive::ArchiveFile;
use crate::format::header::EntryHeader;
use crate::{Error, Result};

/// Comment prefix marking an entry for extraction.
pub(crate) const UNPACK_MARKER: &[u8] = b"UNPACK:";

const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Whether the entry's comment carries the unpack marker.
pub(crate) fn requires_unpack(header: &EntryHeader) -> bool {
    header.comment().starts_with(UNPACK_MARKER)
}

/// Creates the temp directory that unpacked entries of one archive share.
pub(crate) fn create_unpack_directory() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("nestarc-")
        .tempdir()
        .map_err(|source| Error::TempResource {
            path: std::env::temp_dir().display().to_string(),
            source,
        })
}

/// Extracts `header` into `directory`, returning the extracted path.
///
/// Extraction is idempotent: a file already present with the expected size
/// is reused, so repeated opens of the same nested archive do not copy
/// again. Content is checksum-verified while copying; a mismatch removes
/// the partial file.
pub(crate) fn unpack_entry(
    archive: &ArchiveFile,
    header: &EntryHeader,
    directory: &Path,
) -> Result<PathBuf> {
    let entry_name = header.name().as_str();
    let file_name = entry_name.rsplit('/').next().unwrap_or(entry_name);
    let destination = directory.join(file_name);

    if let Ok(existing) = fs::metadata(&destination) {
        if existing.is_file() && existing.len() == header.uncompressed_size() {
            return Ok(destination);
        }
    }

    let mut reader = archive.entry_reader(header)?;
    let mut file = File::create(&destination).map_err(|source| Error::TempResource {
        path: destination.display().to_string(),
        source,
    })?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        file.write_all(&buffer[..read])
            .map_err(|source| Error::TempResource {
                path: destination.display().to_string(),
                source,
            })?;
    }
    drop(file);

    let actual = hasher.finalize();
    if actual != header.crc() {
        let _ = fs::remove_file(&destination);
        return Err(Error::CrcMismatch {
            entry_name: entry_name.to_string(),
            expected: header.crc(),
            actual,
        });
    }

    let modified = FileTime::from_unix_time(header.unix_modified_time(), 0);
    filetime::set_file_mtime(&destination, modified).map_err(|source| Error::TempResource {
        path: destination.display().to_string(),
        source,
    })?;
    Ok(destination)
}
