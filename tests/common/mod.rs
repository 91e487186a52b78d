#![allow(dead_code)]

//! Hand-built archive fixtures.
//!
//! Tests construct archives byte by byte instead of shelling out to a zip
//! tool, so every structural variation (prefixed files, ZIP64 records,
//! compressed nested entries, comment markers) is reproducible and exact.

use std::io::Write;

use tempfile::NamedTempFile;

pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATED: u16 = 8;

/// 2024-05-15 10:30:00 packed as MS-DOS date/time.
pub const FIXED_DOS_TIME: u32 = (44 << 25) | (5 << 21) | (15 << 16) | (10 << 11) | (30 << 5);

pub struct EntrySpec {
    name: String,
    data: Vec<u8>,
    method: u16,
    comment: Vec<u8>,
}

/// Builds archive bytes: local records, central directory, optional ZIP64
/// records, end record, with optional leading prefix bytes.
pub struct ArchiveBuilder {
    prefix: Vec<u8>,
    entries: Vec<EntrySpec>,
    comment: String,
    force_zip64: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            prefix: Vec::new(),
            entries: Vec::new(),
            comment: String::new(),
            force_zip64: false,
        }
    }

    /// Prepends launcher-stub style bytes before the archive proper.
    pub fn prefix(mut self, bytes: &[u8]) -> Self {
        self.prefix = bytes.to_vec();
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Emits ZIP64 end records even though the archive is small.
    pub fn zip64(mut self) -> Self {
        self.force_zip64 = true;
        self
    }

    /// Adds a stored entry.
    pub fn entry(self, name: &str, data: &[u8]) -> Self {
        self.entry_full(name, data, METHOD_STORED, b"")
    }

    /// Adds a stored entry carrying an entry comment.
    pub fn entry_with_comment(self, name: &str, data: &[u8], comment: &[u8]) -> Self {
        self.entry_full(name, data, METHOD_STORED, comment)
    }

    /// Adds a deflated entry.
    #[cfg(feature = "deflate")]
    pub fn deflated_entry(self, name: &str, data: &[u8]) -> Self {
        self.entry_full(name, data, METHOD_DEFLATED, b"")
    }

    /// Adds a directory entry.
    pub fn directory(self, name: &str) -> Self {
        assert!(name.ends_with('/'), "directory names end with a slash");
        self.entry_full(name, b"", METHOD_STORED, b"")
    }

    pub fn entry_full(mut self, name: &str, data: &[u8], method: u16, comment: &[u8]) -> Self {
        self.entries.push(EntrySpec {
            name: name.to_string(),
            data: data.to_vec(),
            method,
            comment: comment.to_vec(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut archive = Vec::new();
        let mut central = Vec::new();
        let mut count = 0u64;

        for entry in &self.entries {
            let crc = crc32(&entry.data);
            let stored = match entry.method {
                METHOD_STORED => entry.data.clone(),
                #[cfg(feature = "deflate")]
                METHOD_DEFLATED => deflate(&entry.data),
                other => panic!("fixture does not support method {other}"),
            };
            let local_offset = archive.len() as u32;

            // Local file header.
            archive.extend_from_slice(&0x0403_4B50u32.to_le_bytes());
            archive.extend_from_slice(&20u16.to_le_bytes());
            archive.extend_from_slice(&0u16.to_le_bytes());
            archive.extend_from_slice(&entry.method.to_le_bytes());
            archive.extend_from_slice(&FIXED_DOS_TIME.to_le_bytes());
            archive.extend_from_slice(&crc.to_le_bytes());
            archive.extend_from_slice(&(stored.len() as u32).to_le_bytes());
            archive.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            archive.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            archive.extend_from_slice(&0u16.to_le_bytes());
            archive.extend_from_slice(entry.name.as_bytes());
            archive.extend_from_slice(&stored);

            // Central directory file header.
            central.extend_from_slice(&0x0201_4B50u32.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&entry.method.to_le_bytes());
            central.extend_from_slice(&FIXED_DOS_TIME.to_le_bytes());
            central.extend_from_slice(&crc.to_le_bytes());
            central.extend_from_slice(&(stored.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
            central.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&(entry.comment.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u32.to_le_bytes());
            central.extend_from_slice(&local_offset.to_le_bytes());
            central.extend_from_slice(entry.name.as_bytes());
            central.extend_from_slice(&entry.comment);
            count += 1;
        }

        let central_offset = archive.len() as u64;
        let central_size = central.len() as u64;
        archive.extend_from_slice(&central);

        if self.force_zip64 {
            let zip64_end_offset = archive.len() as u64;
            archive.extend_from_slice(&0x0606_4B50u32.to_le_bytes());
            archive.extend_from_slice(&44u64.to_le_bytes());
            archive.extend_from_slice(&45u16.to_le_bytes());
            archive.extend_from_slice(&45u16.to_le_bytes());
            archive.extend_from_slice(&0u32.to_le_bytes());
            archive.extend_from_slice(&0u32.to_le_bytes());
            archive.extend_from_slice(&count.to_le_bytes());
            archive.extend_from_slice(&count.to_le_bytes());
            archive.extend_from_slice(&central_size.to_le_bytes());
            archive.extend_from_slice(&central_offset.to_le_bytes());

            archive.extend_from_slice(&0x0706_4B50u32.to_le_bytes());
            archive.extend_from_slice(&0u32.to_le_bytes());
            archive.extend_from_slice(&zip64_end_offset.to_le_bytes());
            archive.extend_from_slice(&1u32.to_le_bytes());
        }

        archive.extend_from_slice(&0x0605_4B50u32.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        archive.extend_from_slice(&0u16.to_le_bytes());
        if self.force_zip64 {
            archive.extend_from_slice(&0xFFFFu16.to_le_bytes());
            archive.extend_from_slice(&0xFFFFu16.to_le_bytes());
            archive.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
            archive.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        } else {
            archive.extend_from_slice(&(count as u16).to_le_bytes());
            archive.extend_from_slice(&(count as u16).to_le_bytes());
            archive.extend_from_slice(&(central_size as u32).to_le_bytes());
            archive.extend_from_slice(&(central_offset as u32).to_le_bytes());
        }
        archive.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        archive.extend_from_slice(self.comment.as_bytes());

        let mut file = self.prefix.clone();
        file.extend_from_slice(&archive);
        file
    }

    /// Writes the archive to a named temp file and returns its handle.
    pub fn write_temp(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp archive");
        file.write_all(&self.build()).expect("write temp archive");
        file.flush().expect("flush temp archive");
        file
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(feature = "deflate")]
fn deflate(data: &[u8]) -> Vec<u8> {
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("deflate fixture data");
    encoder.finish().expect("finish deflate stream")
}
