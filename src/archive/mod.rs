//! Random-access archive files, outer and nested.
//!
//! An [`ArchiveFile`] wraps a byte region and the index built from its
//! central directory. Outer files are opened from a path; nested archives
//! are materialized without copying, either as a filtered view over a
//! directory entry's children or as a byte window over a stored entry.

pub(crate) mod entries;
pub(crate) mod unpack;

use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::data::{RandomAccessRegion, RegionReader};
use crate::format::end_record::EndRecord;
use crate::format::header::EntryHeader;
use crate::format::parser::{self, DirectoryVisitor, NameFilter};
use crate::format::{
    LOCAL_FILE_HEADER_SIGNATURE, LOCAL_FILE_HEADER_SIZE, METHOD_DEFLATED, METHOD_STORED,
};
use crate::bytes::{read_u16_le, read_u32_le};
use crate::manifest::{Manifest, MANIFEST_NAME};
use crate::{Error, Result};

use self::entries::{EntryIndex, EntryIndexBuilder};

/// Highest runtime version probed for multi-version overlay entries.
const RUNTIME_VERSION: u32 = 21;

/// Version below which entries always live at their base path.
const BASE_VERSION: u32 = 8;

const VERSIONS_PREFIX: &str = "META-INF/versions/";
const PROTECTED_PREFIX: &[u8] = b"META-INF/";
const SIGNATURE_SUFFIX: &[u8] = b".SF";

/// How an [`ArchiveFile`] relates to the file it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Opened directly from a file on disk.
    Direct,
    /// A view over the children of a directory entry in a parent archive.
    NestedDirectory,
    /// A byte window over a stored entry in a parent archive.
    NestedArchive,
}

/// A parsed archive backed by a random-access byte region.
pub struct ArchiveFile {
    data: RandomAccessRegion,
    location: String,
    kind: ArchiveKind,
    index: EntryIndex,
    comment: String,
    signed: bool,
    manifest: OnceLock<Option<Arc<Manifest>>>,
    multi_version: OnceLock<bool>,
}

/// Captures the archive comment and scans for signature files during the
/// central directory pass.
#[derive(Default)]
struct MetadataCollector {
    comment: String,
    signed: bool,
}

impl DirectoryVisitor for MetadataCollector {
    fn start(&mut self, end_record: &EndRecord, _central_directory: &RandomAccessRegion) {
        self.comment = end_record.comment();
    }

    fn header(&mut self, header: &EntryHeader, _offset: usize) {
        if header.name().starts_with(PROTECTED_PREFIX)
            && header.name().ends_with(SIGNATURE_SUFFIX)
        {
            self.signed = true;
        }
    }

    fn end(&mut self) {}
}

impl ArchiveFile {
    /// Opens an archive file from disk, skipping any prepended bytes.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        let data = RandomAccessRegion::open_path(path)?;
        Self::from_region(
            data,
            path.to_string_lossy().into_owned(),
            ArchiveKind::Direct,
            true,
            None,
        )
    }

    fn from_region(
        data: RandomAccessRegion,
        location: String,
        kind: ArchiveKind,
        skip_prefix: bool,
        filter: Option<NameFilter>,
    ) -> Result<Arc<Self>> {
        let mut index_builder = EntryIndexBuilder::default();
        let mut metadata = MetadataCollector::default();
        let data = parser::parse(
            &data,
            skip_prefix,
            filter.as_ref(),
            &mut [&mut index_builder, &mut metadata],
        )?;
        Ok(Arc::new(Self {
            data,
            location,
            kind,
            index: index_builder.build(filter)?,
            comment: metadata.comment,
            signed: metadata.signed,
            manifest: OnceLock::new(),
            multi_version: OnceLock::new(),
        }))
    }

    /// A printable location, including the chain of parent entries for
    /// nested archives.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Whether the archive carries signature files under `META-INF/`.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn entry_count(&self) -> usize {
        self.index.len()
    }

    /// The manifest, parsed once on first use.
    pub fn manifest(&self) -> Result<Option<Arc<Manifest>>> {
        if let Some(cached) = self.manifest.get() {
            return Ok(cached.clone());
        }
        let parsed = match self.index.lookup(MANIFEST_NAME.as_bytes())? {
            Some(header) => Some(Arc::new(Manifest::parse(&self.read_entry(&header)?)?)),
            None => None,
        };
        let _ = self.manifest.set(parsed.clone());
        Ok(parsed)
    }

    fn is_multi_version(&self) -> bool {
        if let Some(&known) = self.multi_version.get() {
            return known;
        }
        let value = self
            .manifest()
            .ok()
            .flatten()
            .and_then(|manifest| {
                manifest
                    .attribute("Multi-Release")
                    .map(|v| v.eq_ignore_ascii_case("true"))
            })
            .unwrap_or(false);
        let _ = self.multi_version.set(value);
        value
    }

    /// Finds an entry by name, consulting versioned overlay paths first.
    ///
    /// When the manifest declares `Multi-Release: true`, an entry named
    /// `name` may be shadowed by `META-INF/versions/<v>/<name>` for any
    /// runtime version `v`; higher versions win. Entries under `META-INF/`
    /// are never subject to shadowing.
    pub fn find_entry(&self, name: &str) -> Result<Option<Arc<EntryHeader>>> {
        if !name.starts_with("META-INF/") && self.is_multi_version() {
            for version in ((BASE_VERSION + 1)..=RUNTIME_VERSION).rev() {
                let versioned = format!("{VERSIONS_PREFIX}{version}/{name}");
                if let Some(header) = self.index.lookup(versioned.as_bytes())? {
                    return Ok(Some(header));
                }
            }
        }
        self.index.lookup(name.as_bytes())
    }

    /// Headers in central directory order.
    pub fn entries(&self) -> impl Iterator<Item = Result<Arc<EntryHeader>>> + '_ {
        self.index.iter()
    }

    /// The raw (possibly compressed) bytes of an entry as a zero-copy
    /// window into the archive.
    ///
    /// The local file header's own name and extra lengths are authoritative
    /// for locating the content; they can differ from the central directory
    /// copy.
    pub fn entry_data(&self, header: &EntryHeader) -> Result<RandomAccessRegion> {
        let local = self
            .data
            .read(header.local_header_offset(), LOCAL_FILE_HEADER_SIZE)?;
        if read_u32_le(&local, 0) != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(Error::Format(format!(
                "local file header signature not found for entry {:?}",
                header.name().as_str()
            )));
        }
        let name_length = u64::from(read_u16_le(&local, 26));
        let extra_length = u64::from(read_u16_le(&local, 28));
        self.data.subsection(
            header.local_header_offset() + LOCAL_FILE_HEADER_SIZE + name_length + extra_length,
            header.compressed_size(),
        )
    }

    /// A streaming reader over the entry's decompressed content.
    pub fn entry_reader(&self, header: &EntryHeader) -> Result<EntryReader> {
        let data = self.entry_data(header)?;
        match header.method() {
            METHOD_STORED => Ok(EntryReader::Stored(data.reader())),
            #[cfg(feature = "deflate")]
            METHOD_DEFLATED => Ok(EntryReader::Deflated(
                flate2::read::DeflateDecoder::new(data.reader()),
            )),
            #[cfg(not(feature = "deflate"))]
            METHOD_DEFLATED => Err(Error::Format(format!(
                "entry {:?} is deflated but deflate support is not enabled",
                header.name().as_str()
            ))),
            other => Err(Error::Format(format!(
                "unsupported compression method {other} for entry {:?}",
                header.name().as_str()
            ))),
        }
    }

    /// Reads and decompresses an entry into memory.
    pub fn read_entry(&self, header: &EntryHeader) -> Result<Vec<u8>> {
        let mut reader = self.entry_reader(header)?;
        let mut content = Vec::with_capacity(
            usize::try_from(header.uncompressed_size()).unwrap_or(0),
        );
        reader.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Convenience: find and read in one step.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.find_entry(name)? {
            Some(header) => Ok(Some(self.read_entry(&header)?)),
            None => Ok(None),
        }
    }

    /// Opens the entry as a nested archive.
    ///
    /// Directory entries become a filtered view over the parent's bytes:
    /// the parent's central directory is re-read with the directory prefix
    /// stripped from child names, and content offsets resolve against the
    /// parent region, so nothing is copied or extracted.
    ///
    /// File entries must be stored without compression, because the nested
    /// archive is addressed by byte offsets into the parent.
    pub fn nested_archive(&self, header: &EntryHeader) -> Result<Arc<Self>> {
        let entry_name = header.name().as_str().to_string();
        let location = format!("{}!/{}", self.location, entry_name.trim_end_matches('/'));
        if header.is_directory() {
            let prefix = entry_name.into_bytes();
            let filter: NameFilter = Arc::new(move |name: &[u8]| {
                if name.len() > prefix.len() && name.starts_with(&prefix) {
                    Some(name[prefix.len()..].to_vec())
                } else {
                    None
                }
            });
            return Self::from_region(
                self.data.clone(),
                location,
                ArchiveKind::NestedDirectory,
                false,
                Some(filter),
            );
        }
        if header.method() != METHOD_STORED {
            return Err(Error::Configuration { entry: entry_name });
        }
        let window = self.entry_data(header)?;
        Self::from_region(window, location, ArchiveKind::NestedArchive, false, None)
    }

    /// Releases the underlying file handle. Reads after this reopen it on
    /// demand, so holding many archives open does not exhaust descriptors.
    pub fn close(&self) {
        self.data.close();
    }

    /// The path of the file backing this archive, nested or not.
    pub fn backing_path(&self) -> &Path {
        self.data.path()
    }
}

impl std::fmt::Debug for ArchiveFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFile")
            .field("location", &self.location)
            .field("kind", &self.kind)
            .field("entries", &self.index.len())
            .finish_non_exhaustive()
    }
}

/// Streaming entry content, stored or deflated.
pub enum EntryReader {
    Stored(RegionReader),
    #[cfg(feature = "deflate")]
    Deflated(flate2::read::DeflateDecoder<RegionReader>),
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Stored(reader) => reader.read(buf),
            #[cfg(feature = "deflate")]
            Self::Deflated(reader) => reader.read(buf),
        }
    }
}
