//! Chained archive addresses and their resolution.
//!
//! An address names a file on disk plus a chain of entry names separated by
//! `!/`, each step descending into a nested archive: `app.arc!/lib/x.arc!/
//! data/config.toml`. Parsing is pure; resolution opens and caches the root
//! archive, then walks the chain.
//!
//! Resolution runs in one of two modes. [`ResolveMode::Exact`] reports
//! missing steps as descriptive [`Error::NotFound`] values. Resource
//! scanning probes many addresses that are expected to miss, so
//! [`ResolveMode::Probe`] reports misses as the allocation-free
//! [`Error::Absent`] sentinel instead.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;

use crate::archive::ArchiveFile;
use crate::format::header::EntryHeader;
use crate::{Error, Result};

/// Separator between chain steps.
pub const SEPARATOR: &str = "!/";

/// Root archives kept open across resolutions.
const ROOT_CACHE_CAPACITY: usize = 16;

/// How resolution reports a missing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Misses become [`Error::NotFound`] with the full address.
    Exact,
    /// Misses become the cheap [`Error::Absent`] sentinel.
    Probe,
}

/// What an address resolved to.
#[derive(Debug)]
pub enum Resolved {
    /// The address ended at an archive (trailing separator or a nested
    /// archive entry chain step).
    Archive(Arc<ArchiveFile>),
    /// The address ended at an ordinary entry.
    Entry {
        archive: Arc<ArchiveFile>,
        header: Arc<EntryHeader>,
    },
}

/// A parsed chained address: a root file and the entry names to descend
/// through.
#[derive(Debug, Clone)]
pub struct ChainedAddress {
    root: PathBuf,
    segments: Vec<String>,
}

impl ChainedAddress {
    /// Parses `address` without touching the filesystem.
    pub fn parse(address: &str) -> Result<Self> {
        let mut parts = address.split(SEPARATOR);
        let root = parts.next().unwrap_or_default();
        if root.is_empty() {
            return Err(Error::Address {
                address: address.to_string(),
                reason: "empty root path".to_string(),
            });
        }
        let segments: Vec<String> = parts.map(str::to_string).collect();
        Ok(Self {
            root: PathBuf::from(root),
            segments,
        })
    }

    /// An address pointing directly at a file on disk.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns a copy extended with one more chain step.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut extended = self.clone();
        // A trailing empty segment marks "the archive itself"; descending
        // replaces it.
        if extended.segments.last().is_some_and(String::is_empty) {
            extended.segments.pop();
        }
        extended.segments.push(segment.into());
        extended
    }

    /// Resolves the address, opening the root through the process-wide
    /// cache and descending through nested archives.
    pub fn resolve(&self, mode: ResolveMode) -> Result<Resolved> {
        let mut archive = root_archive(&self.root, mode)?;
        let Some((last, nested_steps)) = self.segments.split_last() else {
            return Ok(Resolved::Archive(archive));
        };
        for step in nested_steps {
            let header = self.find_step(&archive, step, mode)?;
            archive = archive
                .nested_archive(&header)
                .map_err(|error| error.with_entry_context(&self.to_string(), step))?;
        }
        if last.is_empty() {
            return Ok(Resolved::Archive(archive));
        }
        let header = self.find_step(&archive, &normalize_steps(last), mode)?;
        Ok(Resolved::Entry { archive, header })
    }

    /// Resolves an address that must end at an archive, descending into the
    /// final entry when the chain does not end with a separator.
    pub fn resolve_archive(&self, mode: ResolveMode) -> Result<Arc<ArchiveFile>> {
        match self.resolve(mode)? {
            Resolved::Archive(archive) => Ok(archive),
            Resolved::Entry { archive, header } => {
                let entry = header.name().as_str().to_string();
                archive
                    .nested_archive(&header)
                    .map_err(|error| error.with_entry_context(&self.to_string(), &entry))
            }
        }
    }

    fn find_step(
        &self,
        archive: &ArchiveFile,
        step: &str,
        mode: ResolveMode,
    ) -> Result<Arc<EntryHeader>> {
        match archive.find_entry(step)? {
            Some(header) => Ok(header),
            None => Err(self.miss(mode)),
        }
    }

    fn miss(&self, mode: ResolveMode) -> Error {
        match mode {
            ResolveMode::Exact => Error::NotFound {
                path: self.to_string(),
            },
            ResolveMode::Probe => Error::Absent,
        }
    }
}

impl std::fmt::Display for ChainedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root.display())?;
        for segment in &self.segments {
            write!(f, "{SEPARATOR}{segment}")?;
        }
        Ok(())
    }
}

/// Two addresses are equal when they reach the same content: roots compare
/// by path components and the final step compares after relative-step
/// normalization, so `a/./b` and `a/b` address the same entry.
impl PartialEq for ChainedAddress {
    fn eq(&self, other: &Self) -> bool {
        if self.root.components().ne(other.root.components()) {
            return false;
        }
        if self.segments.len() != other.segments.len() {
            return false;
        }
        let Some((last, init)) = self.segments.split_last() else {
            return true;
        };
        let (other_last, other_init) = match other.segments.split_last() {
            Some(split) => split,
            None => return false,
        };
        init == other_init && normalize_steps(last) == normalize_steps(other_last)
    }
}

impl Eq for ChainedAddress {}

/// Collapses `.` and `..` path steps within a segment. Only the final chain
/// step is user-assembled and worth normalizing; earlier steps come from
/// directory listings and are already canonical.
fn normalize_steps(segment: &str) -> String {
    if !segment.contains("/.") && !segment.starts_with('.') {
        return segment.to_string();
    }
    let mut parts: Vec<&str> = Vec::new();
    for part in segment.split('/') {
        match part {
            "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn root_cache() -> &'static Mutex<LruCache<PathBuf, Arc<ArchiveFile>>> {
    static CACHE: OnceLock<Mutex<LruCache<PathBuf, Arc<ArchiveFile>>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(ROOT_CACHE_CAPACITY).unwrap(),
        ))
    })
}

fn root_archive(path: &Path, mode: ResolveMode) -> Result<Arc<ArchiveFile>> {
    let canonical = match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(match mode {
                ResolveMode::Exact => Error::NotFound {
                    path: path.display().to_string(),
                },
                ResolveMode::Probe => Error::Absent,
            });
        }
        Err(error) => return Err(error.into()),
    };
    let mut cache = lock_recovering(root_cache());
    if let Some(archive) = cache.get(&canonical) {
        return Ok(Arc::clone(archive));
    }
    drop(cache);
    let archive = ArchiveFile::open_path(&canonical)?;
    let mut cache = lock_recovering(root_cache());
    cache.put(canonical, Arc::clone(&archive));
    Ok(archive)
}

/// Drops every cached root archive, releasing their file handles once no
/// other references remain.
pub fn clear_root_cache() {
    lock_recovering(root_cache()).clear();
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("root archive cache mutex was poisoned; continuing with its state");
        poisoned.into_inner()
    })
}
