//! Application sources: packaged archives and exploded directories.
//!
//! Launch and discovery code works against the [`Archive`] trait so that an
//! application runs identically whether it ships as a single archive file
//! or as the same layout exploded onto disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::archive::unpack::{self, requires_unpack};
use crate::archive::ArchiveFile;
use crate::chain::ChainedAddress;
use crate::manifest::{Manifest, MANIFEST_NAME};
use crate::{Error, Result};

/// One entry of an application source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_directory: bool,
}

/// A source of application components and resources.
pub trait Archive: Send + Sync {
    /// The chained address of this source.
    fn address(&self) -> ChainedAddress;

    /// The source's manifest, if it has one.
    fn manifest(&self) -> Result<Option<Arc<Manifest>>>;

    /// All entries, in storage order.
    fn entries(&self) -> Result<Vec<ArchiveEntry>>;

    /// Reads a single entry's content.
    fn read(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Opens an entry as a nested source.
    fn nested(&self, entry_name: &str) -> Result<Box<dyn Archive>>;

    /// Whether this source is a directory tree rather than an archive file.
    fn is_exploded(&self) -> bool {
        false
    }
}

/// An application packaged as a single archive file.
pub struct PackageArchive {
    archive: Arc<ArchiveFile>,
    address: ChainedAddress,
    unpack_directory: Mutex<Option<Arc<TempDir>>>,
    /// Keeps a parent's temp directory alive while this archive, opened
    /// from an extracted file inside it, is still in use.
    _extracted_from: Option<Arc<TempDir>>,
}

impl PackageArchive {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self::wrap(
            ArchiveFile::open_path(path)?,
            ChainedAddress::from_root(path),
        ))
    }

    pub fn wrap(archive: Arc<ArchiveFile>, address: ChainedAddress) -> Self {
        Self {
            archive,
            address,
            unpack_directory: Mutex::new(None),
            _extracted_from: None,
        }
    }

    pub fn archive_file(&self) -> &Arc<ArchiveFile> {
        &self.archive
    }

    fn unpack_directory(&self) -> Result<Arc<TempDir>> {
        let mut slot = self.unpack_directory.lock().unwrap_or_else(|poisoned| {
            log::warn!("unpack directory mutex was poisoned; continuing with its state");
            poisoned.into_inner()
        });
        if let Some(directory) = slot.as_ref() {
            return Ok(Arc::clone(directory));
        }
        let directory = Arc::new(unpack::create_unpack_directory()?);
        *slot = Some(Arc::clone(&directory));
        Ok(directory)
    }
}

impl Archive for PackageArchive {
    fn address(&self) -> ChainedAddress {
        self.address.clone()
    }

    fn manifest(&self) -> Result<Option<Arc<Manifest>>> {
        self.archive.manifest()
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        self.archive
            .entries()
            .map(|header| {
                let header = header?;
                Ok(ArchiveEntry {
                    name: header.name().as_str().to_string(),
                    is_directory: header.is_directory(),
                })
            })
            .collect()
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.archive.read(name)
    }

    fn nested(&self, entry_name: &str) -> Result<Box<dyn Archive>> {
        let header = self.archive.find_entry(entry_name)?.ok_or_else(|| {
            Error::NotFound {
                path: self.address.join(entry_name).to_string(),
            }
        })?;
        if !header.is_directory() && requires_unpack(&header) {
            let directory = self.unpack_directory()?;
            let extracted = unpack::unpack_entry(&self.archive, &header, directory.path())?;
            return Ok(Box::new(Self {
                archive: ArchiveFile::open_path(&extracted)?,
                address: ChainedAddress::from_root(extracted),
                unpack_directory: Mutex::new(None),
                _extracted_from: Some(directory),
            }));
        }
        let nested = self.archive.nested_archive(&header)?;
        let address = self
            .address
            .join(header.name().as_str().trim_end_matches('/').to_string());
        Ok(Box::new(Self::wrap(nested, address)))
    }
}

/// An application exploded onto disk as a directory tree.
pub struct ExplodedArchive {
    root: PathBuf,
}

impl ExplodedArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect_entries(&self, directory: &Path, entries: &mut Vec<ArchiveEntry>) -> Result<()> {
        let mut children: Vec<_> = fs::read_dir(directory)?.collect::<std::io::Result<_>>()?;
        children.sort_by_key(std::fs::DirEntry::file_name);
        for child in children {
            let path = child.path();
            let relative = path
                .strip_prefix(&self.root)
                .map_err(|_| Error::Format("directory walk escaped its root".into()))?;
            let mut name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let is_directory = child.file_type()?.is_dir();
            if is_directory {
                name.push('/');
                entries.push(ArchiveEntry {
                    name,
                    is_directory,
                });
                self.collect_entries(&path, entries)?;
            } else {
                entries.push(ArchiveEntry {
                    name,
                    is_directory,
                });
            }
        }
        Ok(())
    }
}

impl Archive for ExplodedArchive {
    fn address(&self) -> ChainedAddress {
        ChainedAddress::from_root(&self.root)
    }

    fn manifest(&self) -> Result<Option<Arc<Manifest>>> {
        let path = self.root.join(MANIFEST_NAME);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Arc::new(Manifest::parse(&bytes)?))),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        self.collect_entries(&self.root, &mut entries)?;
        Ok(entries)
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.root.join(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn nested(&self, entry_name: &str) -> Result<Box<dyn Archive>> {
        let path = self.root.join(entry_name.trim_end_matches('/'));
        let metadata = fs::metadata(&path).map_err(|_| Error::NotFound {
            path: path.display().to_string(),
        })?;
        if metadata.is_dir() {
            Ok(Box::new(Self::new(path)))
        } else {
            Ok(Box::new(PackageArchive::open_path(path)?))
        }
    }

    fn is_exploded(&self) -> bool {
        true
    }
}
