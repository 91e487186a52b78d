//! Random-access byte regions over a lazily opened file.
//!
//! A [`RandomAccessRegion`] is an immutable `(owner, offset, length)` view
//! over a seekable file. Subsectioning produces a new view over the same
//! owner without copying or touching the file, which is what makes stored
//! nested archives addressable as zero-copy byte windows.
//!
//! All reads against one underlying file are serialized through a single
//! mutex: seek-then-read is not atomic on a shared handle, so concurrent
//! readers of the same file must take turns. Readers of *different* files
//! proceed in parallel.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::{Error, Result};

/// Shared, access-serialized handle to one underlying file.
///
/// The file is opened on first read, not on construction, and every
/// seek+read sequence holds the handle mutex for its full duration.
pub(crate) struct FileAccess {
    path: PathBuf,
    length: u64,
    file: Mutex<Option<File>>,
}

impl FileAccess {
    /// Creates an access handle for `path` without opening it.
    ///
    /// Only the file length is captured up front; the handle itself is
    /// opened lazily by the first read.
    pub(crate) fn new(path: &Path) -> Result<Arc<Self>> {
        let length = std::fs::metadata(path)?.len();
        Ok(Arc::new(Self {
            path: path.to_path_buf(),
            length,
            file: Mutex::new(None),
        }))
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn length(&self) -> u64 {
        self.length
    }

    /// Reads `buf.len()` bytes at the absolute file offset `position`.
    fn read_at(&self, position: u64, buf: &mut [u8]) -> Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(|poisoned| {
            log::warn!("file access mutex was poisoned, recovering");
            poisoned.into_inner()
        });
        let file = match guard.as_mut() {
            Some(file) => file,
            None => {
                let opened = File::open(&self.path)?;
                guard.insert(opened)
            }
        };
        file.seek(SeekFrom::Start(position))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Drops the open handle, if any. Subsequent reads reopen the file.
    pub(crate) fn close(&self) {
        let mut guard = self.file.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }
}

/// An immutable byte-range view over a shared underlying file.
///
/// Offsets inside a region are relative to the region start; the absolute
/// file offset is tracked internally and always relative to the root file,
/// never to a nested package boundary.
#[derive(Clone)]
pub struct RandomAccessRegion {
    access: Arc<FileAccess>,
    offset: u64,
    length: u64,
}

impl RandomAccessRegion {
    /// Creates a region spanning the whole of `path`.
    ///
    /// The file is not opened until the first read.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let access = FileAccess::new(path.as_ref())?;
        let length = access.length();
        Ok(Self {
            access,
            offset: 0,
            length,
        })
    }

    /// The number of bytes visible through this region.
    pub fn size(&self) -> u64 {
        self.length
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        self.access.path()
    }

    /// Reads `length` bytes starting at `offset` (relative to this region).
    ///
    /// # Errors
    ///
    /// [`Error::Bounds`] if `offset` is beyond the region end;
    /// [`Error::Truncated`] if the range starts inside but runs past it.
    pub fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>> {
        if offset > self.length {
            return Err(Error::Bounds {
                offset,
                length,
                available: self.length,
            });
        }
        if length > self.length - offset {
            return Err(Error::Truncated {
                offset,
                length,
                available: self.length,
            });
        }
        let mut buf = vec![0u8; length as usize];
        self.access.read_at(self.offset + offset, &mut buf)?;
        Ok(buf)
    }

    /// Reads the entire region.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.read(0, self.length)
    }

    /// Returns a new region referencing the same owner with adjusted
    /// bounds. Performs no I/O and no copy.
    ///
    /// Bounds are checked against this region, not the file, so subsections
    /// compose strictly: a subsection of a subsection stays within its
    /// parent's window.
    pub fn subsection(&self, offset: u64, length: u64) -> Result<Self> {
        if offset.checked_add(length).is_none() || offset + length > self.length {
            return Err(Error::Bounds {
                offset,
                length,
                available: self.length,
            });
        }
        Ok(Self {
            access: Arc::clone(&self.access),
            offset: self.offset + offset,
            length,
        })
    }

    /// Returns a cursor-style [`io::Read`] over this region.
    ///
    /// Each `read` call performs one locked positioned read against the
    /// shared handle, so multiple readers over the same file interleave
    /// safely.
    pub fn reader(&self) -> RegionReader {
        RegionReader {
            region: self.clone(),
            position: 0,
        }
    }

    /// Closes the underlying file handle.
    ///
    /// Safe to call while sibling regions exist: the handle reopens
    /// transparently on their next read.
    pub fn close(&self) {
        self.access.close();
    }
}

impl std::fmt::Debug for RandomAccessRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomAccessRegion")
            .field("path", &self.access.path())
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}

/// Sequential reader over a [`RandomAccessRegion`].
pub struct RegionReader {
    region: RandomAccessRegion,
    position: u64,
}

impl Read for RegionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.region.size().saturating_sub(self.position);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let take = remaining.min(buf.len() as u64);
        let bytes = self
            .region
            .read(self.position, take)
            .map_err(io::Error::other)?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        self.position += take;
        Ok(take as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn region_over(bytes: &[u8]) -> (tempfile::NamedTempFile, RandomAccessRegion) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        let region = RandomAccessRegion::open_path(file.path()).unwrap();
        (file, region)
    }

    #[test]
    fn test_read_ranges() {
        let (_file, region) = region_over(b"0123456789");
        assert_eq!(region.size(), 10);
        assert_eq!(region.read(0, 10).unwrap(), b"0123456789");
        assert_eq!(region.read(3, 4).unwrap(), b"3456");
        assert_eq!(region.read(10, 0).unwrap(), b"");
    }

    #[test]
    fn test_read_out_of_range() {
        let (_file, region) = region_over(b"0123456789");
        assert!(matches!(
            region.read(11, 1),
            Err(Error::Bounds { available: 10, .. })
        ));
        assert!(matches!(
            region.read(8, 5),
            Err(Error::Truncated { available: 10, .. })
        ));
    }

    #[test]
    fn test_subsection_composes() {
        let (_file, region) = region_over(b"0123456789");
        let sub = region.subsection(2, 6).unwrap();
        assert_eq!(sub.size(), 6);
        assert_eq!(sub.read_all().unwrap(), b"234567");

        let subsub = sub.subsection(1, 3).unwrap();
        assert_eq!(subsub.read_all().unwrap(), b"345");

        // Bounds are relative to the parent window, not the file
        assert!(sub.subsection(5, 2).is_err());
        assert!(sub.subsection(0, 7).is_err());
    }

    #[test]
    fn test_subsection_performs_no_io() {
        let (file, region) = region_over(b"0123456789");
        let sub = region.subsection(0, 5).unwrap();
        // Deleting the file after subsectioning only breaks reads, proving
        // the subsection itself never touched the file
        region.close();
        std::fs::remove_file(file.path()).unwrap();
        assert!(sub.read(0, 1).is_err());
    }

    #[test]
    fn test_reader_streams_whole_region() {
        let (_file, region) = region_over(b"hello archive world");
        let sub = region.subsection(6, 7).unwrap();
        let mut out = String::new();
        sub.reader().read_to_string(&mut out).unwrap();
        assert_eq!(out, "archive");
    }

    #[test]
    fn test_close_then_reopen() {
        let (_file, region) = region_over(b"persistent");
        assert_eq!(region.read(0, 4).unwrap(), b"pers");
        region.close();
        assert_eq!(region.read(4, 6).unwrap(), b"istent");
    }

    #[test]
    fn test_concurrent_reads_share_one_handle() {
        let (_file, region) = region_over(b"abcdefghijklmnopqrstuvwxyz");
        let region = Arc::new(region);
        let mut handles = Vec::new();
        for i in 0..8u64 {
            let region = Arc::clone(&region);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    let bytes = region.read(i, 3).unwrap();
                    assert_eq!(bytes.len(), 3);
                    assert_eq!(bytes[0], b'a' + i as u8);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
