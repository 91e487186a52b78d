//! Hash-sorted entry index with an LRU header cache.
//!
//! The index keeps two parallel arrays per entry (name hash and central
//! directory offset) sorted by hash, so lookup is a binary search plus a
//! short scan over equal hashes. Full headers are re-decoded from the
//! central directory on demand and kept in a small LRU cache, which bounds
//! memory for archives with tens of thousands of entries while keeping
//! repeated lookups of hot entries cheap.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::data::RandomAccessRegion;
use crate::format::end_record::EndRecord;
use crate::format::header::{EntryHeader, RawName};
use crate::format::parser::{DirectoryVisitor, NameFilter};
use crate::format::CENTRAL_FILE_HEADER_SIZE;
use crate::bytes::read_u16_le;
use crate::{Error, Result};

/// Number of decoded headers kept hot.
const HEADER_CACHE_CAPACITY: usize = 25;

/// Collects entry positions during the central directory pass.
#[derive(Default)]
pub(crate) struct EntryIndexBuilder {
    central_directory: Option<RandomAccessRegion>,
    hashes: Vec<u32>,
    directory_offsets: Vec<u64>,
}

impl DirectoryVisitor for EntryIndexBuilder {
    fn start(&mut self, end_record: &EndRecord, central_directory: &RandomAccessRegion) {
        let count = usize::try_from(end_record.entry_count()).unwrap_or(usize::MAX);
        self.hashes = Vec::with_capacity(count.min(1 << 16));
        self.directory_offsets = Vec::with_capacity(count.min(1 << 16));
        self.central_directory = Some(central_directory.clone());
    }

    fn header(&mut self, header: &EntryHeader, offset: usize) {
        self.hashes.push(header.name().hash());
        // ZIP64 central directories can pass 4 GiB, so offsets stay 64-bit.
        self.directory_offsets.push(offset as u64);
    }

    fn end(&mut self) {}
}

impl EntryIndexBuilder {
    pub(crate) fn build(self, filter: Option<NameFilter>) -> Result<EntryIndex> {
        let central_directory = self
            .central_directory
            .ok_or_else(|| Error::Format("central directory was never visited".into()))?;
        let count = self.hashes.len();

        // Sort by hash through a permutation so the two parallel arrays
        // stay in step, and invert it to preserve insertion order for
        // iteration.
        let mut permutation: Vec<u32> = (0..count as u32).collect();
        permutation.sort_by_key(|&i| self.hashes[i as usize]);
        let hashes = permutation.iter().map(|&i| self.hashes[i as usize]).collect();
        let directory_offsets = permutation
            .iter()
            .map(|&i| self.directory_offsets[i as usize])
            .collect();
        let mut positions = vec![0u32; count];
        for (sorted, &insertion) in permutation.iter().enumerate() {
            positions[insertion as usize] = sorted as u32;
        }

        Ok(EntryIndex {
            central_directory,
            hashes,
            directory_offsets,
            positions,
            filter,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(HEADER_CACHE_CAPACITY).unwrap(),
            )),
        })
    }
}

/// The searchable index over an archive's central directory.
pub(crate) struct EntryIndex {
    central_directory: RandomAccessRegion,
    hashes: Vec<u32>,
    directory_offsets: Vec<u64>,
    positions: Vec<u32>,
    filter: Option<NameFilter>,
    cache: Mutex<LruCache<usize, Arc<EntryHeader>>>,
}

impl EntryIndex {
    pub(crate) fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Looks up `name`, then `name` with a trailing slash, so directory
    /// entries resolve whether or not the caller appended the separator.
    pub(crate) fn lookup(&self, name: &[u8]) -> Result<Option<Arc<EntryHeader>>> {
        if let Some(found) = self.lookup_exact(name, 0)? {
            return Ok(Some(found));
        }
        if name.last() != Some(&b'/') {
            return self.lookup_exact(name, b'/');
        }
        Ok(None)
    }

    fn lookup_exact(&self, name: &[u8], suffix: u8) -> Result<Option<Arc<EntryHeader>>> {
        let hash = RawName::hash_with_suffix(RawName::hash_of(name), suffix);
        let mut index = self.hashes.partition_point(|&h| h < hash);
        while index < self.hashes.len() && self.hashes[index] == hash {
            let header = self.header_at(index)?;
            if header.name().matches(name, suffix) {
                return Ok(Some(header));
            }
            index += 1;
        }
        Ok(None)
    }

    /// Headers in the order they appear in the central directory.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Result<Arc<EntryHeader>>> + '_ {
        self.positions
            .iter()
            .map(move |&sorted| self.header_at(sorted as usize))
    }

    fn header_at(&self, sorted_index: usize) -> Result<Arc<EntryHeader>> {
        {
            let mut cache = lock_recovering(&self.cache);
            if let Some(header) = cache.get(&sorted_index) {
                return Ok(Arc::clone(header));
            }
        }
        let header = Arc::new(self.decode_at(sorted_index)?);
        let mut cache = lock_recovering(&self.cache);
        cache.put(sorted_index, Arc::clone(&header));
        Ok(header)
    }

    fn decode_at(&self, sorted_index: usize) -> Result<EntryHeader> {
        let offset = self.directory_offsets[sorted_index];
        let fixed = self.central_directory.read(offset, CENTRAL_FILE_HEADER_SIZE)?;
        let variable = u64::from(read_u16_le(&fixed, 28))
            + u64::from(read_u16_le(&fixed, 30))
            + u64::from(read_u16_le(&fixed, 32));
        let block = self
            .central_directory
            .read(offset, CENTRAL_FILE_HEADER_SIZE + variable)?;
        let filter = self
            .filter
            .as_ref()
            .map(|f| f.as_ref() as &dyn Fn(&[u8]) -> Option<Vec<u8>>);
        match EntryHeader::decode(&block, 0, filter)? {
            (Some(header), _) => Ok(header),
            (None, _) => Err(Error::Format(
                "indexed entry was rejected by the name filter on re-read".into(),
            )),
        }
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("entry header cache mutex was poisoned; continuing with its state");
        poisoned.into_inner()
    })
}
