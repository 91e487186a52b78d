//! End-of-central-directory location.
//!
//! The end record is found by scanning backward from end-of-file for the
//! signature position whose declared comment length makes the trailer size
//! consistent. The scan window starts small and grows up to the hard cap
//! implied by the maximum comment length, which rules out false positives
//! from archive comments that happen to contain the signature bytes.
//!
//! When the 16-bit entry count reads as the ZIP64 sentinel, the fixed
//! 20-byte locator immediately preceding the end record points at the
//! 56-byte ZIP64 end record, whose 64-bit offset/length/count replace the
//! 32-bit fields.

use crate::bytes::{read_u16_le, read_u32_le, read_u64_le};
use crate::data::RandomAccessRegion;
use crate::format::{END_RECORD_SIGNATURE, ZIP64_END_SIGNATURE, ZIP64_LOCATOR_SIGNATURE};
use crate::{Error, Result};

/// Minimum end record size: 22 bytes with an empty comment.
const MINIMUM_SIZE: usize = 22;

/// Hard cap on the trailer scan: 22 bytes plus the largest encodable
/// comment (0xFFFF bytes).
const MAXIMUM_SIZE: usize = MINIMUM_SIZE + 0xFFFF;

/// Entry-count value signalling that the ZIP64 end record is authoritative.
const ZIP64_MAGIC_COUNT: u16 = 0xFFFF;

/// Byte offset of the comment-length field within the end record.
const COMMENT_LENGTH_OFFSET: usize = 20;

/// Initial (and incremental) trailer read size.
const READ_BLOCK_SIZE: usize = 256;

/// Size of the ZIP64 end-of-central-directory locator.
const ZIP64_LOCATOR_SIZE: u64 = 20;

/// Fixed portion of the ZIP64 end-of-central-directory record.
const ZIP64_END_SIZE: u64 = 56;

/// The located end-of-central-directory record, with the ZIP64 extension
/// resolved when present.
pub(crate) struct EndRecord {
    block: Vec<u8>,
    offset: usize,
    size: usize,
    zip64: Option<Zip64End>,
}

impl EndRecord {
    /// Locates the end record by scanning the file trailer.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] if no consistent record exists within the maximum
    /// trailer window.
    pub(crate) fn find(data: &RandomAccessRegion) -> Result<Self> {
        let mut block = read_tail(data, READ_BLOCK_SIZE)?;
        let mut size = MINIMUM_SIZE;
        loop {
            if size > block.len() {
                if size >= MAXIMUM_SIZE || size as u64 > data.size() {
                    return Err(Error::Format(format!(
                        "unable to find end of central directory record after reading {size} bytes"
                    )));
                }
                block = read_tail(data, size + READ_BLOCK_SIZE)?;
            }
            let offset = block.len() - size;
            if is_valid(&block, offset, size) {
                let record_start = data.size() - size as u64;
                let zip64 = if read_u16_le(&block, offset + 10) == ZIP64_MAGIC_COUNT {
                    Some(Zip64End::read(data, record_start)?)
                } else {
                    None
                };
                return Ok(Self {
                    block,
                    offset,
                    size,
                    zip64,
                });
            }
            size += 1;
        }
    }

    /// Number of central directory records, taken from the ZIP64 end record
    /// when present.
    pub(crate) fn entry_count(&self) -> u64 {
        match &self.zip64 {
            Some(zip64) => zip64.entry_count,
            None => u64::from(read_u16_le(&self.block, self.offset + 10)),
        }
    }

    /// The archive comment, decoded lossily.
    pub(crate) fn comment(&self) -> String {
        let length = read_u16_le(&self.block, self.offset + COMMENT_LENGTH_OFFSET) as usize;
        let start = self.offset + COMMENT_LENGTH_OFFSET + 2;
        String::from_utf8_lossy(&self.block[start..start + length]).into_owned()
    }

    /// The central directory as a subsection of `data`.
    ///
    /// `data` must already have any prefix bytes stripped, because the
    /// declared directory offset is relative to the nominal archive start.
    pub(crate) fn central_directory(&self, data: &RandomAccessRegion) -> Result<RandomAccessRegion> {
        let (offset, length) = match &self.zip64 {
            Some(zip64) => (zip64.central_directory_offset, zip64.central_directory_length),
            None => (
                u64::from(read_u32_le(&self.block, self.offset + 16)),
                u64::from(read_u32_le(&self.block, self.offset + 12)),
            ),
        };
        data.subsection(offset, length)
    }

    /// Number of leading bytes preceding the nominal archive start.
    ///
    /// Derived by comparing the declared directory offset against the
    /// directory's actual computed position; self-extracting stubs and other
    /// prepended bytes show up as a positive difference, which all later
    /// offset math must skip.
    pub(crate) fn start_of_archive(&self, data: &RandomAccessRegion) -> Result<u64> {
        let (length, specified_offset) = match &self.zip64 {
            Some(zip64) => (zip64.central_directory_length, zip64.central_directory_offset),
            None => (
                u64::from(read_u32_le(&self.block, self.offset + 12)),
                u64::from(read_u32_le(&self.block, self.offset + 16)),
            ),
        };
        let (zip64_end_size, zip64_locator_size) = match &self.zip64 {
            Some(zip64) => (zip64.end_size, ZIP64_LOCATOR_SIZE),
            None => (0, 0),
        };
        let actual_offset = data
            .size()
            .checked_sub(self.size as u64)
            .and_then(|v| v.checked_sub(length))
            .and_then(|v| v.checked_sub(zip64_end_size))
            .and_then(|v| v.checked_sub(zip64_locator_size));
        match actual_offset.and_then(|actual| actual.checked_sub(specified_offset)) {
            Some(prefix) => Ok(prefix),
            None => Err(Error::Format(
                "central directory offset is inconsistent with file size".into(),
            )),
        }
    }
}

/// The ZIP64 extension: locator-derived position plus the 64-bit fields of
/// the extended end record.
struct Zip64End {
    central_directory_offset: u64,
    central_directory_length: u64,
    entry_count: u64,
    /// Distance from the ZIP64 end record to its locator, used by the
    /// prefix-skip computation.
    end_size: u64,
}

impl Zip64End {
    fn read(data: &RandomAccessRegion, end_record_start: u64) -> Result<Self> {
        let locator_start = end_record_start.checked_sub(ZIP64_LOCATOR_SIZE).ok_or_else(|| {
            Error::Format("ZIP64 entry count sentinel but no room for a locator record".into())
        })?;
        let locator = data.read(locator_start, ZIP64_LOCATOR_SIZE)?;
        if read_u32_le(&locator, 0) != ZIP64_LOCATOR_SIGNATURE {
            return Err(Error::Format(
                "ZIP64 locator signature not found before end record".into(),
            ));
        }
        let declared_offset = read_u64_le(&locator, 8);

        // The declared offset is relative to the nominal archive start, so
        // prefixed archives need the fallback position directly before the
        // locator (real writers emit no extensible data there).
        let end_start = if zip64_end_at(data, declared_offset)? {
            declared_offset
        } else {
            let fallback = locator_start.checked_sub(ZIP64_END_SIZE);
            match fallback {
                Some(start) if zip64_end_at(data, start)? => start,
                _ => {
                    return Err(Error::Format(
                        "ZIP64 end of central directory record not found".into(),
                    ));
                }
            }
        };

        let block = data.read(end_start, ZIP64_END_SIZE)?;
        Ok(Self {
            entry_count: read_u64_le(&block, 32),
            central_directory_length: read_u64_le(&block, 40),
            central_directory_offset: read_u64_le(&block, 48),
            end_size: locator_start - end_start,
        })
    }
}

fn zip64_end_at(data: &RandomAccessRegion, offset: u64) -> Result<bool> {
    if offset + 4 > data.size() {
        return Ok(false);
    }
    let signature = data.read(offset, 4)?;
    Ok(read_u32_le(&signature, 0) == ZIP64_END_SIGNATURE)
}

fn read_tail(data: &RandomAccessRegion, size: usize) -> Result<Vec<u8>> {
    let length = (size as u64).min(data.size());
    data.read(data.size() - length, length)
}

fn is_valid(block: &[u8], offset: usize, size: usize) -> bool {
    if block.len() < MINIMUM_SIZE || read_u32_le(block, offset) != END_RECORD_SIGNATURE {
        return false;
    }
    let comment_length = read_u16_le(block, offset + COMMENT_LENGTH_OFFSET) as usize;
    size == MINIMUM_SIZE + comment_length
}
