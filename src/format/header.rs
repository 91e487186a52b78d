//! Central directory file header decoding.
//!
//! Entry names are kept as raw bytes with an eagerly computed hash, so the
//! hash-sorted index can be built and searched without decoding every name
//! to UTF-8. Decoding happens lazily, once, when a caller actually needs
//! the string form.

use std::sync::OnceLock;

use crate::bytes::{read_u16_le, read_u32_le, read_u64_le};
use crate::format::{CENTRAL_FILE_HEADER_SIGNATURE, CENTRAL_FILE_HEADER_SIZE};
use crate::{Error, Result};

/// Extra-field id carrying 64-bit size/offset values.
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// 32-bit sentinel meaning the real value lives in the ZIP64 extra field.
const ZIP64_MAGIC: u32 = 0xFFFF_FFFF;

/// An entry name held as raw bytes, hashed up front and decoded on demand.
pub struct RawName {
    bytes: Vec<u8>,
    hash: u32,
    decoded: OnceLock<String>,
}

impl RawName {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        let hash = Self::hash_of(&bytes);
        Self {
            bytes,
            hash,
            decoded: OnceLock::new(),
        }
    }

    /// Multiplicative 31-based hash over the raw bytes, wrapping on
    /// overflow. Lookup keys use the same function so collisions are
    /// resolved by byte comparison, never by string comparison.
    pub(crate) fn hash_of(bytes: &[u8]) -> u32 {
        bytes
            .iter()
            .fold(0u32, |hash, &byte| hash.wrapping_mul(31).wrapping_add(u32::from(byte)))
    }

    /// Extends `hash` as if one more byte had been appended to the input.
    pub(crate) fn hash_with_suffix(hash: u32, suffix: u8) -> u32 {
        if suffix == 0 {
            hash
        } else {
            hash.wrapping_mul(31).wrapping_add(u32::from(suffix))
        }
    }

    pub(crate) fn hash(&self) -> u32 {
        self.hash
    }

    /// Byte-wise equality against `name`, with `suffix` treated as a
    /// virtual trailing byte when non-zero.
    pub(crate) fn matches(&self, name: &[u8], suffix: u8) -> bool {
        if suffix == 0 {
            return self.bytes == name;
        }
        self.bytes.len() == name.len() + 1
            && self.bytes.starts_with(name)
            && self.bytes[name.len()] == suffix
    }

    pub(crate) fn starts_with(&self, prefix: &[u8]) -> bool {
        self.bytes.starts_with(prefix)
    }

    pub(crate) fn ends_with(&self, suffix: &[u8]) -> bool {
        self.bytes.ends_with(suffix)
    }

    pub fn as_str(&self) -> &str {
        self.decoded
            .get_or_init(|| String::from_utf8_lossy(&self.bytes).into_owned())
    }
}

impl std::fmt::Debug for RawName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RawName").field(&self.as_str()).finish()
    }
}

/// A decoded central directory file header.
pub struct EntryHeader {
    name: RawName,
    method: u16,
    dos_time: u32,
    crc: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    local_header_offset: u64,
    comment: Vec<u8>,
}

impl EntryHeader {
    /// Decodes the header starting at `offset` within the central
    /// directory bytes, optionally rewriting the name through `filter`.
    ///
    /// Returns the decoded header (or `None` when the filter drops the
    /// entry) and the total encoded size including variable fields.
    pub(crate) fn decode(
        block: &[u8],
        offset: usize,
        filter: Option<&dyn Fn(&[u8]) -> Option<Vec<u8>>>,
    ) -> Result<(Option<Self>, usize)> {
        let fixed_end = offset + CENTRAL_FILE_HEADER_SIZE as usize;
        if fixed_end > block.len() {
            return Err(Error::Format(
                "central directory truncated within a file header".into(),
            ));
        }
        if read_u32_le(block, offset) != CENTRAL_FILE_HEADER_SIGNATURE {
            return Err(Error::Format(
                "central directory file header signature not found".into(),
            ));
        }
        let name_length = read_u16_le(block, offset + 28) as usize;
        let extra_length = read_u16_le(block, offset + 30) as usize;
        let comment_length = read_u16_le(block, offset + 32) as usize;
        let total = CENTRAL_FILE_HEADER_SIZE as usize + name_length + extra_length + comment_length;
        if offset + total > block.len() {
            return Err(Error::Format(
                "central directory truncated within a variable field".into(),
            ));
        }

        let name_bytes = &block[fixed_end..fixed_end + name_length];
        let name_bytes = match filter {
            Some(filter) => match filter(name_bytes) {
                Some(renamed) => renamed,
                None => return Ok((None, total)),
            },
            None => name_bytes.to_vec(),
        };

        let extra = &block[fixed_end + name_length..fixed_end + name_length + extra_length];
        let comment_start = fixed_end + name_length + extra_length;

        let mut compressed_size = u64::from(read_u32_le(block, offset + 20));
        let mut uncompressed_size = u64::from(read_u32_le(block, offset + 24));
        let mut local_header_offset = u64::from(read_u32_le(block, offset + 42));
        apply_zip64_extra(
            extra,
            &mut uncompressed_size,
            &mut compressed_size,
            &mut local_header_offset,
        )?;

        let header = Self {
            name: RawName::new(name_bytes),
            method: read_u16_le(block, offset + 10),
            dos_time: read_u32_le(block, offset + 12),
            crc: read_u32_le(block, offset + 16),
            compressed_size,
            uncompressed_size,
            local_header_offset,
            comment: block[comment_start..comment_start + comment_length].to_vec(),
        };
        Ok((Some(header), total))
    }

    pub fn name(&self) -> &RawName {
        &self.name
    }

    pub fn method(&self) -> u16 {
        self.method
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub(crate) fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with(b"/")
    }

    /// Modification time as seconds since the Unix epoch, with out-of-range
    /// MS-DOS date components clamped rather than rejected.
    pub fn unix_modified_time(&self) -> i64 {
        dos_to_unix(self.dos_time)
    }
}

impl std::fmt::Debug for EntryHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryHeader")
            .field("name", &self.name.as_str())
            .field("method", &self.method)
            .field("compressed_size", &self.compressed_size)
            .field("uncompressed_size", &self.uncompressed_size)
            .finish_non_exhaustive()
    }
}

fn apply_zip64_extra(
    extra: &[u8],
    uncompressed_size: &mut u64,
    compressed_size: &mut u64,
    local_header_offset: &mut u64,
) -> Result<()> {
    let mut cursor = 0;
    while cursor + 4 <= extra.len() {
        let id = read_u16_le(extra, cursor);
        let data_size = read_u16_le(extra, cursor + 2) as usize;
        let data_start = cursor + 4;
        if data_start + data_size > extra.len() {
            return Err(Error::Format("extra field extends past its block".into()));
        }
        if id == ZIP64_EXTRA_ID {
            // Fields appear in a fixed order, but only for the 32-bit
            // values that carried the sentinel.
            let mut field = data_start;
            for target in [uncompressed_size, compressed_size, local_header_offset] {
                if *target != u64::from(ZIP64_MAGIC) {
                    continue;
                }
                if field + 8 > data_start + data_size {
                    return Err(Error::Format("ZIP64 extra field too short".into()));
                }
                *target = read_u64_le(extra, field);
                field += 8;
            }
            return Ok(());
        }
        cursor = data_start + data_size;
    }
    Ok(())
}

/// Converts a packed MS-DOS date/time to Unix seconds, clamping each
/// component into its valid range instead of failing on writer bugs.
fn dos_to_unix(dos_time: u32) -> i64 {
    let year = 1980 + i64::from((dos_time >> 25) & 0x7F);
    let month = (((dos_time >> 21) & 0x0F) as i64).clamp(1, 12);
    let day = (((dos_time >> 16) & 0x1F) as i64).clamp(1, days_in_month(year, month));
    let hour = (((dos_time >> 11) & 0x1F) as i64).min(23);
    let minute = (((dos_time >> 5) & 0x3F) as i64).min(59);
    let second = ((i64::from(dos_time & 0x1F)) * 2).min(59);
    days_from_civil(year, month, day) * 86_400 + hour * 3_600 + minute * 60 + second
}

fn days_in_month(year: i64, month: i64) -> i64 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian civil date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let month_shifted = if month > 2 { month - 3 } else { month + 9 };
    let day_of_year = (153 * month_shifted + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::METHOD_STORED;

    fn raw_header(name: &[u8], extra: &[u8], comment: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&CENTRAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        bytes.extend_from_slice(&[20, 0, 20, 0]); // versions
        bytes.extend_from_slice(&[0, 0]); // flags
        bytes.extend_from_slice(&METHOD_STORED.to_le_bytes());
        bytes.extend_from_slice(&0x5000_2100u32.to_le_bytes()); // dos time
        bytes.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes()); // crc
        bytes.extend_from_slice(&11u32.to_le_bytes()); // compressed
        bytes.extend_from_slice(&11u32.to_le_bytes()); // uncompressed
        bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(comment.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&[0, 0]); // disk start
        bytes.extend_from_slice(&[0, 0]); // internal attributes
        bytes.extend_from_slice(&0u32.to_le_bytes()); // external attributes
        bytes.extend_from_slice(&64u32.to_le_bytes()); // local header offset
        bytes.extend_from_slice(name);
        bytes.extend_from_slice(extra);
        bytes.extend_from_slice(comment);
        bytes
    }

    #[test]
    fn test_decode_basic_fields() {
        let block = raw_header(b"lib/app.pkg", b"", b"note");
        let (header, consumed) = EntryHeader::decode(&block, 0, None).unwrap();
        let header = header.unwrap();
        assert_eq!(consumed, block.len());
        assert_eq!(header.name().as_str(), "lib/app.pkg");
        assert_eq!(header.method(), METHOD_STORED);
        assert_eq!(header.crc(), 0xDEAD_BEEF);
        assert_eq!(header.compressed_size(), 11);
        assert_eq!(header.local_header_offset(), 64);
        assert_eq!(header.comment(), b"note");
        assert!(!header.is_directory());
    }

    #[test]
    fn test_directory_detection() {
        let block = raw_header(b"lib/", b"", b"");
        let (header, _) = EntryHeader::decode(&block, 0, None).unwrap();
        assert!(header.unwrap().is_directory());
    }

    #[test]
    fn test_filter_can_drop_and_rename() {
        let block = raw_header(b"sub/inner.txt", b"", b"");
        let strip = |name: &[u8]| name.strip_prefix(b"sub/").map(<[u8]>::to_vec);
        let (header, _) = EntryHeader::decode(&block, 0, Some(&strip)).unwrap();
        assert_eq!(header.unwrap().name().as_str(), "inner.txt");

        let block = raw_header(b"other.txt", b"", b"");
        let (header, consumed) = EntryHeader::decode(&block, 0, Some(&strip)).unwrap();
        assert!(header.is_none());
        assert_eq!(consumed, block.len());
    }

    #[test]
    fn test_zip64_extra_field_overrides_sentinels() {
        let mut extra = Vec::new();
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&5_000_000_000u64.to_le_bytes()); // uncompressed
        extra.extend_from_slice(&4_999_999_000u64.to_le_bytes()); // compressed
        let mut block = raw_header(b"big.bin", &extra, b"");
        // Patch both size fields to the sentinel so the extra field wins.
        block[20..24].copy_from_slice(&ZIP64_MAGIC.to_le_bytes());
        block[24..28].copy_from_slice(&ZIP64_MAGIC.to_le_bytes());
        let (header, _) = EntryHeader::decode(&block, 0, None).unwrap();
        let header = header.unwrap();
        assert_eq!(header.uncompressed_size(), 5_000_000_000);
        assert_eq!(header.compressed_size(), 4_999_999_000);
        assert_eq!(header.local_header_offset(), 64);
    }

    #[test]
    fn test_bad_signature_is_a_format_error() {
        let mut block = raw_header(b"a", b"", b"");
        block[0] = 0;
        let err = EntryHeader::decode(&block, 0, None).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_truncated_header_is_a_format_error() {
        let block = raw_header(b"file.txt", b"", b"");
        let err = EntryHeader::decode(&block[..30], 0, None).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_hash_matches_suffix_extension() {
        let base = RawName::hash_of(b"lib");
        assert_eq!(RawName::hash_with_suffix(base, b'/'), RawName::hash_of(b"lib/"));
        assert_eq!(RawName::hash_with_suffix(base, 0), base);
    }

    #[test]
    fn test_raw_name_matches_with_virtual_suffix() {
        let name = RawName::new(b"docs/".to_vec());
        assert!(name.matches(b"docs/", 0));
        assert!(name.matches(b"docs", b'/'));
        assert!(!name.matches(b"docs", 0));
        assert!(!name.matches(b"dots", b'/'));
    }

    #[test]
    fn test_dos_time_clamping() {
        // Month 0 and day 0 clamp to 1; a real writer bug seen in the wild.
        let packed = 0u32 << 25; // 1980-00-00 00:00:00
        let header_time = dos_to_unix(packed);
        assert_eq!(header_time, days_from_civil(1980, 1, 1) * 86_400);
        // 1980-01-01 is 3652 days after the epoch (incl. leap days 1972/1976).
        assert_eq!(header_time, 3_652 * 86_400);
    }
}
