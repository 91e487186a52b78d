//! ZIP/ZIP64 wire-format parsing.
//!
//! Everything in this module reads the packaged archive structures
//! bit-exactly: the end-of-central-directory record (with its ZIP64
//! locator and end record), the 46-byte central-directory file headers,
//! and the streaming directory parse that feeds the entry index.
//!
//! Entry *data* is deliberately out of scope here; decompression lives
//! behind the archive facade.

pub(crate) mod end_record;
pub(crate) mod header;
pub(crate) mod parser;

/// "PK\x01\x02" central directory file header signature.
pub(crate) const CENTRAL_FILE_HEADER_SIGNATURE: u32 = 0x0201_4B50;

/// "PK\x03\x04" local file header signature.
pub(crate) const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4B50;

/// "PK\x05\x06" end of central directory signature.
pub(crate) const END_RECORD_SIGNATURE: u32 = 0x0605_4B50;

/// "PK\x06\x06" ZIP64 end of central directory signature.
pub(crate) const ZIP64_END_SIGNATURE: u32 = 0x0606_4B50;

/// "PK\x06\x07" ZIP64 end of central directory locator signature.
pub(crate) const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4B50;

/// Fixed size of a central directory file header, before the variable
/// name/extra/comment spans.
pub(crate) const CENTRAL_FILE_HEADER_SIZE: u64 = 46;

/// Fixed size of a local file header, before the name/extra spans.
pub(crate) const LOCAL_FILE_HEADER_SIZE: u64 = 30;

/// Compression method: stored (no compression).
pub(crate) const METHOD_STORED: u16 = 0;

/// Compression method: deflate.
pub(crate) const METHOD_DEFLATED: u16 = 8;
