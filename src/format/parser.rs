//! Single-pass central directory parsing.
//!
//! The parser walks the central directory exactly once and feeds each
//! decoded header to every registered visitor, so the entry index and any
//! side analyses (signature-file detection, nested-view rebuilds) are built
//! from the same pass.

use crate::data::RandomAccessRegion;
use crate::format::end_record::EndRecord;
use crate::format::header::EntryHeader;
use crate::{Error, Result};

/// Receives central directory events during a parse pass.
pub(crate) trait DirectoryVisitor {
    /// Called once before any headers, with the located end record and the
    /// central directory region.
    fn start(&mut self, end_record: &EndRecord, central_directory: &RandomAccessRegion);

    /// Called for each decoded header. `offset` is the header's byte
    /// position within the central directory.
    fn header(&mut self, header: &EntryHeader, offset: usize);

    /// Called once after the last header.
    fn end(&mut self);
}

/// Name-rewriting filter used when re-parsing a directory as a nested view.
pub(crate) type NameFilter = std::sync::Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// Parses the central directory of `data`, invoking each visitor for every
/// record, and returns `data` with any prepended prefix bytes stripped.
///
/// `skip_prefix` is true for outer files, which may carry a launcher stub or
/// other leading bytes; nested views are already positioned exactly.
pub(crate) fn parse(
    data: &RandomAccessRegion,
    skip_prefix: bool,
    filter: Option<&NameFilter>,
    visitors: &mut [&mut dyn DirectoryVisitor],
) -> Result<RandomAccessRegion> {
    let end_record = EndRecord::find(data)?;
    let data = if skip_prefix {
        let prefix = end_record.start_of_archive(data)?;
        data.subsection(prefix, data.size() - prefix)?
    } else {
        data.clone()
    };
    let central_directory = end_record.central_directory(&data)?;
    let block = central_directory.read_all()?;

    for visitor in visitors.iter_mut() {
        visitor.start(&end_record, &central_directory);
    }
    let mut offset = 0usize;
    for _ in 0..end_record.entry_count() {
        let filter = filter.map(|f| f.as_ref() as &dyn Fn(&[u8]) -> Option<Vec<u8>>);
        let (header, consumed) = EntryHeader::decode(&block, offset, filter)?;
        if let Some(header) = header {
            for visitor in visitors.iter_mut() {
                visitor.header(&header, offset);
            }
        }
        offset = offset.checked_add(consumed).ok_or_else(|| {
            Error::Format("central directory offset overflow".into())
        })?;
    }
    for visitor in visitors.iter_mut() {
        visitor.end();
    }
    Ok(data)
}
