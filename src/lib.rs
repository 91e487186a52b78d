//! Loader for self-contained executable archives.
//!
//! `nestarc` reads applications packaged as a single archive file that
//! bundles its own components: application code under `APP-INF/classes/`
//! and dependency archives under `APP-INF/lib/`. Everything works by
//! random access over the original file; nested archives are byte windows
//! or filtered views, never extracted copies (except entries explicitly
//! marked for unpacking at build time).
//!
//! # Layers
//!
//! * [`RandomAccessRegion`]: positioned reads over a file or a window of
//!   one, shareable across threads.
//! * [`ArchiveFile`]: central directory parsing, a hash-sorted entry
//!   index, entry content access, and nested archive materialization.
//! * [`ChainedAddress`]: `file!/entry!/entry` addresses, parsed purely
//!   and resolved against a process-wide root archive cache.
//! * [`Launcher`] and [`ComponentLoader`]: component discovery under the
//!   standard layout and ordered resource resolution across components.
//!
//! # Example
//!
//! ```no_run
//! use nestarc::{ChainedAddress, ResolveMode, Resolved};
//!
//! # fn main() -> nestarc::Result<()> {
//! let address = ChainedAddress::parse("app.arc!/APP-INF/lib/util.arc!/config.toml")?;
//! if let Resolved::Entry { archive, header } = address.resolve(ResolveMode::Exact)? {
//!     let content = archive.read_entry(&header)?;
//!     println!("{} bytes", content.len());
//! }
//! # Ok(())
//! # }
//! ```

mod bytes;
mod data;
mod error;
mod format;

pub mod archive;
pub mod chain;
pub mod index;
pub mod launch;
pub mod loader;
pub mod manifest;
pub mod source;

pub use archive::{ArchiveFile, ArchiveKind, EntryReader};
pub use chain::{clear_root_cache, ChainedAddress, ResolveMode, Resolved, SEPARATOR};
pub use data::{RandomAccessRegion, RegionReader};
pub use error::{Error, Result};
pub use format::header::{EntryHeader, RawName};
pub use index::PathIndexFile;
pub use launch::{LaunchContext, Launcher};
pub use loader::ComponentLoader;
pub use manifest::Manifest;
pub use source::{Archive, ArchiveEntry, ExplodedArchive, PackageArchive};
