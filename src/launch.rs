//! Launch orchestration: component discovery and entry-point startup.
//!
//! A launcher inspects an application source, discovers its component
//! archives under the standard layout (`APP-INF/classes/` for application
//! code, `APP-INF/lib/` for bundled components), honors a build-time
//! classpath index when one is present, and hands a ready
//! [`ComponentLoader`] plus the resolved entry point to a caller-supplied
//! runner.

use std::fs;
use std::path::Path;

use crate::chain::ChainedAddress;
use crate::index::PathIndexFile;
use crate::loader::ComponentLoader;
use crate::source::{Archive, ExplodedArchive, PackageArchive};
use crate::{Error, Result};

/// Manifest attribute naming the entry-point artifact.
pub const ENTRY_POINT_ATTRIBUTE: &str = "Start-Entry";

/// Manifest attribute overriding the classpath index location.
pub const CLASSPATH_INDEX_ATTRIBUTE: &str = "Classpath-Index";

/// Where the classpath index lives unless the manifest says otherwise.
pub const DEFAULT_CLASSPATH_INDEX_LOCATION: &str = "APP-INF/classpath.idx";

const CLASSES_LOCATION: &str = "APP-INF/classes/";
const LIB_LOCATION: &str = "APP-INF/lib/";

/// Everything a runner needs to start the application.
pub struct LaunchContext {
    /// The entry-point artifact path from the manifest.
    pub entry_point: String,
    /// The entry-point artifact's content, resolved through the loader.
    pub artifact: Vec<u8>,
    /// Application arguments, passed through untouched.
    pub args: Vec<String>,
    /// The fully constructed component loader.
    pub loader: ComponentLoader,
}

/// Discovers components and launches the application they contain.
pub struct Launcher {
    archive: Box<dyn Archive>,
    index: Option<PathIndexFile>,
}

impl Launcher {
    /// Opens `path` as a packaged archive or an exploded directory,
    /// whichever it is on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::metadata(path)?.is_dir() {
            Self::from_exploded(path)
        } else {
            Self::from_package(path)
        }
    }

    pub fn from_package(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_archive(Box::new(PackageArchive::open_path(path)?))
    }

    pub fn from_exploded(root: impl AsRef<Path>) -> Result<Self> {
        Self::from_archive(Box::new(ExplodedArchive::new(root.as_ref())))
    }

    pub fn from_archive(archive: Box<dyn Archive>) -> Result<Self> {
        let index = Self::load_index(archive.as_ref())?;
        Ok(Self { archive, index })
    }

    fn load_index(archive: &dyn Archive) -> Result<Option<PathIndexFile>> {
        let location = match archive.manifest()? {
            Some(manifest) => manifest
                .attribute(CLASSPATH_INDEX_ATTRIBUTE)
                .unwrap_or(DEFAULT_CLASSPATH_INDEX_LOCATION)
                .to_string(),
            None => DEFAULT_CLASSPATH_INDEX_LOCATION.to_string(),
        };
        match archive.read(&location)? {
            Some(bytes) => Ok(Some(PathIndexFile::parse(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether the classpath index was found.
    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    /// An entry is a component when it is the application classes
    /// directory or a file bundled under the component library location.
    fn is_component_entry(name: &str, is_directory: bool) -> bool {
        if is_directory {
            name == CLASSES_LOCATION
        } else {
            name.starts_with(LIB_LOCATION)
        }
    }

    /// The launch classpath: discovered components in storage order with
    /// index-listed entries deferred to their declared index position.
    pub fn class_path(&self) -> Result<Vec<ChainedAddress>> {
        let mut addresses = Vec::new();
        for entry in self.archive.entries()? {
            if !Self::is_component_entry(&entry.name, entry.is_directory) {
                continue;
            }
            let indexed = self
                .index
                .as_ref()
                .is_some_and(|index| index.contains_entry(entry.name.trim_end_matches('/')));
            if indexed {
                continue;
            }
            addresses.push(self.archive.nested(&entry.name)?.address());
        }
        if let Some(index) = &self.index {
            for name in index.entries() {
                addresses.push(self.archive.nested(name)?.address());
            }
        }
        Ok(addresses)
    }

    /// Builds the component loader over [`Self::class_path`].
    pub fn build_loader(&self) -> Result<ComponentLoader> {
        ComponentLoader::new(self.class_path()?)
    }

    /// The entry-point artifact path declared in the manifest.
    pub fn entry_point(&self) -> Result<String> {
        let manifest = self.archive.manifest()?.ok_or_else(|| {
            Error::Launch(format!(
                "no manifest found in {}",
                self.archive.address()
            ))
        })?;
        manifest
            .attribute(ENTRY_POINT_ATTRIBUTE)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Launch(format!(
                    "no {ENTRY_POINT_ATTRIBUTE} attribute defined in {}",
                    self.archive.address()
                ))
            })
    }

    /// Builds the loader, resolves the entry-point artifact through it,
    /// and hands both to `runner`.
    pub fn launch<F>(&self, args: Vec<String>, runner: F) -> Result<()>
    where
        F: FnOnce(LaunchContext) -> Result<()>,
    {
        let entry_point = self.entry_point()?;
        let loader = self.build_loader()?;
        let artifact = loader.read_resource(&entry_point)?.ok_or_else(|| {
            Error::Launch(format!(
                "entry point {entry_point:?} not found in any component of {}",
                self.archive.address()
            ))
        })?;
        runner(LaunchContext {
            entry_point,
            artifact,
            args,
            loader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_entry_classification() {
        assert!(Launcher::is_component_entry("APP-INF/classes/", true));
        assert!(Launcher::is_component_entry("APP-INF/lib/a.pkg", false));
        assert!(!Launcher::is_component_entry("APP-INF/lib/", true));
        assert!(!Launcher::is_component_entry("APP-INF/classes/x.cmp", false));
        assert!(!Launcher::is_component_entry("META-INF/MANIFEST.MF", false));
    }
}
