//! Resource resolution across an ordered set of launch components.
//!
//! A [`ComponentLoader`] holds the launch classpath as resolved components
//! and answers resource lookups by scanning them in order, so earlier
//! components shadow later ones. A component is usually a nested archive,
//! but exploded applications contribute plain directories. Namespace
//! bookkeeping mirrors what a delegating loader needs: the parent path of
//! every served resource is recorded once, and concurrent duplicate
//! definitions are a benign no-op.

use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::archive::ArchiveFile;
use crate::chain::{ChainedAddress, ResolveMode};
use crate::Result;

enum Location {
    Archive {
        address: ChainedAddress,
        archive: Arc<ArchiveFile>,
    },
    Directory {
        address: ChainedAddress,
        root: PathBuf,
    },
}

impl Location {
    fn resolve(address: ChainedAddress) -> Result<Self> {
        if address.segments().is_empty() && address.root().is_dir() {
            let root = address.root().to_path_buf();
            return Ok(Self::Directory { address, root });
        }
        let archive = address.resolve_archive(ResolveMode::Exact)?;
        Ok(Self::Archive { address, archive })
    }

    fn address(&self) -> &ChainedAddress {
        match self {
            Self::Archive { address, .. } | Self::Directory { address, .. } => address,
        }
    }

    fn contains(&self, name: &str) -> Result<bool> {
        match self {
            Self::Archive { archive, .. } => Ok(archive.find_entry(name)?.is_some()),
            Self::Directory { root, .. } => Ok(root.join(name).is_file()),
        }
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Archive { archive, .. } => archive.read(name),
            Self::Directory { root, .. } => match fs::read(root.join(name)) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(error) => Err(error.into()),
            },
        }
    }

    fn open(&self, name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        match self {
            Self::Archive { archive, .. } => match archive.find_entry(name)? {
                Some(header) => Ok(Some(Box::new(archive.entry_reader(&header)?))),
                None => Ok(None),
            },
            Self::Directory { root, .. } => match fs::File::open(root.join(name)) {
                Ok(file) => Ok(Some(Box::new(file))),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(error) => Err(error.into()),
            },
        }
    }
}

/// An ordered, shareable view over the components of a launch.
pub struct ComponentLoader {
    locations: Vec<Location>,
    namespaces: Mutex<HashSet<String>>,
}

impl ComponentLoader {
    /// Resolves every search path entry up front, so lookups never pay for
    /// archive opening and misconfigured paths fail at construction.
    pub fn new(search_path: Vec<ChainedAddress>) -> Result<Self> {
        let locations = search_path
            .into_iter()
            .map(Location::resolve)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            locations,
            namespaces: Mutex::new(HashSet::new()),
        })
    }

    /// Addresses of the components, in search order.
    pub fn locations(&self) -> impl Iterator<Item = &ChainedAddress> {
        self.locations.iter().map(Location::address)
    }

    /// Finds the first component containing `name` and returns the
    /// resource's full chained address.
    pub fn find_resource(&self, name: &str) -> Result<Option<ChainedAddress>> {
        for location in &self.locations {
            if location.contains(name)? {
                self.define_namespace(name);
                return Ok(Some(location.address().join(name)));
            }
        }
        Ok(None)
    }

    /// Every component's address for `name`, in search order.
    pub fn find_resources(&self, name: &str) -> Result<Vec<ChainedAddress>> {
        let mut found = Vec::new();
        for location in &self.locations {
            if location.contains(name)? {
                found.push(location.address().join(name));
            }
        }
        if !found.is_empty() {
            self.define_namespace(name);
        }
        Ok(found)
    }

    /// Reads the first matching resource into memory.
    pub fn read_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        for location in &self.locations {
            if let Some(content) = location.read(name)? {
                self.define_namespace(name);
                return Ok(Some(content));
            }
        }
        Ok(None)
    }

    /// Opens the first matching resource as a streaming reader.
    pub fn open_resource(&self, name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        for location in &self.locations {
            if let Some(reader) = location.open(name)? {
                self.define_namespace(name);
                return Ok(Some(reader));
            }
        }
        Ok(None)
    }

    /// Whether a resource under this namespace has been served.
    pub fn is_namespace_defined(&self, namespace: &str) -> bool {
        self.lock_namespaces().contains(namespace)
    }

    /// Records the parent path of a served resource. Two threads racing to
    /// define the same namespace is expected and harmless.
    fn define_namespace(&self, resource_name: &str) {
        let namespace = match resource_name.rsplit_once('/') {
            Some((parent, _)) => parent,
            None => "",
        };
        self.lock_namespaces().insert(namespace.to_string());
    }

    fn lock_namespaces(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.namespaces.lock().unwrap_or_else(|poisoned| {
            log::warn!("namespace set mutex was poisoned; continuing with its state");
            poisoned.into_inner()
        })
    }
}

impl std::fmt::Debug for ComponentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentLoader")
            .field("locations", &self.locations.len())
            .finish_non_exhaustive()
    }
}
