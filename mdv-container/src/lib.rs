//! A hierarchical container of named, typed arrays.
//!
//! A container is a directory tree: groups are directories, and each dataset is a single file
//! holding a fixed header followed by its little-endian payload. Datasets are written whole and
//! replaced atomically, and read through memory maps so that arbitrary element ranges can be
//! served as zero-copy [`bytes::Bytes`] without decoding the rest of the array.

use std::fs;
use std::path::{Path, PathBuf};

pub use array::*;
pub use dataset::*;
pub use dtype::*;
pub use group::*;
pub use header::{HEADER_SIZE, MAGIC, VERSION};
pub use key::DATASET_EXT;
use mdv_error::MdvResult;
pub use native::*;

mod array;
mod dataset;
mod dtype;
mod group;
mod header;
mod key;
mod native;

/// The root of a container on disk.
///
/// Opening a container only ensures its root directory exists; no file handles are held
/// between operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    root: Group,
}

impl Container {
    /// Open the container rooted at `path`, creating the directory if needed.
    pub fn open(path: impl AsRef<Path>) -> MdvResult<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        Ok(Self {
            root: Group::at("/", PathBuf::from(path)),
        })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// The root group, holding one child group per data source.
    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn group(&self, name: &str) -> MdvResult<Group> {
        self.root.group(name)
    }

    pub fn create_group(&self, name: &str) -> MdvResult<Group> {
        self.root.create_group(name)
    }

    pub fn require_group(&self, name: &str) -> MdvResult<Group> {
        self.root.require_group(name)
    }

    pub fn delete_group(&self, name: &str) -> MdvResult<bool> {
        self.root.delete_group(name)
    }

    pub fn contains_group(&self, name: &str) -> MdvResult<bool> {
        self.root.contains_group(name)
    }
}
