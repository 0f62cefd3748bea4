use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;
use mdv_error::{MdvResult, mdv_bail};

use crate::header::DatasetHeader;
use crate::key::{DATASET_EXT, TMP_SUFFIX, dataset_file_name, escape, unescape};
use crate::{Dataset, TypedArray};

/// A group of named datasets and nested groups, backed by a directory.
///
/// Groups hold no open handles; every call opens, reads or writes and closes what it touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    path: PathBuf,
}

impl Group {
    pub(crate) fn at(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn child_path(&self, name: &str) -> MdvResult<PathBuf> {
        Ok(self.path.join(escape(name)?))
    }

    fn dataset_path(&self, key: &str) -> MdvResult<PathBuf> {
        Ok(self.path.join(dataset_file_name(key)?))
    }

    pub fn contains_group(&self, name: &str) -> MdvResult<bool> {
        Ok(self.child_path(name)?.is_dir())
    }

    /// Open an existing child group.
    pub fn group(&self, name: &str) -> MdvResult<Group> {
        let path = self.child_path(name)?;
        if !path.is_dir() {
            mdv_bail!(NotFound: "group {name} does not exist in {}", self.name);
        }
        Ok(Group::at(name, path))
    }

    /// Create a new child group. Fails if the group already exists.
    pub fn create_group(&self, name: &str) -> MdvResult<Group> {
        let path = self.child_path(name)?;
        if path.exists() {
            mdv_bail!("group {name} already exists in {}", self.name);
        }
        fs::create_dir_all(&path)?;
        Ok(Group::at(name, path))
    }

    /// Open a child group, creating it if absent.
    pub fn require_group(&self, name: &str) -> MdvResult<Group> {
        let path = self.child_path(name)?;
        fs::create_dir_all(&path)?;
        Ok(Group::at(name, path))
    }

    /// Recursively delete a child group. Returns false if it did not exist.
    pub fn delete_group(&self, name: &str) -> MdvResult<bool> {
        match fs::remove_dir_all(self.child_path(name)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of the child groups, sorted.
    pub fn groups(&self) -> MdvResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str().and_then(unescape) {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Names of the datasets in this group, sorted.
    pub fn datasets(&self) -> MdvResult<Vec<String>> {
        let suffix = format!(".{DATASET_EXT}");
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(&suffix)) else {
                continue;
            };
            if let Some(name) = unescape(stem) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn contains(&self, key: &str) -> MdvResult<bool> {
        Ok(self.dataset_path(key)?.is_file())
    }

    /// Write `array` as dataset `key`, replacing any existing dataset of that name.
    ///
    /// The payload is written to a sibling temporary file and renamed into place, so readers
    /// see either the previous dataset or the new one.
    pub fn create_dataset(&self, key: &str, array: &TypedArray) -> MdvResult<()> {
        let path = self.dataset_path(key)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);

        let header = DatasetHeader {
            dtype: array.dtype(),
            len: array.len() as u64,
        };
        if let Err(e) = write_dataset_file(&tmp, &header, array) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &path)?;

        debug!(
            "wrote dataset {}/{key}: {} x {}",
            self.name,
            array.len(),
            array.dtype()
        );
        Ok(())
    }

    /// Delete dataset `key`. Returns false if it did not exist.
    pub fn delete_dataset(&self, key: &str) -> MdvResult<bool> {
        match fs::remove_file(self.dataset_path(key)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Open dataset `key` for random-access reads.
    pub fn dataset(&self, key: &str) -> MdvResult<Dataset> {
        let path = self.dataset_path(key)?;
        if !path.is_file() {
            mdv_bail!(NotFound: "dataset {key} does not exist in group {}", self.name);
        }
        Dataset::open(&path, key)
    }

    /// Read and materialize dataset `key`.
    pub fn read_dataset(&self, key: &str) -> MdvResult<TypedArray> {
        self.dataset(key)?.to_array()
    }
}

fn write_dataset_file(path: &Path, header: &DatasetHeader, array: &TypedArray) -> MdvResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&header.encode()?)?;
    writer.write_all(&array.to_le_bytes())?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}
