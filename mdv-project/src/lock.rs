//! Advisory reader/writer lock shared by every process working on a project.
//!
//! The lock is an `flock`-style lock on a file in the project directory. Each acquisition
//! opens its own handle, so two guards taken in the same process contend exactly like guards
//! taken in different processes.

use std::fmt::{Display, Formatter};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use log::{debug, warn};
use mdv_error::{MdvResult, mdv_bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared with other readers.
    Read,
    /// Exclusive.
    Write,
}

impl Display for LockMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LockMode::Read => write!(f, "read"),
            LockMode::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectLock {
    path: PathBuf,
}

impl ProjectLock {
    /// Use `path` as the lock file, creating it if needed.
    pub fn new(path: impl Into<PathBuf>) -> MdvResult<Self> {
        let lock = Self { path: path.into() };
        lock.open()?;
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> MdvResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?)
    }

    /// Block until the lock is held in `mode`.
    pub fn acquire(&self, mode: LockMode) -> MdvResult<LockGuard> {
        let file = self.open()?;
        match mode {
            LockMode::Read => FileExt::lock_shared(&file)?,
            LockMode::Write => FileExt::lock_exclusive(&file)?,
        }
        debug!("acquired {mode} lock on {}", self.path.display());
        Ok(LockGuard { file, mode })
    }

    pub fn read(&self) -> MdvResult<LockGuard> {
        self.acquire(LockMode::Read)
    }

    pub fn write(&self) -> MdvResult<LockGuard> {
        self.acquire(LockMode::Write)
    }
}

/// A held project lock, released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    mode: LockMode,
}

impl LockGuard {
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Fail unless this guard grants `mode`. A write guard grants both modes.
    pub fn require(&self, mode: LockMode) -> MdvResult<()> {
        if mode == LockMode::Write && self.mode != LockMode::Write {
            mdv_bail!(Consistency: "operation needs the write lock but only the read lock is held");
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("failed to release {} lock: {e}", self.mode);
        }
    }
}
