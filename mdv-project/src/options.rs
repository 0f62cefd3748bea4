use mdv_error::{MdvResult, mdv_bail};

/// File layout and export settings for a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOptions {
    compression_level: u32,
    container_dir: String,
    lock_file: String,
    metadata_file: String,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
            container_dir: "datafile".to_string(),
            lock_file: "lock".to_string(),
            metadata_file: "datasources.json".to_string(),
        }
    }
}

impl ProjectOptions {
    /// Gzip level, 0 to 9, used for every exported segment.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sub-directory of the project holding the array container.
    pub fn with_container_dir(mut self, dir: impl Into<String>) -> Self {
        self.container_dir = dir.into();
        self
    }

    pub fn with_lock_file(mut self, name: impl Into<String>) -> Self {
        self.lock_file = name.into();
        self
    }

    pub fn with_metadata_file(mut self, name: impl Into<String>) -> Self {
        self.metadata_file = name.into();
        self
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    pub fn container_dir(&self) -> &str {
        &self.container_dir
    }

    pub fn lock_file(&self) -> &str {
        &self.lock_file
    }

    pub fn metadata_file(&self) -> &str {
        &self.metadata_file
    }

    pub(crate) fn validate(&self) -> MdvResult<()> {
        if self.compression_level > 9 {
            mdv_bail!("compression level must be 0 to 9, got {}", self.compression_level);
        }
        for (what, name) in [
            ("container directory", &self.container_dir),
            ("lock file", &self.lock_file),
            ("metadata file", &self.metadata_file),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                mdv_bail!("{what} must be a single path component, got {name:?}");
            }
        }
        Ok(())
    }
}
