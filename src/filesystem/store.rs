// src/filesystem/store.rs

//! Per-scope file store inside a system description directory

use std::fs;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Directory `<base>/<name>` holding the files of one inspection scope
///
/// The directory is only created on demand; `path()` is `None` until then.
#[derive(Debug, Clone)]
pub struct ScopeFileStore {
    base_path: PathBuf,
    name: String,
}

impl ScopeFileStore {
    pub fn new(base_path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store directory whether or not it exists
    pub fn location(&self) -> PathBuf {
        self.base_path.join(&self.name)
    }

    /// Store directory, if it exists
    pub fn path(&self) -> Option<PathBuf> {
        let dir = self.location();
        dir.is_dir().then_some(dir)
    }

    pub fn create(&self) -> Result<PathBuf> {
        let dir = self.location();
        self.create_dir(&dir)?;
        Ok(dir)
    }

    pub fn create_sub_directory(&self, sub_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = self.location().join(sub_dir);
        self.create_dir(&dir)?;
        Ok(dir)
    }

    pub fn remove(&self) -> Result<()> {
        let dir = self.location();
        if dir.exists() {
            debug!("Removing store {}", dir.display());
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Move the store to `<base>/<new_name>`, replacing what is there
    pub fn rename(&mut self, new_name: &str) -> Result<()> {
        let target = Self::new(&self.base_path, new_name);
        target.remove()?;
        fs::rename(self.location(), target.location())?;
        debug!("Renamed store {} to {}", self.name, new_name);
        self.name = new_name.to_string();
        Ok(())
    }


    /// Directories inherit the permission bits of the description directory
    fn new_dir_mode(&self) -> u32 {
        fs::metadata(&self.base_path)
            .map(|m| m.permissions().mode() & 0o777)
            .unwrap_or(0o700)
    }

    fn create_dir(&self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(self.new_dir_mode())
                .create(dir)?;
        }
        Ok(())
    }
}
