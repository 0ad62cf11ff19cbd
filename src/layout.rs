//! Host-side package directories

use crate::config::join_relative;
use crate::error::{PimError, PimResult};
use crate::package::{Copy, PackageEntry, Volume};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Maps manifest paths onto the package root
#[derive(Debug, Clone)]
pub struct PackageLayout {
    root: PathBuf,
}

impl PackageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PackageLayout { root: root.into() }
    }

    pub fn base_dir(&self, package: &PackageEntry) -> PathBuf {
        join_relative(&self.root, &package.base_dir)
    }

    /// Host directory of a volume; `None` when it binds the working directory
    pub fn volume_dir(&self, volume: &Volume) -> Option<PathBuf> {
        if volume.path.is_empty() {
            None
        } else {
            Some(join_relative(&self.root, &volume.path))
        }
    }

    pub fn copy_dest(&self, copy: &Copy) -> PathBuf {
        join_relative(&self.root, &copy.dest)
    }
}

/// Create `path` and its parents; an existing directory is fine
pub fn make_dir(path: &Path) -> PimResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    tracing::debug!(path = %path.display(), "creating directory");
    fs::create_dir_all(path).map_err(|e| PimError::filesystem(path, e))
}

/// Remove `path` recursively; an absent directory is fine
pub fn remove_dir(path: &Path) -> PimResult<()> {
    tracing::debug!(path = %path.display(), "removing directory");
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PimError::filesystem(path, e)),
    }
}

/// Replace `path` with an empty directory
pub fn reset_dir(path: &Path) -> PimResult<()> {
    remove_dir(path)?;
    make_dir(path)
}
