//! Resolution of extent file names relative to the disk descriptor.
//!
//! Descriptors reference extent files by relative name; a [`FileLocator`]
//! turns those names into open file handles rooted at the descriptor's
//! directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// How an extent file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Open an existing file.
    Open,
    /// Create the file, truncating any existing content.
    Create,
}

/// Requested access to a disk or extent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    /// Read-only access.
    Read,
    /// Read and write access.
    ReadWrite,
}

/// Requested sharing with other openers.
///
/// Windows file-share semantics have no direct equivalent in `OpenOptions`;
/// on Unix this is advisory only and does not prevent concurrent opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileShare {
    /// Other readers allowed.
    Read,
    /// Exclusive access requested.
    None,
}

/// Resolves relative extent file names to open handles.
pub trait FileLocator {
    /// Opens `name` with the given mode, access, and sharing.
    fn open(&self, name: &str, mode: FileMode, access: FileAccess, share: FileShare)
        -> Result<File>;

    /// Returns the absolute path `name` resolves to.
    fn resolve(&self, name: &str) -> PathBuf;
}

/// A locator rooted at a directory on the local filesystem.
pub struct LocalFileLocator {
    base: PathBuf,
}

impl LocalFileLocator {
    /// Creates a locator resolving names relative to `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The directory names are resolved against.
    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl FileLocator for LocalFileLocator {
    fn open(
        &self,
        name: &str,
        mode: FileMode,
        access: FileAccess,
        _share: FileShare,
    ) -> Result<File> {
        let path = self.resolve(name);
        let mut options = OpenOptions::new();
        options.read(true);
        if access == FileAccess::ReadWrite {
            options.write(true);
        }
        if mode == FileMode::Create {
            options.write(true).create(true).truncate(true);
        }
        options.open(&path).map_err(|e| Error::io(e, path))
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.base.join(name)
    }
}
