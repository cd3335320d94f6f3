// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Reading workspace files.
//!
//! [`FileSource`] is what startup discovery and closed-document snapshots
//! read through. [`DiskFiles`] walks the real filesystem; [`MemoryFiles`]
//! serves a fixed set of files for tests and embedding.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no such file: {}", .0.display())]
    NotFound(PathBuf),
}

/// Listing and reading source files.
pub trait FileSource: Send + Sync {
    /// Every source file under `root`, recursively, in a stable order.
    fn list(&self, root: &Path) -> Result<Vec<PathBuf>, VfsError>;

    fn read(&self, path: &Path) -> Result<String, VfsError>;
}

/// The local filesystem, restricted to files with given extensions.
#[derive(Debug, Clone)]
pub struct DiskFiles {
    extensions: Vec<String>,
    ignored_dirs: Vec<String>,
}

impl Default for DiskFiles {
    fn default() -> Self {
        Self {
            extensions: vec!["fm".to_string()],
            ignored_dirs: vec!["target".to_string(), "node_modules".to_string()],
        }
    }
}

impl DiskFiles {
    pub fn new(extensions: Vec<String>, ignored_dirs: Vec<String>) -> Self {
        Self {
            extensions,
            ignored_dirs,
        }
    }

    /// Whether `path` has one of the source extensions.
    pub fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }

    fn is_ignored_dir(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                name.starts_with('.') || self.ignored_dirs.iter().any(|ignored| ignored == name)
            })
    }
}

impl FileSource for DiskFiles {
    /// Symlinks are not followed. Entries that cannot be read are logged
    /// and skipped.
    fn list(&self, root: &Path) -> Result<Vec<PathBuf>, VfsError> {
        let mut found = Vec::new();
        if !root.is_dir() {
            return Ok(found);
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self.is_ignored_dir(entry.path())
            });
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.is_source(entry.path()) {
                found.push(entry.into_path());
            }
        }
        debug!(root = %root.display(), files = found.len(), "listed workspace files");
        Ok(found)
    }

    fn read(&self, path: &Path) -> Result<String, VfsError> {
        std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                VfsError::NotFound(path.to_path_buf())
            } else {
                VfsError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

/// An in-memory file tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    pub fn remove(&mut self, path: &Path) -> Option<String> {
        self.files.remove(path)
    }
}

impl FromIterator<(PathBuf, String)> for MemoryFiles {
    fn from_iter<I: IntoIterator<Item = (PathBuf, String)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl FileSource for MemoryFiles {
    fn list(&self, root: &Path) -> Result<Vec<PathBuf>, VfsError> {
        Ok(self
            .files
            .keys()
            .filter(|path| path.starts_with(root))
            .cloned()
            .collect())
    }

    fn read(&self, path: &Path) -> Result<String, VfsError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(path.to_path_buf()))
    }
}
