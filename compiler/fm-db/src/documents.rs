// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Current text of every document the server knows about.
//!
//! A document is either open in the editor or a filesystem snapshot. The
//! editor's copy always wins: opening a file hides its snapshot and closing
//! it replaces the editor copy with a fresh read from disk.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::position::{LineIndex, Position};
use crate::vfs::VfsError;
use crate::Uri;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("document is not open: {0}")]
    NotOpen(Uri),
    #[error("stale edit for {uri}: version {version} is not newer than {current}")]
    StaleVersion {
        uri: Uri,
        version: i32,
        current: i32,
    },
}

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Editor,
    Disk,
}

/// A document's text and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub uri: Uri,
    pub text: Arc<str>,
    /// Editor version; snapshots read from disk use 0.
    pub version: i32,
    pub origin: Origin,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    open: FxHashMap<Uri, SourceFile>,
    disk: FxHashMap<Uri, SourceFile>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document opened in the editor.
    pub fn open(&mut self, uri: &str, text: &str, version: i32) {
        let uri: Uri = Arc::from(uri);
        self.disk.remove(&uri);
        debug!(%uri, version, "opened document");
        self.open.insert(
            Arc::clone(&uri),
            SourceFile {
                uri,
                text: Arc::from(text),
                version,
                origin: Origin::Editor,
            },
        );
    }

    /// Replace the text of an open document.
    ///
    /// Edits must arrive with strictly increasing versions.
    pub fn apply_edit(&mut self, uri: &str, text: &str, version: i32) -> Result<(), DocumentError> {
        let Some(doc) = self.open.get_mut(uri) else {
            return Err(DocumentError::NotOpen(Arc::from(uri)));
        };
        if version <= doc.version {
            return Err(DocumentError::StaleVersion {
                uri: Arc::clone(&doc.uri),
                version,
                current: doc.version,
            });
        }
        doc.text = Arc::from(text);
        doc.version = version;
        Ok(())
    }

    /// Hand a closed document back to the filesystem.
    ///
    /// `snapshot` is the file as read from disk. If the read failed the last
    /// editor text is kept as the snapshot.
    pub fn close(
        &mut self,
        uri: &str,
        snapshot: Result<String, VfsError>,
    ) -> Result<(), DocumentError> {
        let Some(doc) = self.open.remove(uri) else {
            return Err(DocumentError::NotOpen(Arc::from(uri)));
        };
        let text = match snapshot {
            Ok(text) => Arc::from(text),
            Err(err) => {
                warn!(uri = %doc.uri, error = %err, "keeping editor text for closed document");
                doc.text
            }
        };
        self.disk.insert(
            Arc::clone(&doc.uri),
            SourceFile {
                uri: doc.uri,
                text,
                version: 0,
                origin: Origin::Disk,
            },
        );
        Ok(())
    }

    /// Store a snapshot read from disk, unless the editor has the file open.
    pub fn load(&mut self, uri: &str, text: String) {
        if self.open.contains_key(uri) {
            return;
        }
        let uri: Uri = Arc::from(uri);
        self.disk.insert(
            Arc::clone(&uri),
            SourceFile {
                uri,
                text: Arc::from(text),
                version: 0,
                origin: Origin::Disk,
            },
        );
    }

    pub fn get(&self, uri: &str) -> Option<&SourceFile> {
        self.open.get(uri).or_else(|| self.disk.get(uri))
    }

    pub fn text(&self, uri: &str) -> Option<&str> {
        self.get(uri).map(|doc| &*doc.text)
    }

    pub fn is_open(&self, uri: &str) -> bool {
        self.open.contains_key(uri)
    }

    /// Editor version of an open document.
    pub fn version(&self, uri: &str) -> Option<i32> {
        self.open.get(uri).map(|doc| doc.version)
    }

    /// Editor position of byte `offset` in the current text of `uri`.
    pub fn position(&self, uri: &str, offset: u32) -> Option<Position> {
        self.text(uri)
            .map(|text| LineIndex::new(text).position(offset))
    }

    /// Every document, open ones first, each group in uri order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        let mut open: Vec<&SourceFile> = self.open.values().collect();
        let mut disk: Vec<&SourceFile> = self.disk.values().collect();
        open.sort_by(|a, b| a.uri.cmp(&b.uri));
        disk.sort_by(|a, b| a.uri.cmp(&b.uri));
        open.into_iter().chain(disk)
    }

    pub fn len(&self) -> usize {
        self.open.len() + self.disk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty() && self.disk.is_empty()
    }
}
