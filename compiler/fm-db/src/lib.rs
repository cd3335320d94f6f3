// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Incremental workspace analysis for the Formality language server.
//!
//! This crate keeps a workspace's definitions and diagnostics current as
//! documents are edited, independently of any particular language:
//!
//! - [`documents::DocumentStore`] holds the current text of every document.
//! - [`defs::DefinitionStore`] owns the workspace-wide name table.
//! - [`debounce::Debouncer`] coalesces bursts of edits.
//! - [`analysis::Analyzer`] runs the parse, synthesize and report pass.
//! - [`reconcile::reconcile`] groups engine records per file.
//! - [`position`] converts byte offsets to editor positions.
//!
//! Languages plug in through [`engine::Engine`].

pub mod analysis;
pub mod debounce;
pub mod defs;
pub mod documents;
pub mod engine;
pub mod position;
pub mod reconcile;
pub mod vfs;

#[cfg(test)]
mod testing;

use std::sync::Arc;

/// A document URI as sent by the editor.
pub type Uri = Arc<str>;

pub use analysis::{AnalysisError, Analyzer, Prepared, Report, SynthesisJob};
pub use debounce::{Change, DebounceConfig, DebounceScope, Debouncer};
pub use defs::{DefinitionSet, DefinitionStore, GlobalDefs, MergeConflict};
pub use documents::{DocumentError, DocumentStore, SourceFile};
pub use engine::{
    Definition, DefinitionKind, DiagnosticRecord, Engine, EngineError, ParseFailure, Severity,
    Synthesis,
};
pub use position::{Position, Range};
pub use reconcile::{reconcile, Diagnostic};
pub use vfs::{DiskFiles, FileSource, MemoryFiles, VfsError};
