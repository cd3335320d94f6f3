// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Turning an engine report into one diagnostic list per file.
//!
//! Every known file gets an entry, including an empty one when it has no
//! records. Sending the empty list is how an editor learns that a file's
//! previous diagnostics are gone.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::engine::{DiagnosticRecord, Severity};
use crate::position::{Position, Range};
use crate::Uri;

/// A diagnostic positioned for the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: Severity,
    pub message: String,
}

/// Group `report` by file over exactly `known_files`.
///
/// Records keep their report order within a file. `resolve` maps a file and
/// byte offset to an editor position. Records for files outside
/// `known_files` are dropped.
pub fn reconcile<F>(
    report: &[DiagnosticRecord],
    known_files: &BTreeSet<Uri>,
    mut resolve: F,
) -> BTreeMap<Uri, Vec<Diagnostic>>
where
    F: FnMut(&str, u32) -> Position,
{
    let mut out: BTreeMap<Uri, Vec<Diagnostic>> = known_files
        .iter()
        .map(|uri| (uri.clone(), Vec::new()))
        .collect();

    for record in report {
        let Some(list) = out.get_mut(&*record.file) else {
            debug!(file = %record.file, "dropping diagnostic for unknown file");
            continue;
        };
        list.push(Diagnostic {
            range: Range {
                start: resolve(&record.file[..], record.from),
                end: resolve(&record.file[..], record.upto),
            },
            severity: record.severity,
            message: record.message.clone(),
        });
    }

    out
}
