// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Incremental analysis passes.
//!
//! A pass is split in three so the expensive middle can run without holding
//! the analyzer:
//!
//! 1. [`Analyzer::prepare`] parses the changed file and records its
//!    definitions. A parse failure ends the pass right there.
//! 2. [`SynthesisJob::run`] synthesizes the affected roots against a snapshot
//!    of the global definitions.
//! 3. [`Analyzer::commit`] stores the results and returns the [`Report`] for
//!    every known file.
//!
//! [`Analyzer::analyze`] and [`Analyzer::startup`] run all three in a row.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use fm_ast::span::Span;
use fm_ast::Name;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::defs::{DefinitionSet, DefinitionStore, GlobalDefs};
use crate::engine::{contain, Definition, DiagnosticRecord, Engine, EngineError, Severity, Synthesis};
use crate::position::{find_token_at, Position};
use crate::reconcile::{reconcile, Diagnostic};
use crate::Uri;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("analysis task did not finish: {0}")]
    Interrupted(String),
}

/// Everything the editor should be told after a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Current records of every file in `files`.
    pub records: Vec<DiagnosticRecord>,
    /// Files whose diagnostics are republished.
    pub files: BTreeSet<Uri>,
}

impl Report {
    /// Group the records into one editor diagnostic list per file.
    pub fn reconcile<F>(&self, resolve: F) -> BTreeMap<Uri, Vec<Diagnostic>>
    where
        F: FnMut(&str, u32) -> Position,
    {
        reconcile(&self.records, &self.files, resolve)
    }
}

/// The first half of a pass.
#[derive(Debug)]
pub enum Prepared<D> {
    /// Nothing left to synthesize.
    Done(Report),
    Synthesize(SynthesisJob<D>),
}

/// Roots to synthesize and the snapshot to synthesize them against.
#[derive(Debug, Clone)]
pub struct SynthesisJob<D> {
    roots: Vec<Name>,
    /// Files whose diagnostics are recomputed in full.
    covered: BTreeSet<Uri>,
    /// Files to report on besides the known ones.
    announce: BTreeSet<Uri>,
    env: GlobalDefs<D>,
}

impl<D: Definition> SynthesisJob<D> {
    /// Synthesize the roots. Engine panics come back as errors.
    pub fn run<E: Engine<Def = D>>(&self, engine: &E) -> Result<Synthesis<D>, EngineError> {
        contain(|| engine.synthesize(&self.roots, &self.env))?
    }
}

/// The incremental analyzer.
///
/// Owns the definition store, the last synthesized definitions and the
/// diagnostic records of every file.
pub struct Analyzer<E: Engine> {
    engine: Arc<E>,
    store: DefinitionStore<E::Def>,
    synthesized: GlobalDefs<E::Def>,
    /// Synthesis records per file.
    records: BTreeMap<Uri, Vec<DiagnosticRecord>>,
    /// Files whose current text does not parse.
    parse_failures: BTreeMap<Uri, DiagnosticRecord>,
    /// Files left out of the last full rebuild.
    conflicts: BTreeMap<Uri, DiagnosticRecord>,
    /// Definitions hidden by a newer one in another file.
    shadowed: BTreeMap<Uri, Vec<DiagnosticRecord>>,
}

impl<E: Engine> Analyzer<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            store: DefinitionStore::new(),
            synthesized: GlobalDefs::new(),
            records: BTreeMap::new(),
            parse_failures: BTreeMap::new(),
            conflicts: BTreeMap::new(),
            shadowed: BTreeMap::new(),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn store(&self) -> &DefinitionStore<E::Def> {
        &self.store
    }

    pub fn known_files(&self) -> &BTreeSet<Uri> {
        self.store.all_known_files()
    }

    /// Current records of `uri`, as they would be reported.
    pub fn diagnostics(&self, uri: &str) -> Vec<DiagnosticRecord> {
        if let Some(failure) = self.parse_failures.get(uri) {
            return vec![failure.clone()];
        }
        let mut out = self.records.get(uri).cloned().unwrap_or_default();
        out.extend(self.conflicts.get(uri).cloned());
        out.extend(self.shadowed.get(uri).into_iter().flatten().cloned());
        out
    }

    /// Parse every file, rebuild the global table and prepare a full pass.
    pub fn prepare_startup(
        &mut self,
        files: Vec<(Uri, String)>,
    ) -> Result<Prepared<E::Def>, AnalysisError> {
        let announce: BTreeSet<Uri> = files.iter().map(|(uri, _)| Arc::clone(uri)).collect();
        self.records.clear();
        self.synthesized = GlobalDefs::new();
        self.parse_failures.clear();
        self.conflicts.clear();

        let mut sets: Vec<(Uri, DefinitionSet<E::Def>)> = Vec::with_capacity(files.len());
        for (uri, text) in &files {
            let parsed = contain(|| self.engine.parse(uri, text)).unwrap_or_else(|err| {
                Err(crate::engine::ParseFailure {
                    offset: 0,
                    message: err.to_string(),
                })
            });
            match parsed {
                Ok(set) => sets.push((Arc::clone(uri), set)),
                Err(failure) => {
                    warn!(%uri, offset = failure.offset, "file does not parse");
                    self.parse_failures.insert(Arc::clone(uri), parse_record(uri, failure));
                }
            }
        }

        let by_uri: BTreeMap<Uri, DefinitionSet<E::Def>> = sets.iter().cloned().collect();
        let conflicts = self.store.merge_all(sets);
        for conflict in &conflicts {
            let origin = by_uri
                .get(&conflict.file)
                .and_then(|set| set.get(&conflict.name))
                .map_or(Span::empty(0), Definition::origin);
            let record = collision(&conflict.file, origin, &conflict.name, &conflict.owner);
            self.conflicts.insert(Arc::clone(&conflict.file), record);
        }
        self.refresh_shadowed();

        info!(
            files = files.len(),
            definitions = self.store.global().len(),
            failed = self.parse_failures.len(),
            conflicts = conflicts.len(),
            "loaded workspace"
        );

        Ok(Prepared::Synthesize(SynthesisJob {
            roots: self.store.global().names().cloned().collect(),
            covered: self.store.all_known_files().clone(),
            announce,
            env: self.store.global().clone(),
        }))
    }

    /// Parse the new text of `uri` and prepare the pass it triggers.
    pub fn prepare(&mut self, uri: &str, text: &str) -> Result<Prepared<E::Def>, AnalysisError> {
        let set = match contain(|| self.engine.parse(uri, text))? {
            Ok(set) => set,
            Err(failure) => {
                info!(%uri, offset = failure.offset, "parse failed, keeping previous definitions");
                let record = parse_record(uri, failure);
                let file: Uri = Arc::from(uri);
                self.parse_failures.insert(Arc::clone(&file), record.clone());
                return Ok(Prepared::Done(Report {
                    records: vec![record],
                    files: BTreeSet::from([file]),
                }));
            }
        };
        self.parse_failures.remove(uri);
        self.conflicts.remove(uri);

        // Files that owned one of the new names lose it.
        let mut covered: BTreeSet<Uri> = set
            .names()
            .filter_map(|name| self.store.global().owner(name))
            .map(Arc::from)
            .collect();
        covered.insert(Arc::from(uri));

        let recorded = self.store.record_parse(uri, set);
        self.refresh_shadowed();
        let touched = recorded.touched();
        self.synthesized.retain(|name, _| !touched.contains(name));

        // Files that got a dropped name back, and files that use a name that
        // came or went.
        let global = self.store.global();
        for name in recorded
            .removed
            .iter()
            .chain(self.store.dependents(&touched, uri).iter())
        {
            if let Some(owner) = global.owner(name) {
                covered.insert(Arc::from(owner));
            }
        }

        let roots = self.store.owned_by(&covered);
        info!(
            %uri,
            roots = roots.len(),
            files = covered.len(),
            removed = recorded.removed.len(),
            "prepared pass"
        );
        Ok(Prepared::Synthesize(SynthesisJob {
            roots,
            covered,
            announce: BTreeSet::new(),
            env: global.clone(),
        }))
    }

    /// Store the outcome of a job prepared by this analyzer.
    ///
    /// On engine failure nothing changes and the previous diagnostics stand.
    pub fn commit(
        &mut self,
        job: SynthesisJob<E::Def>,
        result: Result<Synthesis<E::Def>, EngineError>,
    ) -> Result<Report, AnalysisError> {
        let synthesis = match result {
            Ok(synthesis) => synthesis,
            Err(err) => {
                error!(error = %err, roots = job.roots.len(), "synthesis failed, keeping previous diagnostics");
                return Err(err.into());
            }
        };

        for def in synthesis.defs {
            self.synthesized.insert(Name::from(def.name()), Arc::new(def));
        }
        let global = self.store.global();
        self.synthesized
            .retain(|name, def| global.owner(name) == Some(def.file()));

        for file in &job.covered {
            self.records.insert(Arc::clone(file), Vec::new());
        }
        let known = self.store.all_known_files();
        for record in synthesis.report {
            if !known.contains(&record.file) {
                continue;
            }
            let list = self.records.entry(Arc::clone(&record.file)).or_default();
            if job.covered.contains(&record.file) || !list.contains(&record) {
                list.push(record);
            }
        }
        self.records.retain(|file, _| known.contains(file));

        let mut files = known.clone();
        files.extend(self.parse_failures.keys().cloned());
        files.extend(job.announce);
        Ok(self.report(files))
    }

    /// Run a whole pass for an edit of `uri`.
    pub fn analyze(&mut self, uri: &str, text: &str) -> Result<Report, AnalysisError> {
        let prepared = self.prepare(uri, text)?;
        self.finish(prepared)
    }

    /// Run the initial full pass over `files`.
    pub fn startup(&mut self, files: Vec<(Uri, String)>) -> Result<Report, AnalysisError> {
        let prepared = self.prepare_startup(files)?;
        self.finish(prepared)
    }

    fn finish(&mut self, prepared: Prepared<E::Def>) -> Result<Report, AnalysisError> {
        match prepared {
            Prepared::Done(report) => Ok(report),
            Prepared::Synthesize(job) => {
                let result = job.run(self.engine.as_ref());
                self.commit(job, result)
            }
        }
    }

    /// Warn on every definition another file currently overrides.
    fn refresh_shadowed(&mut self) {
        self.shadowed.clear();
        for (def, owner) in self.store.shadowed() {
            self.shadowed
                .entry(Arc::from(def.file()))
                .or_default()
                .push(collision(def.file(), def.origin(), def.name(), owner));
        }
    }

    fn report(&self, files: BTreeSet<Uri>) -> Report {
        let records = files
            .iter()
            .flat_map(|file| self.diagnostics(file))
            .collect();
        Report { records, files }
    }

    // === Queries ===

    /// The definition `name` refers to, synthesized if available.
    pub fn lookup(&self, name: &str) -> Option<&E::Def> {
        self.synthesized
            .get(name)
            .or_else(|| self.store.global().get(name))
    }

    /// Hover text for the token at `offset` in `text`, the current text of
    /// `uri`.
    pub fn hover(&self, uri: &str, text: &str, offset: u32) -> Option<String> {
        let token = find_token_at(text, offset)?;
        if let Some(def) = token.candidates().find_map(|name| self.lookup(name)) {
            return Some(def.signature());
        }

        let set = self.store.file_defs(uri)?;
        set.iter()
            .filter(|def| def.extent().touches(offset))
            .find_map(|def| token.candidates().find_map(|name| def.local(name)))
    }

    /// The global definition named by the token at `offset` in `text`.
    pub fn definition(&self, text: &str, offset: u32) -> Option<&E::Def> {
        let token = find_token_at(text, offset)?;
        token
            .candidates()
            .find_map(|name| self.store.global().get(name))
    }

    /// Every global definition in name order.
    pub fn completions(&self) -> Vec<&E::Def> {
        self.store
            .global()
            .names()
            .filter_map(|name| self.lookup(name))
            .collect()
    }
}

fn parse_record(uri: &str, failure: crate::engine::ParseFailure) -> DiagnosticRecord {
    DiagnosticRecord::error(uri, Span::empty(failure.offset), failure.message)
}

/// The warning on a definition of `name` in `file` that `owner` overrides.
fn collision(file: &str, origin: Span, name: &str, owner: &str) -> DiagnosticRecord {
    let mut record = DiagnosticRecord::error(
        file,
        origin,
        format!("`{name}` is already defined in {owner}\n"),
    );
    record.severity = Severity::Warning;
    record
}
