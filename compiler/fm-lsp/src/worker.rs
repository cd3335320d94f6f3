// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! The analysis worker.
//!
//! One task owns every write to the analyzer. It takes settled changes from
//! the debouncer and startup requests from the server, one at a time.
//! Parsing and committing happen under short write locks; synthesis runs on
//! the blocking pool against a snapshot, so hover and completion requests
//! are never held up by a long pass.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use fm_db::position::LineIndex;
use fm_db::{
    AnalysisError, Analyzer, Change, DocumentStore, Engine, FileSource, Prepared, Report,
    SynthesisJob, Uri,
};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tower_lsp::Client;
use tracing::{debug, error, info, warn};

use crate::convert;

/// State shared by the server and the worker.
pub struct Workspace<E: Engine> {
    pub analyzer: RwLock<Analyzer<E>>,
    pub documents: RwLock<DocumentStore>,
}

impl<E: Engine> Workspace<E> {
    pub fn new(engine: E) -> Self {
        Self {
            analyzer: RwLock::new(Analyzer::new(Arc::new(engine))),
            documents: RwLock::new(DocumentStore::new()),
        }
    }
}

/// Where diagnostics go.
#[tower_lsp::async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>);
}

#[tower_lsp::async_trait]
impl Publisher for Client {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: Option<i32>) {
        self.publish_diagnostics(uri, diagnostics, version).await;
    }
}

/// Requests from the server other than edits.
pub enum Task {
    /// Load every source file under `roots` and run the first full pass.
    Startup {
        roots: Vec<PathBuf>,
        source: Arc<dyn FileSource>,
    },
}

/// The last diagnostics sent for each document.
pub type Published = Arc<DashMap<Url, Vec<Diagnostic>>>;

pub struct Worker<E: Engine, P: Publisher> {
    workspace: Arc<Workspace<E>>,
    publisher: P,
    published: Published,
}

impl<E: Engine, P: Publisher> Worker<E, P> {
    pub fn new(workspace: Arc<Workspace<E>>, publisher: P, published: Published) -> Self {
        Self {
            workspace,
            publisher,
            published,
        }
    }

    /// Run until the change channel closes.
    pub fn spawn(
        self,
        tasks: mpsc::UnboundedReceiver<Task>,
        changes: mpsc::UnboundedReceiver<Change>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(tasks, changes))
    }

    pub async fn run(
        self,
        mut tasks: mpsc::UnboundedReceiver<Task>,
        mut changes: mpsc::UnboundedReceiver<Change>,
    ) {
        let mut tasks_open = true;
        loop {
            tokio::select! {
                biased;
                task = tasks.recv(), if tasks_open => match task {
                    Some(Task::Startup { roots, source }) => self.startup(roots, source).await,
                    None => tasks_open = false,
                },
                change = changes.recv() => match change {
                    Some(change) => {
                        for change in drain_latest(change, &mut changes) {
                            self.change(change).await;
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("analysis worker stopped");
    }

    /// Run the pass for one settled edit.
    pub async fn change(&self, change: Change) {
        debug!(uri = %change.uri, version = change.version, "analyzing change");
        let prepared = self
            .workspace
            .analyzer
            .write()
            .prepare(&change.uri, &change.text);
        self.finish(prepared, Some(&change)).await;
    }

    /// Load the workspace and run the first full pass.
    pub async fn startup(&self, roots: Vec<PathBuf>, source: Arc<dyn FileSource>) {
        let scanned = match tokio::task::spawn_blocking(move || scan(&roots, source.as_ref())).await
        {
            Ok(scanned) => scanned,
            Err(err) => {
                error!(error = %err, "workspace scan did not finish");
                return;
            }
        };

        let files: Vec<(Uri, String)> = {
            let mut documents = self.workspace.documents.write();
            for (uri, text) in scanned {
                documents.load(&uri, text);
            }
            documents
                .iter()
                .map(|doc| (Arc::clone(&doc.uri), doc.text.to_string()))
                .collect()
        };
        info!(files = files.len(), "starting workspace analysis");

        let prepared = self.workspace.analyzer.write().prepare_startup(files);
        self.finish(prepared, None).await;
    }

    async fn finish(
        &self,
        prepared: Result<Prepared<E::Def>, AnalysisError>,
        analyzed: Option<&Change>,
    ) {
        let report = match prepared {
            Ok(Prepared::Done(report)) => Ok(report),
            Ok(Prepared::Synthesize(job)) => self.synthesize(job).await,
            Err(err) => Err(err),
        };
        match report {
            Ok(report) => self.publish(report, analyzed).await,
            Err(err) => error!(error = %err, "analysis pass failed"),
        }
    }

    async fn synthesize(&self, job: SynthesisJob<E::Def>) -> Result<Report, AnalysisError> {
        let engine = Arc::clone(self.workspace.analyzer.read().engine());
        let outcome = tokio::task::spawn_blocking(move || {
            let result = job.run(engine.as_ref());
            (job, result)
        })
        .await;

        let (job, result) = outcome.map_err(|err| AnalysisError::Interrupted(err.to_string()))?;
        self.workspace.analyzer.write().commit(job, result)
    }

    /// Send the diagnostics of every file in `report`.
    ///
    /// The file of `analyzed` is positioned against the text that was
    /// analyzed and tagged with its version, even if the editor has moved on.
    /// Other files use their current text.
    async fn publish(&self, report: Report, analyzed: Option<&Change>) {
        let analyzed = analyzed.map(|change| (change, LineIndex::new(&change.text)));
        let batches: Vec<(Uri, Option<i32>, Vec<Diagnostic>)> = {
            let documents = self.workspace.documents.read();
            let map = report.reconcile(|uri, offset| match &analyzed {
                Some((change, index)) if &*change.uri == uri => index.position(offset),
                _ => documents.position(uri, offset).unwrap_or_else(|| {
                    warn!(%uri, "no text to position diagnostic against");
                    fm_db::Position::default()
                }),
            });
            map.into_iter()
                .map(|(uri, list)| {
                    let version = match &analyzed {
                        Some((change, _)) if change.uri == uri => {
                            documents.is_open(&uri).then_some(change.version)
                        }
                        _ => documents.version(&uri),
                    };
                    (uri, version, list.into_iter().map(convert::diagnostic).collect())
                })
                .collect()
        };

        for (uri, version, diagnostics) in batches {
            let Ok(url) = Url::parse(&uri) else {
                warn!(%uri, "not publishing diagnostics for invalid uri");
                continue;
            };
            self.published.insert(url.clone(), diagnostics.clone());
            self.publisher.publish(url, diagnostics, version).await;
        }
    }
}

/// The changes already queued after `first`, keeping the latest per uri.
fn drain_latest(first: Change, changes: &mut mpsc::UnboundedReceiver<Change>) -> Vec<Change> {
    let mut batch = vec![first];
    while let Ok(next) = changes.try_recv() {
        match batch.iter_mut().find(|queued| queued.uri == next.uri) {
            Some(queued) => *queued = next,
            None => batch.push(next),
        }
    }
    batch
}

/// Read every source file under `roots`.
fn scan(roots: &[PathBuf], source: &dyn FileSource) -> BTreeMap<Uri, String> {
    let mut found = BTreeMap::new();
    for root in roots {
        let paths = match source.list(root) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "cannot list workspace folder");
                continue;
            }
        };
        for path in paths {
            let Ok(url) = Url::from_file_path(&path) else {
                warn!(path = %path.display(), "cannot turn path into a uri");
                continue;
            };
            match source.read(&path) {
                Ok(text) => {
                    found.insert(Uri::from(url.as_str()), text);
                }
                Err(err) => warn!(error = %err, "skipping unreadable file"),
            }
        }
    }
    found
}
