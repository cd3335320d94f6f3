// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! LSP server implementation for Formality.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use fm_db::position::{position_to_offset, LineIndex};
use fm_db::{Change, Debouncer, Definition, DocumentError, FileSource, Uri};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, info, warn};

use crate::config::{InitializationOptions, ServerConfig};
use crate::convert;
use crate::engine::FormalityEngine;
use crate::worker::{Published, Task, Worker, Workspace};

/// The Formality language server.
pub struct FormalityLanguageServer {
    /// LSP client handle for sending messages to the editor
    client: Client,
    workspace: Arc<Workspace<FormalityEngine>>,
    config: RwLock<ServerConfig>,
    /// Workspace folders reported by the client
    roots: RwLock<Vec<PathBuf>>,
    debouncer: Mutex<Option<Debouncer>>,
    tasks: mpsc::UnboundedSender<Task>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Last diagnostics sent per document
    published: Published,
}

impl FormalityLanguageServer {
    /// Create a server and start its debouncer and analysis worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(client: Client, config: ServerConfig) -> Self {
        let workspace = Arc::new(Workspace::new(FormalityEngine));
        let published: Published = Arc::new(DashMap::new());

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (tasks, tasks_rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::spawn(config.debounce_config(), changes_tx);
        let worker = Worker::new(Arc::clone(&workspace), client.clone(), Arc::clone(&published))
            .spawn(tasks_rx, changes_rx);

        Self {
            client,
            workspace,
            config: RwLock::new(config),
            roots: RwLock::new(Vec::new()),
            debouncer: Mutex::new(Some(debouncer)),
            tasks,
            worker: Mutex::new(Some(worker)),
            published,
        }
    }

    /// The last diagnostics published for `uri`.
    pub fn published(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        self.published.get(uri).map(|entry| entry.value().clone())
    }

    /// Hand a change to the debouncer.
    fn enqueue(&self, uri: &Url, text: String, version: i32) {
        let change = Change {
            uri: Uri::from(uri.as_str()),
            text,
            version,
        };
        match self.debouncer.lock().as_ref() {
            Some(debouncer) => {
                if debouncer.push(change).is_err() {
                    warn!(%uri, "debouncer stopped, dropping change");
                }
            }
            None => debug!(%uri, "server shutting down, dropping change"),
        }
    }

    /// Resolve an editor position in `uri` to a byte offset and the text it
    /// indexes into.
    fn text_at(&self, uri: &Url, position: Position) -> Option<(Arc<str>, u32)> {
        let documents = self.workspace.documents.read();
        let doc = documents.get(uri.as_str())?;
        let offset = position_to_offset(&doc.text, convert::core_position(position));
        Some((Arc::clone(&doc.text), offset))
    }
}

/// Folders to load at startup: the workspace folders, else the root uri.
fn workspace_roots(params: &InitializeParams) -> Vec<PathBuf> {
    let folders: Vec<PathBuf> = params
        .workspace_folders
        .iter()
        .flatten()
        .filter_map(|folder| folder.uri.to_file_path().ok())
        .collect();
    if !folders.is_empty() {
        return folders;
    }

    #[allow(deprecated)]
    let root = params.root_uri.as_ref();
    root.and_then(|uri| uri.to_file_path().ok())
        .into_iter()
        .collect()
}

#[tower_lsp::async_trait]
impl LanguageServer for FormalityLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        *self.roots.write() = workspace_roots(&params);

        let options = InitializationOptions::from_value(params.initialization_options);
        let applied = options.and_then(|options| self.config.read().clone().apply(options));
        match applied {
            Ok(config) => {
                if let Some(debouncer) = self.debouncer.lock().as_ref() {
                    if debouncer.configure(config.debounce_config()).is_err() {
                        warn!("debouncer stopped before configuration");
                    }
                }
                *self.config.write() = config;
            }
            Err(err) => warn!(error = %err, "ignoring initialization options"),
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "fm-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "Formality language server initialized")
            .await;

        let roots = self.roots.read().clone();
        let source: Arc<dyn FileSource> = Arc::new(self.config.read().disk_files());
        info!(roots = roots.len(), "loading workspace");
        if self.tasks.send(Task::Startup { roots, source }).is_err() {
            warn!("analysis worker stopped before startup");
        }
    }

    async fn shutdown(&self) -> Result<()> {
        let debouncer = self.debouncer.lock().take();
        if let Some(debouncer) = debouncer {
            debouncer.shutdown().await;
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "analysis worker ended abnormally");
            }
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        let text = params.text_document.text;
        let version = params.text_document.version;

        self.workspace
            .documents
            .write()
            .open(uri.as_str(), &text, version);

        // Show what is already known until the pass for this version lands.
        if let Some(diagnostics) = self.published(&uri) {
            self.client
                .publish_diagnostics(uri.clone(), diagnostics, Some(version))
                .await;
        }
        self.enqueue(&uri, text, version);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // Full sync: the last change carries the whole document.
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let applied = self
            .workspace
            .documents
            .write()
            .apply_edit(uri.as_str(), &change.text, version);
        match applied {
            Ok(()) => {}
            Err(DocumentError::StaleVersion { version, current, .. }) => {
                warn!(%uri, version, current, "ignoring out-of-order edit");
                return;
            }
            Err(DocumentError::NotOpen(_)) => {
                debug!(%uri, "edit for unopened document, opening it");
                self.workspace
                    .documents
                    .write()
                    .open(uri.as_str(), &change.text, version);
            }
        }
        self.enqueue(&uri, change.text, version);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;

        let path = uri.to_file_path().ok();
        let source = self.config.read().disk_files();
        let snapshot = tokio::task::spawn_blocking(move || match path {
            Some(path) => source.read(&path),
            None => Err(fm_db::VfsError::NotFound(PathBuf::new())),
        })
        .await
        .unwrap_or_else(|err| {
            Err(fm_db::VfsError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other(err.to_string()),
            })
        });

        // Diagnostics stay: the file is still part of the workspace.
        let changed = {
            let mut documents = self.workspace.documents.write();
            let before = documents.text(uri.as_str()).map(str::to_string);
            if let Err(err) = documents.close(uri.as_str(), snapshot) {
                debug!(%uri, error = %err, "close for unopened document");
                return;
            }
            let after = documents.text(uri.as_str()).map(str::to_string);
            match (before, after) {
                (Some(before), Some(after)) if before != after => Some(after),
                _ => None,
            }
        };

        if let Some(text) = changed {
            debug!(%uri, "closed document differs from disk, reanalyzing");
            self.enqueue(&uri, text, 0);
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((text, offset)) = self.text_at(&uri, position) else {
            return Ok(None);
        };
        let shown = self
            .workspace
            .analyzer
            .read()
            .hover(uri.as_str(), &text, offset);
        Ok(shown.map(|shown| convert::hover(&shown)))
    }

    async fn completion(&self, _params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let analyzer = self.workspace.analyzer.read();
        let completions = analyzer
            .completions()
            .into_iter()
            .map(|def| CompletionItem {
                label: def.name().to_string(),
                kind: Some(convert::completion_kind(def.kind())),
                detail: Some(def.signature()),
                ..Default::default()
            })
            .collect();
        Ok(Some(CompletionResponse::Array(completions)))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((text, offset)) = self.text_at(&uri, position) else {
            return Ok(None);
        };

        let target = {
            let analyzer = self.workspace.analyzer.read();
            analyzer.definition(&text, offset).map(|def| {
                let documents = self.workspace.documents.read();
                let file_text = documents.text(def.file()).unwrap_or(def.source());
                let range = LineIndex::new(file_text).range(def.origin());
                (def.file().to_string(), range)
            })
        };
        let Some((file, range)) = target else {
            return Ok(None);
        };

        match Url::parse(&file) {
            Ok(target) => Ok(Some(GotoDefinitionResponse::Scalar(Location {
                uri: target,
                range: convert::range(range),
            }))),
            Err(err) => {
                warn!(%file, error = %err, "definition in file with invalid uri");
                Ok(None)
            }
        }
    }
}
