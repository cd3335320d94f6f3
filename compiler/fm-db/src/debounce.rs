// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Coalescing bursts of edits.
//!
//! A [`Debouncer`] is a tokio task between the editor's change notifications
//! and the analysis worker. A change is delivered once its key has been
//! quiet for the configured window; only the latest change per key is kept.
//! With [`DebounceScope::PerFile`] the key is the document, with
//! [`DebounceScope::Workspace`] there is a single key for everything.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::Uri;

/// The full text of a document after an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub uri: Uri,
    pub text: String,
    pub version: i32,
}

/// Which changes supersede each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceScope {
    /// One window per document.
    #[default]
    PerFile,
    /// One window for the whole workspace.
    Workspace,
}

impl fmt::Display for DebounceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerFile => write!(f, "file"),
            Self::Workspace => write!(f, "workspace"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown debounce scope `{0}`, expected `file` or `workspace`")]
pub struct UnknownScope(pub String);

impl FromStr for DebounceScope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" | "per-file" => Ok(Self::PerFile),
            "workspace" => Ok(Self::Workspace),
            other => Err(UnknownScope(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    pub window: Duration,
    pub scope: DebounceScope,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(150),
            scope: DebounceScope::PerFile,
        }
    }
}

/// The debouncer task has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("debouncer has shut down")]
pub struct DebouncerClosed;

enum Input {
    Change(Change),
    Configure(DebounceConfig),
}

/// Handle to a running debouncer task.
pub struct Debouncer {
    input: mpsc::UnboundedSender<Input>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Start a debouncer that delivers settled changes to `output`.
    pub fn spawn(config: DebounceConfig, output: mpsc::UnboundedSender<Change>) -> Self {
        let (input, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(config, rx, output));
        Self { input, task }
    }

    pub fn push(&self, change: Change) -> Result<(), DebouncerClosed> {
        self.input
            .send(Input::Change(change))
            .map_err(|_| DebouncerClosed)
    }

    /// Change the window or scope. Pending changes keep their deadlines.
    pub fn configure(&self, config: DebounceConfig) -> Result<(), DebouncerClosed> {
        self.input
            .send(Input::Configure(config))
            .map_err(|_| DebouncerClosed)
    }

    /// Stop accepting changes, deliver whatever is pending and wait for the
    /// task to finish.
    pub async fn shutdown(self) {
        drop(self.input);
        if let Err(err) = self.task.await {
            debug!(error = %err, "debouncer task ended abnormally");
        }
    }
}

struct Pending {
    change: Change,
    deadline: Instant,
}

async fn run(
    mut config: DebounceConfig,
    mut input: mpsc::UnboundedReceiver<Input>,
    output: mpsc::UnboundedSender<Change>,
) {
    let mut pending: BTreeMap<Uri, Pending> = BTreeMap::new();

    loop {
        let next = pending.values().map(|p| p.deadline).min();

        tokio::select! {
            message = input.recv() => match message {
                Some(Input::Change(change)) => {
                    let deadline = Instant::now() + config.window;
                    if config.scope == DebounceScope::Workspace {
                        for superseded in std::mem::take(&mut pending).into_values() {
                            debug!(uri = %superseded.change.uri, "dropping superseded change");
                        }
                    }
                    if let Some(old) = pending.insert(change.uri.clone(), Pending { change, deadline }) {
                        debug!(uri = %old.change.uri, version = old.change.version, "coalesced change");
                    }
                }
                Some(Input::Configure(new)) => {
                    debug!(window = ?new.window, scope = %new.scope, "reconfigured debouncer");
                    config = new;
                }
                None => {
                    let mut rest: Vec<Pending> = pending.into_values().collect();
                    rest.sort_by_key(|p| p.deadline);
                    for p in rest {
                        if output.send(p.change).is_err() {
                            break;
                        }
                    }
                    return;
                }
            },
            _ = sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                let now = Instant::now();
                let mut due: Vec<(Instant, Uri)> = pending
                    .iter()
                    .filter(|(_, p)| p.deadline <= now)
                    .map(|(uri, p)| (p.deadline, uri.clone()))
                    .collect();
                due.sort();
                for (_, uri) in due {
                    let Some(p) = pending.remove(&uri) else {
                        continue;
                    };
                    debug!(uri = %p.change.uri, version = p.change.version, "delivering change");
                    if output.send(p.change).is_err() {
                        return;
                    }
                }
            }
        }
    }
}
