// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Server configuration.
//!
//! Settings come from the command line first and may then be overridden by
//! the client's `initializationOptions`:
//!
//! ```json
//! { "debounceMs": 200, "debounceScope": "workspace", "extensions": ["fm"] }
//! ```

use std::time::Duration;

use clap::Parser;
use fm_db::debounce::{DebounceConfig, DebounceScope, UnknownScope};
use fm_db::DiskFiles;
use serde::Deserialize;
use thiserror::Error;

/// Longest accepted debounce window.
pub const MAX_DEBOUNCE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid initialization options: {0}")]
    Options(#[from] serde_json::Error),
    #[error(transparent)]
    Scope(#[from] UnknownScope),
    #[error("debounce window of {0} ms is longer than the 10000 ms maximum")]
    DebounceTooLong(u64),
    #[error("at least one source file extension is required")]
    NoExtensions,
}

/// Settings for one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Quiet time before an edit is analyzed.
    pub debounce: Duration,
    pub scope: DebounceScope,
    /// Source file extensions, without the dot.
    pub extensions: Vec<String>,
    /// Directory names skipped during workspace discovery. Hidden
    /// directories are always skipped.
    pub ignore_dirs: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            scope: DebounceScope::PerFile,
            extensions: vec!["fm".to_string()],
            ignore_dirs: vec!["target".to_string(), "node_modules".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_scope(mut self, scope: DebounceScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_ignore_dirs(mut self, ignore_dirs: Vec<String>) -> Self {
        self.ignore_dirs = ignore_dirs;
        self
    }

    pub fn debounce_config(&self) -> DebounceConfig {
        DebounceConfig {
            window: self.debounce,
            scope: self.scope,
        }
    }

    /// The file source used for workspace discovery.
    pub fn disk_files(&self) -> DiskFiles {
        DiskFiles::new(self.extensions.clone(), self.ignore_dirs.clone())
    }

    /// Apply client overrides on top of this configuration.
    pub fn apply(mut self, options: InitializationOptions) -> Result<Self, ConfigError> {
        if let Some(ms) = options.debounce_ms {
            self.debounce = checked_debounce(ms)?;
        }
        if let Some(scope) = options.debounce_scope {
            self.scope = scope.parse()?;
        }
        if let Some(extensions) = options.extensions {
            if extensions.is_empty() {
                return Err(ConfigError::NoExtensions);
            }
            self.extensions = extensions;
        }
        if let Some(ignore_dirs) = options.ignore_dirs {
            self.ignore_dirs = ignore_dirs;
        }
        Ok(self)
    }
}

fn checked_debounce(ms: u64) -> Result<Duration, ConfigError> {
    let window = Duration::from_millis(ms);
    if window > MAX_DEBOUNCE {
        return Err(ConfigError::DebounceTooLong(ms));
    }
    Ok(window)
}

/// Overrides sent by the client in `initializationOptions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializationOptions {
    pub debounce_ms: Option<u64>,
    pub debounce_scope: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub ignore_dirs: Option<Vec<String>>,
}

impl InitializationOptions {
    /// Decode the raw options. Absent or `null` options mean no overrides.
    pub fn from_value(value: Option<serde_json::Value>) -> Result<Self, ConfigError> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }
}

/// Formality language server
#[derive(Debug, Parser)]
#[command(name = "fm-lsp", version, about)]
pub struct Cli {
    /// Quiet time in milliseconds before an edit is analyzed
    #[arg(long, default_value_t = 150)]
    pub debounce_ms: u64,

    /// Debounce per `file` or across the whole `workspace`
    #[arg(long, default_value_t = DebounceScope::PerFile)]
    pub debounce_scope: DebounceScope,

    /// Source file extension, repeatable
    #[arg(long = "extension", default_value = "fm")]
    pub extensions: Vec<String>,

    /// Directory name to skip during discovery, repeatable
    #[arg(long = "ignore-dir", default_values_t = ["target".to_string(), "node_modules".to_string()])]
    pub ignore_dirs: Vec<String>,

    /// Log filter, overriding FM_LSP_LOG
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Accepted for client compatibility; stdio is the only transport
    #[arg(long, hide = true)]
    pub stdio: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        if self.extensions.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        Ok(ServerConfig::new()
            .with_debounce(checked_debounce(self.debounce_ms)?)
            .with_scope(self.debounce_scope)
            .with_extensions(self.extensions)
            .with_ignore_dirs(self.ignore_dirs))
    }
}
