// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! The boundary between the workspace core and a language engine.
//!
//! The core never inspects definitions beyond the [`Definition`] trait and
//! only ever calls the engine through [`Engine::parse`] and
//! [`Engine::synthesize`]. Everything the engine hands back is typed: a
//! [`DefinitionSet`] or a [`ParseFailure`], and a [`Synthesis`] holding a flat
//! list of [`DiagnosticRecord`]s.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use fm_ast::span::Span;
use fm_ast::Name;
use thiserror::Error;

use crate::defs::{DefinitionSet, GlobalDefs};
use crate::Uri;

/// What kind of thing a definition names. Used for editor presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Type,
    Constructor,
    Function,
}

/// A named top-level definition produced by an engine's parser.
pub trait Definition: Clone + Send + Sync + 'static {
    /// The definition's global name.
    fn name(&self) -> &str;

    /// URI of the file that defines it.
    fn file(&self) -> &str;

    /// Byte range of the definition's name in its file.
    fn origin(&self) -> Span;

    /// Byte range of the whole definition. Defaults to [`Self::origin`].
    fn extent(&self) -> Span {
        self.origin()
    }

    /// Text of the owning file at parse time.
    fn source(&self) -> &str;

    /// Global names this definition mentions.
    fn references(&self) -> Vec<Name>;

    /// Hover and completion text.
    fn signature(&self) -> String;

    /// Hover text for a binder that is local to this definition.
    fn local(&self, _name: &str) -> Option<String> {
        None
    }

    fn kind(&self) -> DefinitionKind {
        DefinitionKind::Function
    }
}

/// Why a file could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseFailure {
    /// Byte offset of the failure.
    pub offset: u32,
    pub message: String,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

/// One diagnostic as reported by an engine, positioned by byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagnosticRecord {
    pub message: String,
    pub severity: Severity,
    pub file: Uri,
    /// Start byte offset (inclusive).
    pub from: u32,
    /// End byte offset (exclusive).
    pub upto: u32,
}

impl DiagnosticRecord {
    /// An error diagnostic covering `span` in `file`.
    pub fn error(file: impl Into<Uri>, span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            file: file.into(),
            from: span.start,
            upto: span.end,
        }
    }
}

/// Output of [`Engine::synthesize`].
#[derive(Debug, Clone)]
pub struct Synthesis<D> {
    /// Updated entries for the synthesized definitions, carrying whatever the
    /// engine attaches (inferred types, checked state).
    pub defs: Vec<D>,
    /// Every diagnostic found, in engine order.
    pub report: Vec<DiagnosticRecord>,
}

impl<D> Default for Synthesis<D> {
    fn default() -> Self {
        Self {
            defs: Vec::new(),
            report: Vec::new(),
        }
    }
}

/// An engine that could not complete a synthesis pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine signalled an unhandled case.
    #[error("engine reported an internal error: {0}")]
    Internal(String),
    /// The engine panicked.
    #[error("engine panicked: {0}")]
    Panicked(String),
}

/// A parser plus a type synthesizer for one language.
pub trait Engine: Send + Sync + 'static {
    type Def: Definition;

    /// Parse the text of `uri` into its top-level definitions.
    fn parse(&self, uri: &str, text: &str) -> Result<DefinitionSet<Self::Def>, ParseFailure>;

    /// Synthesize the definitions named in `names` against `defs`.
    ///
    /// The engine resolves whatever those roots depend on by itself.
    fn synthesize(
        &self,
        names: &[Name],
        defs: &GlobalDefs<Self::Def>,
    ) -> Result<Synthesis<Self::Def>, EngineError>;
}

/// Run `f`, turning a panic into [`EngineError::Panicked`].
pub(crate) fn contain<T>(f: impl FnOnce() -> T) -> Result<T, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| EngineError::Panicked(panic_message(payload.as_ref())))
}

/// Render a panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
