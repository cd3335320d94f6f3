// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Synthesis errors.
//!
//! The rendered messages are what the editor shows, so each one ends with a
//! newline and multi-line messages keep one fact per line.

use fm_ast::span::Span;
use fm_ast::Name;
use thiserror::Error;

/// A type synthesis error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthError {
    #[error("Undefined reference: {name}\n")]
    Undefined { span: Span, name: Name },

    #[error("{}", render_mismatch(.expected, .detected, .context))]
    Mismatch {
        span: Span,
        expected: Name,
        detected: Name,
        /// Bindings in scope, outermost first.
        context: Vec<(Name, Name)>,
    },

    #[error("Wrong number of arguments for {name}: expected {expected}, found {found}.\n")]
    Arity {
        span: Span,
        name: Name,
        expected: usize,
        found: usize,
    },

    #[error("Missing arguments for {name}: expected {expected}.\n")]
    MissingArguments {
        span: Span,
        name: Name,
        expected: usize,
    },

    #[error("Not a function: {name}\n")]
    NotAFunction { span: Span, name: Name },

    #[error("Not a type: {name}\n")]
    NotAType { span: Span, name: Name },

    #[error("Not a term: {name}\n")]
    NotATerm { span: Span, name: Name },

    #[error("Not a constructor of {ty}: {name}\n")]
    NotAConstructor { span: Span, ty: Name, name: Name },

    #[error("Incomplete case: missing {}.\n", join_names(.missing))]
    IncompleteCase { span: Span, missing: Vec<Name> },
}

impl SynthError {
    /// Get the span of this error.
    pub fn span(&self) -> Span {
        match self {
            SynthError::Undefined { span, .. } => *span,
            SynthError::Mismatch { span, .. } => *span,
            SynthError::Arity { span, .. } => *span,
            SynthError::MissingArguments { span, .. } => *span,
            SynthError::NotAFunction { span, .. } => *span,
            SynthError::NotAType { span, .. } => *span,
            SynthError::NotATerm { span, .. } => *span,
            SynthError::NotAConstructor { span, .. } => *span,
            SynthError::IncompleteCase { span, .. } => *span,
        }
    }
}

fn join_names(names: &[Name]) -> String {
    names.iter().map(Name::as_str).collect::<Vec<_>>().join(", ")
}

fn render_mismatch(expected: &Name, detected: &Name, context: &[(Name, Name)]) -> String {
    let mut out = format!("Type mismatch.\n- Expected: {expected}\n- Detected: {detected}\n");
    if !context.is_empty() {
        out.push_str("With context:\n");
        for (name, ty) in context {
            out.push_str(&format!("- {name}: {ty}\n"));
        }
    }
    out
}
