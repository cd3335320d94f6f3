// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Parser error types.

use fm_ast::span::Span;
use fm_ast::Name;
use thiserror::Error;

use crate::lexer::{Token, TokenKind};

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A parsing error. Parsing stops at the first one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        span: Span,
        found: String,
        expected: String,
    },

    #[error("unexpected end of file, expected {expected}")]
    UnexpectedEof { span: Span, expected: String },

    #[error("invalid character")]
    InvalidCharacter { span: Span },

    #[error("duplicate definition: {name}")]
    Duplicate { span: Span, name: Name },

    #[error("terms nested deeper than {limit} levels")]
    TooDeep { span: Span, limit: usize },
}

impl ParseError {
    /// Create an error for `token` when `expected` was required.
    pub fn unexpected(token: &Token, expected: &str) -> Self {
        match token.kind {
            TokenKind::Eof => Self::UnexpectedEof {
                span: token.span,
                expected: expected.to_string(),
            },
            TokenKind::Error => Self::InvalidCharacter { span: token.span },
            ref kind => Self::UnexpectedToken {
                span: token.span,
                found: kind.to_string(),
                expected: expected.to_string(),
            },
        }
    }

    /// Get the span of this error.
    pub fn span(&self) -> Span {
        match self {
            Self::UnexpectedToken { span, .. } => *span,
            Self::UnexpectedEof { span, .. } => *span,
            Self::InvalidCharacter { span } => *span,
            Self::Duplicate { span, .. } => *span,
            Self::TooDeep { span, .. } => *span,
        }
    }

    /// Byte offset at which parsing failed.
    pub fn offset(&self) -> u32 {
        self.span().start
    }
}
