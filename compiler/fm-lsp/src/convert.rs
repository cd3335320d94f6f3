// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Conversions between workspace core types and protocol types.

use fm_db::{DefinitionKind, Severity};
use tower_lsp::lsp_types::{
    CompletionItemKind, Diagnostic, DiagnosticSeverity, Hover, HoverContents, MarkupContent,
    MarkupKind, Position, Range,
};

/// Name reported as the `source` of every diagnostic.
pub const DIAGNOSTIC_SOURCE: &str = "formality";

pub fn position(position: fm_db::Position) -> Position {
    Position::new(position.line, position.character)
}

pub fn core_position(position: Position) -> fm_db::Position {
    fm_db::Position::new(position.line, position.character)
}

pub fn range(range: fm_db::Range) -> Range {
    Range::new(position(range.start), position(range.end))
}

pub fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

pub fn diagnostic(diagnostic: fm_db::Diagnostic) -> Diagnostic {
    Diagnostic {
        range: range(diagnostic.range),
        severity: Some(severity(diagnostic.severity)),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diagnostic.message,
        ..Default::default()
    }
}

pub fn completion_kind(kind: DefinitionKind) -> CompletionItemKind {
    match kind {
        DefinitionKind::Type => CompletionItemKind::CLASS,
        DefinitionKind::Constructor => CompletionItemKind::CONSTRUCTOR,
        DefinitionKind::Function => CompletionItemKind::FUNCTION,
    }
}

/// Hover showing `text` as a code block.
pub fn hover(text: &str) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("```formality\n{text}\n```"),
        }),
        range: None,
    }
}
