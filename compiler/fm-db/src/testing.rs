// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! A line-oriented engine for unit tests.
//!
//! Each non-empty line is `name: ref ref ...`. A line starting with `!` is a
//! parse error. Synthesis reports every reference that is not defined, and
//! panics when asked to check a definition named `panic`.

use std::sync::Arc;

use fm_ast::span::Span;
use fm_ast::Name;

use crate::defs::{DefinitionSet, GlobalDefs};
use crate::engine::{Definition, DiagnosticRecord, Engine, EngineError, ParseFailure, Synthesis};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDef {
    pub name: Name,
    pub file: Arc<str>,
    pub origin: Span,
    pub extent: Span,
    pub source: Arc<str>,
    pub refs: Vec<(Name, Span)>,
    pub checked: bool,
}

impl TestDef {
    pub fn new(file: &str, name: &str) -> Self {
        Self {
            name: Name::from(name),
            file: Arc::from(file),
            origin: Span::empty(0),
            extent: Span::empty(0),
            source: Arc::from(""),
            refs: Vec::new(),
            checked: false,
        }
    }

    pub fn referring(mut self, names: &[&str]) -> Self {
        self.refs = names
            .iter()
            .map(|name| (Name::from(*name), Span::empty(0)))
            .collect();
        self
    }
}

impl Definition for TestDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn file(&self) -> &str {
        &self.file
    }

    fn origin(&self) -> Span {
        self.origin
    }

    fn extent(&self) -> Span {
        self.extent
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn references(&self) -> Vec<Name> {
        self.refs.iter().map(|(name, _)| name.clone()).collect()
    }

    fn signature(&self) -> String {
        let checked = if self.checked { " (checked)" } else { "" };
        format!("{}{checked}", self.name)
    }

    fn local(&self, name: &str) -> Option<String> {
        (name == "self").then(|| format!("self: {}", self.name))
    }
}

#[derive(Debug, Default)]
pub struct TestEngine;

fn words(line: &str, base: usize) -> impl Iterator<Item = (&str, Span)> {
    line.split(' ').scan(0usize, move |at, word| {
        let start = base + *at;
        *at += word.len() + 1;
        Some((word, Span::new(start as u32, (start + word.len()) as u32)))
    })
}

impl Engine for TestEngine {
    type Def = TestDef;

    fn parse(&self, uri: &str, text: &str) -> Result<DefinitionSet<TestDef>, ParseFailure> {
        let source: Arc<str> = Arc::from(text);
        let mut set = DefinitionSet::new();
        let mut base = 0;
        for line in text.split('\n') {
            let line_start = base;
            base += line.len() + 1;
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with('!') {
                return Err(ParseFailure {
                    offset: line_start as u32,
                    message: "unexpected `!`".to_string(),
                });
            }
            let mut parts = words(line, line_start).filter(|(w, _)| !w.is_empty());
            let Some((head, origin)) = parts.next() else {
                continue;
            };
            let name = head.trim_end_matches(':');
            let def = TestDef {
                name: Name::from(name),
                file: Arc::from(uri),
                origin: Span::new(origin.start, origin.start + name.len() as u32),
                extent: Span::new(line_start as u32, (line_start + line.len()) as u32),
                source: Arc::clone(&source),
                refs: parts.map(|(w, span)| (Name::from(w), span)).collect(),
                checked: false,
            };
            if set.insert(def).is_some() {
                return Err(ParseFailure {
                    offset: origin.start,
                    message: format!("duplicate `{name}`"),
                });
            }
        }
        Ok(set)
    }

    fn synthesize(
        &self,
        names: &[Name],
        defs: &GlobalDefs<TestDef>,
    ) -> Result<Synthesis<TestDef>, EngineError> {
        let mut out = Synthesis::default();
        for name in names {
            let Some(def) = defs.get(name) else {
                continue;
            };
            if def.name == "panic" {
                panic!("cannot check `panic`");
            }
            if def.name == "internal" {
                return Err(EngineError::Internal("unhandled definition".to_string()));
            }
            for (reference, span) in &def.refs {
                if !defs.contains(reference) {
                    out.report.push(DiagnosticRecord::error(
                        Arc::clone(&def.file),
                        *span,
                        format!("Undefined reference: {reference}\n"),
                    ));
                }
            }
            let mut checked = def.clone();
            checked.checked = true;
            out.defs.push(checked);
        }
        Ok(out)
    }
}
