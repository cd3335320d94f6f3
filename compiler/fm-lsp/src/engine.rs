// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Binding of the Formality parser and synthesizer to the workspace core.

use fm_ast::span::Span;
use fm_ast::{Def, DefKind, Name};
use fm_db::{
    Definition, DefinitionKind, DefinitionSet, DiagnosticRecord, Engine, EngineError, GlobalDefs,
    ParseFailure, Synthesis,
};
use fm_synth::Env;

/// A Formality definition as stored by the workspace core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmDef(pub Def);

impl Definition for FmDef {
    fn name(&self) -> &str {
        &self.0.name
    }

    fn file(&self) -> &str {
        &self.0.file
    }

    fn origin(&self) -> Span {
        self.0.origin
    }

    fn extent(&self) -> Span {
        self.0.span
    }

    fn source(&self) -> &str {
        &self.0.code
    }

    fn references(&self) -> Vec<Name> {
        self.0.references().into_iter().collect()
    }

    fn signature(&self) -> String {
        self.0.signature()
    }

    fn local(&self, name: &str) -> Option<String> {
        self.0.local(name)
    }

    fn kind(&self) -> DefinitionKind {
        match self.0.kind {
            DefKind::Type { .. } => DefinitionKind::Type,
            DefKind::Ctor { .. } => DefinitionKind::Constructor,
            DefKind::Func { .. } => DefinitionKind::Function,
        }
    }
}

/// The global table seen through the synthesizer's environment.
struct Globals<'a>(&'a GlobalDefs<FmDef>);

impl Env for Globals<'_> {
    fn lookup(&self, name: &str) -> Option<&Def> {
        self.0.get(name).map(|def| &def.0)
    }
}

/// Parser and synthesizer for `.fm` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormalityEngine;

impl Engine for FormalityEngine {
    type Def = FmDef;

    fn parse(&self, uri: &str, text: &str) -> Result<DefinitionSet<FmDef>, ParseFailure> {
        match fm_parser::parse(uri, text) {
            Ok(defs) => Ok(defs.into_iter().map(FmDef).collect()),
            Err(err) => Err(ParseFailure {
                offset: err.offset(),
                message: err.to_string(),
            }),
        }
    }

    fn synthesize(
        &self,
        names: &[Name],
        defs: &GlobalDefs<FmDef>,
    ) -> Result<Synthesis<FmDef>, EngineError> {
        let out = fm_synth::synthesize(names, &Globals(defs));
        Ok(Synthesis {
            defs: out.defs.into_iter().map(FmDef).collect(),
            report: out
                .report
                .into_iter()
                .map(|reported| {
                    DiagnosticRecord::error(
                        reported.file,
                        reported.error.span(),
                        reported.error.to_string(),
                    )
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use fm_ast::SynthState;

    use super::*;

    const URI: &str = "file:///ws/Bool.fm";
    const BOOL: &str = "type Bool {\n  true,\n  false,\n}\n";

    #[test]
    fn test_parse_builds_set() {
        let set = FormalityEngine.parse(URI, BOOL).unwrap();
        let names: Vec<&str> = set.names().map(Name::as_str).collect();
        assert_eq!(names, vec!["Bool", "Bool.false", "Bool.true"]);
        assert_eq!(set.get("Bool").map(Definition::kind), Some(DefinitionKind::Type));
        assert_eq!(
            set.get("Bool.true").map(Definition::kind),
            Some(DefinitionKind::Constructor)
        );
    }

    #[test]
    fn test_parse_failure_carries_offset() {
        let failure = FormalityEngine.parse(URI, "type Bool {").unwrap_err();
        assert_eq!(failure.offset, 11);
        assert!(failure.message.contains("end of file"));
    }

    #[test]
    fn test_synthesize_reports_and_checks() {
        let mut defs: Vec<FmDef> = FormalityEngine.parse(URI, BOOL).unwrap().iter().cloned().collect();
        let not = "file:///ws/Bool/not.fm";
        defs.extend(
            FormalityEngine
                .parse(not, "Bool.not(a: Bool): bool a\n")
                .unwrap()
                .iter()
                .cloned(),
        );
        let global: GlobalDefs<FmDef> = defs.into_iter().collect();

        let out = FormalityEngine
            .synthesize(&["Bool.not".into()], &global)
            .unwrap();
        assert_eq!(out.defs.len(), 1);
        assert_eq!(out.defs[0].0.state, SynthState::Failed);

        let record = &out.report[0];
        assert_eq!(&*record.file, not);
        assert_eq!(record.message, "Undefined reference: bool\n");
        assert_eq!((record.from, record.upto), (19, 23));
    }
}
