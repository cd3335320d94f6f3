// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Abstract syntax tree for the Formality reference language.
//!
//! A source file is a list of top-level items. Each item expands into one or
//! more named [`Def`]s: a `type` item defines the type itself plus one
//! definition per constructor (`Bool`, `Bool.true`, `Bool.false`), and a
//! function item defines exactly one name.
//!
//! Definitions keep a shared handle to the text of the file they came from,
//! so a definition can always be located even after its file has been closed
//! in the editor.

pub mod span;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use span::Span;

/// Name of a top-level definition or local binder.
pub type Name = SmolStr;

/// An identifier with its source span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: Name,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<Name>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// A typed binder: a function parameter or a constructor field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Ident,
    pub ty: Ident,
}

/// A term with its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub kind: TermKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermKind {
    /// A variable or a global definition.
    Ref(Name),
    /// `f(a, b)`
    App { func: Ident, args: Vec<Term> },
    /// `case x { ctor: term, ... }`
    Case {
        scrutinee: Ident,
        branches: Vec<Branch>,
    },
}

/// One arm of a `case`, keyed by the unqualified constructor name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub ctor: Ident,
    pub body: Term,
}

/// What a definition is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefKind {
    /// `type Bool { true, false }`. Constructor names are fully qualified.
    Type { ctors: Vec<Name> },
    /// A constructor of `owner`.
    Ctor { owner: Ident, fields: Vec<Param> },
    /// `name(params): ret body`
    Func {
        params: Vec<Param>,
        ret: Ident,
        body: Term,
    },
}

/// Where a definition stands with respect to type synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SynthState {
    /// Parsed but never synthesized.
    #[default]
    Parsed,
    /// Synthesized without errors.
    Checked,
    /// Synthesized and produced at least one diagnostic.
    Failed,
}

/// A named top-level definition.
#[derive(Debug, Clone)]
pub struct Def {
    pub name: Name,
    /// URI of the file that defines this name.
    pub file: Arc<str>,
    /// Full text of `file` at parse time.
    pub code: Arc<str>,
    /// Span of the definition's name.
    pub origin: Span,
    /// Span of the whole item.
    pub span: Span,
    pub kind: DefKind,
    pub state: SynthState,
}

impl PartialEq for Def {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.file == other.file
            && self.origin == other.origin
            && self.span == other.span
            && self.kind == other.kind
            && self.state == other.state
    }
}

impl Eq for Def {}

impl Def {
    /// Names that must be resolved globally for this definition to check.
    ///
    /// Local binders (parameters and case-bound fields) are excluded.
    pub fn references(&self) -> BTreeSet<Name> {
        let mut out = BTreeSet::new();
        match &self.kind {
            DefKind::Type { ctors } => {
                out.extend(ctors.iter().cloned());
            }
            DefKind::Ctor { owner, fields } => {
                out.insert(owner.name.clone());
                out.extend(fields.iter().map(|f| f.ty.name.clone()));
            }
            DefKind::Func { params, ret, body } => {
                out.extend(params.iter().map(|p| p.ty.name.clone()));
                out.insert(ret.name.clone());
                let mut locals: Vec<Name> = params.iter().map(|p| p.name.name.clone()).collect();
                collect_refs(body, &mut locals, &mut out);
            }
        }
        out.remove(&self.name);
        out
    }

    /// Parameters in scope for the whole body, if any.
    pub fn params(&self) -> &[Param] {
        match &self.kind {
            DefKind::Func { params, .. } => params,
            DefKind::Ctor { fields, .. } => fields,
            DefKind::Type { .. } => &[],
        }
    }

    /// Hover text for a binder local to this definition.
    pub fn local(&self, name: &str) -> Option<String> {
        self.params()
            .iter()
            .find(|p| p.name.name == name)
            .map(|p| format!("{}: {}", p.name.name, p.ty.name))
    }

    /// One-line signature shown on hover and completion.
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

fn collect_refs(term: &Term, locals: &mut Vec<Name>, out: &mut BTreeSet<Name>) {
    match &term.kind {
        TermKind::Ref(name) => {
            if !locals.contains(name) {
                out.insert(name.clone());
            }
        }
        TermKind::App { func, args } => {
            if !locals.contains(&func.name) {
                out.insert(func.name.clone());
            }
            for arg in args {
                collect_refs(arg, locals, out);
            }
        }
        TermKind::Case {
            scrutinee,
            branches,
        } => {
            if !locals.contains(&scrutinee.name) {
                out.insert(scrutinee.name.clone());
            }
            for branch in branches {
                collect_refs(&branch.body, locals, out);
            }
        }
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    write!(f, "(")?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", param.name.name, param.ty.name)?;
    }
    write!(f, ")")
}

impl fmt::Display for Def {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DefKind::Type { ctors } => {
                write!(f, "type {} {{", self.name)?;
                for (i, ctor) in ctors.iter().enumerate() {
                    let short = ctor.rsplit('.').next().unwrap_or(ctor.as_str());
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {short}")?;
                }
                write!(f, " }}")
            }
            DefKind::Ctor { owner, fields } => {
                write!(f, "{}", self.name)?;
                if !fields.is_empty() {
                    write_params(f, fields)?;
                }
                write!(f, ": {}", owner.name)
            }
            DefKind::Func { params, ret, .. } => {
                write!(f, "{}", self.name)?;
                write_params(f, params)?;
                write!(f, ": {}", ret.name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Ident {
        Ident::new(name, Span::default())
    }

    fn def(name: &str, kind: DefKind) -> Def {
        Def {
            name: name.into(),
            file: Arc::from("file:///t.fm"),
            code: Arc::from(""),
            origin: Span::default(),
            span: Span::default(),
            kind,
            state: SynthState::Parsed,
        }
    }

    #[test]
    fn test_func_signature() {
        let not = def(
            "Bool.not",
            DefKind::Func {
                params: vec![Param {
                    name: ident("a"),
                    ty: ident("Bool"),
                }],
                ret: ident("Bool"),
                body: Term {
                    kind: TermKind::Ref("a".into()),
                    span: Span::default(),
                },
            },
        );
        assert_eq!(not.signature(), "Bool.not(a: Bool): Bool");
        assert_eq!(not.local("a").as_deref(), Some("a: Bool"));
        assert_eq!(not.local("b"), None);
    }

    #[test]
    fn test_type_signature() {
        let bool_ty = def(
            "Bool",
            DefKind::Type {
                ctors: vec!["Bool.true".into(), "Bool.false".into()],
            },
        );
        assert_eq!(bool_ty.signature(), "type Bool { true, false }");
    }

    #[test]
    fn test_references_skip_locals_and_self() {
        let body = Term {
            kind: TermKind::App {
                func: ident("Bool.and"),
                args: vec![
                    Term {
                        kind: TermKind::Ref("a".into()),
                        span: Span::default(),
                    },
                    Term {
                        kind: TermKind::Ref("Bool.true".into()),
                        span: Span::default(),
                    },
                ],
            },
            span: Span::default(),
        };
        let f = def(
            "f",
            DefKind::Func {
                params: vec![Param {
                    name: ident("a"),
                    ty: ident("Bool"),
                }],
                ret: ident("Bool"),
                body,
            },
        );
        let refs: Vec<_> = f.references().into_iter().collect();
        assert_eq!(refs, vec!["Bool", "Bool.and", "Bool.true"]);
    }
}
