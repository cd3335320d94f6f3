// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Type synthesis for the Formality reference language.
//!
//! [`synthesize`] checks a list of root definitions against a global
//! environment. Each root is checked against the *signatures* of the
//! definitions it mentions, so dependencies never need to be re-checked for a
//! root to be judged. Types are compared by name.
//!
//! Checking is bidirectional in the simplest sense: terms with an expected
//! type are checked against it, everything else is inferred and compared.
//! A bare name that does not resolve is retried as a constructor of the
//! expected type, so `case a { true: false, ... }` reads as `Bool.false` when
//! a `Bool` is expected.

mod env;
mod error;

use std::sync::Arc;

use fm_ast::{Def, DefKind, Ident, Name, SynthState, Term, TermKind};

pub use env::{Env, TypeEnv};
pub use error::SynthError;

/// An error attributed to the file it occurred in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reported {
    pub file: Arc<str>,
    pub error: SynthError,
}

/// Output of a synthesis pass.
#[derive(Debug, Clone, Default)]
pub struct Synthesis {
    /// The roots that were found, with their synthesis state updated.
    pub defs: Vec<Def>,
    /// Errors in root order, then source order within each root.
    pub report: Vec<Reported>,
}

/// Check every definition named in `names` against `env`.
///
/// Names that are not in `env` are skipped.
pub fn synthesize<E: Env + ?Sized>(names: &[Name], env: &E) -> Synthesis {
    let mut out = Synthesis::default();
    for name in names {
        let Some(def) = env.lookup(name) else {
            continue;
        };
        let errors = check_def(def, env);
        let mut checked = def.clone();
        checked.state = if errors.is_empty() {
            SynthState::Checked
        } else {
            SynthState::Failed
        };
        out.report.extend(errors.into_iter().map(|error| Reported {
            file: Arc::clone(&def.file),
            error,
        }));
        out.defs.push(checked);
    }
    out
}

/// Check a single definition, returning every error found in it.
pub fn check_def<E: Env + ?Sized>(def: &Def, env: &E) -> Vec<SynthError> {
    let mut checker = Checker {
        env,
        errors: Vec::new(),
    };
    match &def.kind {
        DefKind::Type { .. } => {}
        DefKind::Ctor { fields, .. } => {
            for field in fields {
                checker.resolve_type(&field.ty);
            }
        }
        DefKind::Func { params, ret, body } => {
            let mut locals = TypeEnv::new();
            for param in params {
                checker.resolve_type(&param.ty);
                locals.insert(param.name.name.clone(), param.ty.name.clone());
            }
            checker.resolve_type(ret);
            checker.check(body, &ret.name, &locals);
        }
    }
    checker.errors
}

struct Checker<'a, E: Env + ?Sized> {
    env: &'a E,
    errors: Vec<SynthError>,
}

/// How a global name can be used in term position.
struct Callable {
    params: Vec<Name>,
    ret: Name,
}

impl<E: Env + ?Sized> Checker<'_, E> {
    /// Report a type annotation that does not name a type.
    fn resolve_type(&mut self, ty: &Ident) {
        match self.env.lookup(&ty.name) {
            Some(Def {
                kind: DefKind::Type { .. },
                ..
            }) => {}
            Some(_) => self.errors.push(SynthError::NotAType {
                span: ty.span,
                name: ty.name.clone(),
            }),
            None => self.errors.push(SynthError::Undefined {
                span: ty.span,
                name: ty.name.clone(),
            }),
        }
    }

    fn callable(&self, name: &str) -> Option<Result<Callable, ()>> {
        let def = self.env.lookup(name)?;
        Some(match &def.kind {
            DefKind::Ctor { owner, fields } => Ok(Callable {
                params: fields.iter().map(|f| f.ty.name.clone()).collect(),
                ret: owner.name.clone(),
            }),
            DefKind::Func { params, ret, .. } => Ok(Callable {
                params: params.iter().map(|p| p.ty.name.clone()).collect(),
                ret: ret.name.clone(),
            }),
            DefKind::Type { .. } => Err(()),
        })
    }

    fn check(&mut self, term: &Term, expected: &Name, locals: &TypeEnv) {
        match &term.kind {
            TermKind::Case {
                scrutinee,
                branches,
            } => {
                let branch_env = self.case_type(scrutinee, locals);
                match branch_env {
                    Some((ty, ctors)) => {
                        let mut missing: Vec<Name> =
                            ctors.iter().map(|(short, _)| short.clone()).collect();
                        for branch in branches {
                            let found = ctors.iter().find(|(short, _)| *short == branch.ctor.name);
                            let mut inner = locals.child();
                            match found {
                                Some((short, fields)) => {
                                    missing.retain(|m| m != short);
                                    for (field, field_ty) in fields {
                                        inner.insert(
                                            format!("{}.{}", scrutinee.name, field).into(),
                                            field_ty.clone(),
                                        );
                                    }
                                }
                                None => self.errors.push(SynthError::NotAConstructor {
                                    span: branch.ctor.span,
                                    ty: ty.clone(),
                                    name: branch.ctor.name.clone(),
                                }),
                            }
                            self.check(&branch.body, expected, &inner);
                        }
                        if !missing.is_empty() {
                            self.errors.push(SynthError::IncompleteCase {
                                span: term.span,
                                missing,
                            });
                        }
                    }
                    None => {
                        for branch in branches {
                            self.check(&branch.body, expected, locals);
                        }
                    }
                }
            }
            TermKind::Ref(name)
                if locals.lookup(name).is_none() && self.env.lookup(name).is_none() =>
            {
                let qualified = format!("{expected}.{name}");
                match self.env.lookup(&qualified) {
                    Some(Def {
                        kind: DefKind::Ctor { fields, .. },
                        ..
                    }) if fields.is_empty() => {}
                    _ => self.errors.push(SynthError::Undefined {
                        span: term.span,
                        name: name.clone(),
                    }),
                }
            }
            _ => {
                if let Some(detected) = self.infer(term, locals) {
                    if &detected != expected {
                        self.errors.push(SynthError::Mismatch {
                            span: term.span,
                            expected: expected.clone(),
                            detected,
                            context: locals.context(),
                        });
                    }
                }
            }
        }
    }

    /// Infer the type of `term`, or `None` if an error was already reported.
    fn infer(&mut self, term: &Term, locals: &TypeEnv) -> Option<Name> {
        match &term.kind {
            TermKind::Ref(name) => {
                if let Some(ty) = locals.lookup(name) {
                    return Some(ty.clone());
                }
                match self.callable(name) {
                    Some(Ok(callable)) if callable.params.is_empty() => Some(callable.ret),
                    Some(Ok(callable)) => {
                        self.errors.push(SynthError::MissingArguments {
                            span: term.span,
                            name: name.clone(),
                            expected: callable.params.len(),
                        });
                        None
                    }
                    Some(Err(())) => {
                        self.errors.push(SynthError::NotATerm {
                            span: term.span,
                            name: name.clone(),
                        });
                        None
                    }
                    None => {
                        self.errors.push(SynthError::Undefined {
                            span: term.span,
                            name: name.clone(),
                        });
                        None
                    }
                }
            }
            TermKind::App { func, args } => {
                let callable = if locals.lookup(&func.name).is_some() {
                    self.errors.push(SynthError::NotAFunction {
                        span: func.span,
                        name: func.name.clone(),
                    });
                    None
                } else {
                    match self.callable(&func.name) {
                        Some(Ok(callable)) => Some(callable),
                        Some(Err(())) => {
                            self.errors.push(SynthError::NotAFunction {
                                span: func.span,
                                name: func.name.clone(),
                            });
                            None
                        }
                        None => {
                            self.errors.push(SynthError::Undefined {
                                span: func.span,
                                name: func.name.clone(),
                            });
                            None
                        }
                    }
                };

                let Some(callable) = callable else {
                    for arg in args {
                        self.infer(arg, locals);
                    }
                    return None;
                };

                if callable.params.len() != args.len() {
                    self.errors.push(SynthError::Arity {
                        span: term.span,
                        name: func.name.clone(),
                        expected: callable.params.len(),
                        found: args.len(),
                    });
                }
                for (i, arg) in args.iter().enumerate() {
                    match callable.params.get(i) {
                        Some(param) => self.check(arg, param, locals),
                        None => {
                            self.infer(arg, locals);
                        }
                    }
                }
                Some(callable.ret)
            }
            TermKind::Case { branches, .. } => {
                // Without an expected type the first branch decides. Its
                // errors are dropped here and reported by the full check.
                let first = branches.first()?;
                let reported = self.errors.len();
                let ty = self.infer(&first.body, locals);
                self.errors.truncate(reported);
                let ty = ty?;
                self.check(term, &ty, locals);
                Some(ty)
            }
        }
    }

    /// Resolve the scrutinee of a `case` to its type and constructors.
    ///
    /// Constructors are returned unqualified, with their field binders.
    #[allow(clippy::type_complexity)]
    fn case_type(
        &mut self,
        scrutinee: &Ident,
        locals: &TypeEnv,
    ) -> Option<(Name, Vec<(Name, Vec<(Name, Name)>)>)> {
        let scrutinee_term = Term {
            kind: TermKind::Ref(scrutinee.name.clone()),
            span: scrutinee.span,
        };
        let ty = self.infer(&scrutinee_term, locals)?;
        let Some(Def {
            kind: DefKind::Type { ctors },
            ..
        }) = self.env.lookup(&ty)
        else {
            // The annotation was already reported when it was resolved.
            return None;
        };

        let mut out = Vec::with_capacity(ctors.len());
        for ctor in ctors {
            let short: Name = ctor
                .strip_prefix(&format!("{ty}."))
                .unwrap_or(ctor.as_str())
                .into();
            let fields = match self.env.lookup(ctor) {
                Some(Def {
                    kind: DefKind::Ctor { fields, .. },
                    ..
                }) => fields
                    .iter()
                    .map(|f| (f.name.name.clone(), f.ty.name.clone()))
                    .collect(),
                _ => Vec::new(),
            };
            out.push((short, fields));
        }
        Some((ty, out))
    }
}
