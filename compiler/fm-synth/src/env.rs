// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Global and local environments used during synthesis.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use fm_ast::{Def, Name};

/// Read access to the global definitions a synthesis pass runs against.
pub trait Env {
    fn lookup(&self, name: &str) -> Option<&Def>;
}

impl Env for BTreeMap<Name, Def> {
    fn lookup(&self, name: &str) -> Option<&Def> {
        self.get(name)
    }
}

impl<S: BuildHasher> Env for HashMap<Name, Def, S> {
    fn lookup(&self, name: &str) -> Option<&Def> {
        self.get(name)
    }
}

/// Local variable bindings mapping names to type names.
///
/// Insertion order is kept: it is the order bindings are listed in a type
/// mismatch's context.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    bindings: Vec<(Name, Name)>,
    parent: Option<Box<TypeEnv>>,
}

impl TypeEnv {
    /// Create a new empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child environment.
    pub fn child(&self) -> Self {
        Self {
            bindings: Vec::new(),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Insert a binding, shadowing any outer one with the same name.
    pub fn insert(&mut self, name: Name, ty: Name) {
        self.bindings.push((name, ty));
    }

    /// Look up a binding.
    pub fn lookup(&self, name: &str) -> Option<&Name> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, ty)| ty)
            .or_else(|| self.parent.as_ref().and_then(|p| p.lookup(name)))
    }

    /// Every visible binding, outermost first, shadowed ones dropped.
    pub fn context(&self) -> Vec<(Name, Name)> {
        let mut out = self
            .parent
            .as_ref()
            .map(|p| p.context())
            .unwrap_or_default();
        for (name, ty) in &self.bindings {
            out.retain(|(bound, _)| bound != name);
            out.push((name.clone(), ty.clone()));
        }
        out
    }
}
