// SPDX-License-Identifier: PMPL-1.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

//! Per-file definition sets and the workspace-wide name table.
//!
//! [`DefinitionStore`] is the only writer of [`GlobalDefs`]. It keeps the set
//! each file contributed at its last successful parse, so a file's old names
//! can be withdrawn before its new ones are added and a stale name never
//! survives a reparse.
//!
//! When two files define the same name the newest parse wins. The loser's
//! definition is not forgotten: if the winner later drops the name, the most
//! recently parsed remaining owner is reinstated.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use fm_ast::Name;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::Definition;
use crate::Uri;

/// The definitions produced by parsing one file, keyed by name.
#[derive(Debug, Clone)]
pub struct DefinitionSet<D> {
    defs: BTreeMap<Name, Arc<D>>,
}

impl<D> Default for DefinitionSet<D> {
    fn default() -> Self {
        Self {
            defs: BTreeMap::new(),
        }
    }
}

impl<D: Definition> DefinitionSet<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, returning the one it replaced.
    pub fn insert(&mut self, def: D) -> Option<Arc<D>> {
        self.defs.insert(Name::from(def.name()), Arc::new(def))
    }

    pub fn get(&self, name: &str) -> Option<&D> {
        self.defs.get(name).map(Arc::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.defs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &D> {
        self.defs.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl<D: Definition> FromIterator<D> for DefinitionSet<D> {
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        let mut set = Self::new();
        for def in iter {
            set.insert(def);
        }
        set
    }
}

/// The workspace-wide name table.
///
/// Every entry is owned by exactly one file, reachable through
/// [`Definition::file`]. Cloning is shallow.
#[derive(Debug, Clone)]
pub struct GlobalDefs<D> {
    defs: BTreeMap<Name, Arc<D>>,
}

impl<D> Default for GlobalDefs<D> {
    fn default() -> Self {
        Self {
            defs: BTreeMap::new(),
        }
    }
}

impl<D: Definition> GlobalDefs<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&D> {
        self.defs.get(name).map(Arc::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// URI of the file that owns `name`.
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.get(name).map(Definition::file)
    }

    /// All names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.defs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &D)> {
        self.defs.iter().map(|(name, def)| (name, def.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub(crate) fn insert(&mut self, name: Name, def: Arc<D>) -> Option<Arc<D>> {
        self.defs.insert(name, def)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<D>> {
        self.defs.remove(name)
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Name, &D) -> bool) {
        self.defs.retain(|name, def| keep(name, def));
    }

    pub(crate) fn clear(&mut self) {
        self.defs.clear();
    }
}

impl<D: Definition> FromIterator<D> for GlobalDefs<D> {
    fn from_iter<I: IntoIterator<Item = D>>(iter: I) -> Self {
        let defs = iter
            .into_iter()
            .map(|def| (Name::from(def.name()), Arc::new(def)))
            .collect();
        Self { defs }
    }
}

/// A file left out of a full rebuild because a name it defines is already
/// owned by a file merged before it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}: `{name}` is already defined in {owner}")]
pub struct MergeConflict {
    pub file: Uri,
    pub name: Name,
    pub owner: Uri,
}

/// Names affected by one [`DefinitionStore::record_parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recorded {
    /// Names the file defines now.
    pub added: BTreeSet<Name>,
    /// Names the file defined before and no longer does.
    pub removed: BTreeSet<Name>,
    /// Names that were taken over from another file.
    pub shadowed: BTreeSet<Name>,
}

impl Recorded {
    /// Every name whose global entry may have changed.
    pub fn touched(&self) -> BTreeSet<Name> {
        self.added.union(&self.removed).cloned().collect()
    }
}

#[derive(Debug, Clone)]
struct FileEntry<D> {
    set: DefinitionSet<D>,
    /// Parse sequence number; higher is newer.
    parsed: u64,
}

/// Owner of [`GlobalDefs`] and of the per-file sets it is built from.
#[derive(Debug, Clone)]
pub struct DefinitionStore<D> {
    files: FxHashMap<Uri, FileEntry<D>>,
    global: GlobalDefs<D>,
    known: BTreeSet<Uri>,
    clock: u64,
}

impl<D> Default for DefinitionStore<D> {
    fn default() -> Self {
        Self {
            files: FxHashMap::default(),
            global: GlobalDefs::default(),
            known: BTreeSet::new(),
            clock: 0,
        }
    }
}

impl<D: Definition> DefinitionStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> &GlobalDefs<D> {
        &self.global
    }

    /// The set `uri` contributed at its last successful parse.
    pub fn file_defs(&self, uri: &str) -> Option<&DefinitionSet<D>> {
        self.files.get(uri).map(|entry| &entry.set)
    }

    /// Every file that has parsed successfully at least once.
    pub fn all_known_files(&self) -> &BTreeSet<Uri> {
        &self.known
    }

    /// Replace the contribution of `uri` with `set`.
    ///
    /// Names the file no longer defines are withdrawn first, reinstating any
    /// definition they were shadowing. The new names then take over the
    /// global table.
    pub fn record_parse(&mut self, uri: &str, set: DefinitionSet<D>) -> Recorded {
        let uri: Uri = Arc::from(uri);
        let mut recorded = Recorded::default();

        if let Some(old) = self.files.remove(&uri) {
            for name in old.set.names() {
                if !set.contains(name) {
                    recorded.removed.insert(name.clone());
                }
                if self.global.owner(name) == Some(&*uri) {
                    self.global.remove(name);
                    self.reinstate(name);
                }
            }
        }

        self.clock += 1;
        for (name, def) in &set.defs {
            if let Some(owner) = self.global.owner(name) {
                if owner != &*uri {
                    warn!(name = %name, %owner, file = %uri, "definition shadows another file");
                    recorded.shadowed.insert(name.clone());
                }
            }
            self.global.insert(name.clone(), Arc::clone(def));
            recorded.added.insert(name.clone());
        }

        debug!(
            file = %uri,
            added = recorded.added.len(),
            removed = recorded.removed.len(),
            "recorded parse"
        );
        self.files.insert(
            Arc::clone(&uri),
            FileEntry {
                set,
                parsed: self.clock,
            },
        );
        self.known.insert(uri);
        recorded
    }

    /// Rebuild the global table from scratch.
    ///
    /// Files are merged in ascending uri order. A file defining a name that
    /// an earlier file already owns is left out whole and reported.
    pub fn merge_all(
        &mut self,
        sets: impl IntoIterator<Item = (Uri, DefinitionSet<D>)>,
    ) -> Vec<MergeConflict> {
        let mut sets: Vec<(Uri, DefinitionSet<D>)> = sets.into_iter().collect();
        sets.sort_by(|(a, _), (b, _)| a.cmp(b));

        self.files.clear();
        self.global.clear();
        let mut conflicts = Vec::new();

        for (uri, set) in sets {
            self.known.insert(Arc::clone(&uri));
            let clash = set.names().find_map(|name| {
                self.global.owner(name).map(|owner| MergeConflict {
                    file: Arc::clone(&uri),
                    name: name.clone(),
                    owner: Arc::from(owner),
                })
            });
            if let Some(conflict) = clash {
                warn!(%conflict, "skipping file in full rebuild");
                conflicts.push(conflict);
                continue;
            }

            self.clock += 1;
            for (name, def) in &set.defs {
                self.global.insert(name.clone(), Arc::clone(def));
            }
            self.files.insert(
                uri,
                FileEntry {
                    set,
                    parsed: self.clock,
                },
            );
        }

        conflicts
    }

    /// Definitions hidden by another file's definition of the same name,
    /// each paired with the uri of the file that holds the name.
    pub fn shadowed(&self) -> impl Iterator<Item = (&D, &str)> + '_ {
        self.files
            .values()
            .flat_map(|entry| entry.set.iter())
            .filter_map(|def| match self.global.owner(def.name()) {
                Some(owner) if owner != def.file() => Some((def, owner)),
                _ => None,
            })
    }

    /// Names of definitions outside `uri` that mention any of `names`.
    pub fn dependents(&self, names: &BTreeSet<Name>, uri: &str) -> BTreeSet<Name> {
        if names.is_empty() {
            return BTreeSet::new();
        }
        self.global
            .iter()
            .filter(|(_, def)| def.file() != uri)
            .filter(|(_, def)| def.references().iter().any(|r| names.contains(r)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names owned by any of `files` in the global table.
    pub fn owned_by(&self, files: &BTreeSet<Uri>) -> Vec<Name> {
        self.global
            .iter()
            .filter(|(_, def)| files.contains(def.file()))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn reinstate(&mut self, name: &Name) {
        let fallback = self
            .files
            .values()
            .filter(|entry| entry.set.contains(name))
            .max_by_key(|entry| entry.parsed)
            .and_then(|entry| entry.set.defs.get(name));
        if let Some(def) = fallback {
            debug!(name = %name, owner = def.file(), "reinstating shadowed definition");
            let def = Arc::clone(def);
            self.global.insert(name.clone(), def);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestDef;

    fn set(uri: &str, names: &[&str]) -> DefinitionSet<TestDef> {
        names.iter().map(|name| TestDef::new(uri, name)).collect()
    }

    fn owners(store: &DefinitionStore<TestDef>) -> Vec<(String, String)> {
        store
            .global()
            .iter()
            .map(|(name, def)| (name.to_string(), def.file().to_string()))
            .collect()
    }

    #[test]
    fn test_reparse_removes_stale_names() {
        let mut store = DefinitionStore::new();
        store.record_parse("file:///a.fm", set("file:///a.fm", &["x", "y"]));
        let recorded = store.record_parse("file:///a.fm", set("file:///a.fm", &["y", "z"]));

        assert_eq!(recorded.removed, BTreeSet::from([Name::from("x")]));
        assert_eq!(
            recorded.added,
            BTreeSet::from([Name::from("y"), Name::from("z")])
        );
        let names: Vec<&str> = store.global().names().map(Name::as_str).collect();
        assert_eq!(names, vec!["y", "z"]);
    }

    #[test]
    fn test_move_between_files_keeps_single_owner() {
        let mut store = DefinitionStore::new();
        store.record_parse("file:///a.fm", set("file:///a.fm", &["x"]));
        store.record_parse("file:///a.fm", set("file:///a.fm", &[]));
        let recorded = store.record_parse("file:///b.fm", set("file:///b.fm", &["x"]));

        assert!(recorded.shadowed.is_empty());
        assert_eq!(
            owners(&store),
            vec![("x".to_string(), "file:///b.fm".to_string())]
        );
    }

    #[test]
    fn test_newest_wins_and_loser_is_reinstated() {
        let mut store = DefinitionStore::new();
        store.record_parse("file:///a.fm", set("file:///a.fm", &["x"]));
        let recorded = store.record_parse("file:///b.fm", set("file:///b.fm", &["x"]));
        assert_eq!(recorded.shadowed, BTreeSet::from([Name::from("x")]));
        assert_eq!(store.global().owner("x"), Some("file:///b.fm"));

        store.record_parse("file:///b.fm", set("file:///b.fm", &[]));
        assert_eq!(store.global().owner("x"), Some("file:///a.fm"));

        store.record_parse("file:///a.fm", set("file:///a.fm", &[]));
        assert!(store.global().is_empty());
    }

    #[test]
    fn test_reparse_of_loser_does_not_steal_back_silently() {
        let mut store = DefinitionStore::new();
        store.record_parse("file:///a.fm", set("file:///a.fm", &["x"]));
        store.record_parse("file:///b.fm", set("file:///b.fm", &["x"]));
        // Reparsing the loser makes it the newest owner.
        let recorded = store.record_parse("file:///a.fm", set("file:///a.fm", &["x"]));
        assert_eq!(recorded.shadowed, BTreeSet::from([Name::from("x")]));
        assert_eq!(store.global().owner("x"), Some("file:///a.fm"));
    }

    #[test]
    fn test_shadowed_follows_the_current_owner() {
        let mut store = DefinitionStore::new();
        store.record_parse("file:///a.fm", set("file:///a.fm", &["x", "y"]));
        assert_eq!(store.shadowed().count(), 0);

        store.record_parse("file:///b.fm", set("file:///b.fm", &["x"]));
        let hidden: Vec<(&str, &str, &str)> = store
            .shadowed()
            .map(|(def, owner)| (def.file(), def.name(), owner))
            .collect();
        assert_eq!(hidden, vec![("file:///a.fm", "x", "file:///b.fm")]);

        store.record_parse("file:///b.fm", set("file:///b.fm", &[]));
        assert_eq!(store.shadowed().count(), 0);
    }

    #[test]
    fn test_merge_all_skips_conflicting_file() {
        let mut store = DefinitionStore::new();
        let conflicts = store.merge_all(vec![
            (Uri::from("file:///b.fm"), set("file:///b.fm", &["x", "y"])),
            (Uri::from("file:///a.fm"), set("file:///a.fm", &["x"])),
            (Uri::from("file:///c.fm"), set("file:///c.fm", &["z"])),
        ]);

        assert_eq!(
            conflicts,
            vec![MergeConflict {
                file: Uri::from("file:///b.fm"),
                name: Name::from("x"),
                owner: Uri::from("file:///a.fm"),
            }]
        );
        assert_eq!(
            owners(&store),
            vec![
                ("x".to_string(), "file:///a.fm".to_string()),
                ("z".to_string(), "file:///c.fm".to_string()),
            ]
        );
        assert_eq!(store.all_known_files().len(), 3);
        assert!(store.file_defs("file:///b.fm").is_none());
    }

    #[test]
    fn test_merge_all_then_edit_retries_skipped_file() {
        let mut store = DefinitionStore::new();
        store.merge_all(vec![
            (Uri::from("file:///a.fm"), set("file:///a.fm", &["x"])),
            (Uri::from("file:///b.fm"), set("file:///b.fm", &["x", "y"])),
        ]);
        assert!(!store.global().contains("y"));

        store.record_parse("file:///b.fm", set("file:///b.fm", &["y"]));
        assert_eq!(store.global().owner("x"), Some("file:///a.fm"));
        assert_eq!(store.global().owner("y"), Some("file:///b.fm"));
    }

    #[test]
    fn test_known_files_survive_empty_parse() {
        let mut store = DefinitionStore::new();
        store.record_parse("file:///a.fm", set("file:///a.fm", &[]));
        assert!(store.all_known_files().contains("file:///a.fm"));
    }

    #[test]
    fn test_dependents_skip_own_file() {
        let mut store = DefinitionStore::new();
        store.record_parse("file:///a.fm", set("file:///a.fm", &["x"]));
        let mut uses = DefinitionSet::new();
        uses.insert(TestDef::new("file:///b.fm", "y").referring(&["x"]));
        uses.insert(TestDef::new("file:///b.fm", "w"));
        store.record_parse("file:///b.fm", uses);
        let mut own = DefinitionSet::new();
        own.insert(TestDef::new("file:///a.fm", "x"));
        own.insert(TestDef::new("file:///a.fm", "v").referring(&["x"]));
        store.record_parse("file:///a.fm", own);

        let dependents = store.dependents(&BTreeSet::from([Name::from("x")]), "file:///a.fm");
        assert_eq!(dependents, BTreeSet::from([Name::from("y")]));
    }
}
