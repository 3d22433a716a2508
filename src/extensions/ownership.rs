//! Path-based attribution of module files to extensions.
//!
//! Extension roots are kept in a `BTreeMap` keyed by absolute directory. A
//! file's owner is the deepest registered root among its ancestors. Results
//! are memoized per file; binding or unbinding a root invalidates only the
//! entries it could affect.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct OwnershipIndex {
    /// Extension root directory -> owning extension name.
    roots: BTreeMap<PathBuf, String>,

    /// File -> resolved owner (or `None` for host files).
    cache: RefCell<HashMap<PathBuf, Option<String>>>,
}

impl OwnershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `root` as belonging to `owner`.
    pub fn bind(&mut self, root: PathBuf, owner: &str) {
        // A new root can only turn previous misses into hits
        self.cache.get_mut().retain(|_, cached| cached.is_some());
        self.roots.insert(root, owner.to_string());
    }

    /// Remove every root owned by `owner`.
    pub fn unbind(&mut self, owner: &str) {
        self.roots.retain(|_, o| o != owner);
        self.cache
            .get_mut()
            .retain(|_, cached| cached.as_deref() != Some(owner));
    }

    pub fn root_of(&self, owner: &str) -> Option<&Path> {
        self.roots
            .iter()
            .find(|(_, o)| o.as_str() == owner)
            .map(|(root, _)| root.as_path())
    }

    /// Owning extension of `file`, by longest matching root.
    pub fn owner_of(&self, file: &Path) -> Option<String> {
        if let Some(cached) = self.cache.borrow().get(file) {
            return cached.clone();
        }

        let owner = file
            .ancestors()
            .find_map(|dir| self.roots.get(dir))
            .cloned();

        self.cache
            .borrow_mut()
            .insert(file.to_path_buf(), owner.clone());
        owner
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn cached_files(&self) -> usize {
        self.cache.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        let mut index = OwnershipIndex::new();
        index.bind(PathBuf::from("/ext"), "outer");
        index.bind(PathBuf::from("/ext/nested"), "inner");

        assert_eq!(index.owner_of(Path::new("/ext/main.lua")).as_deref(), Some("outer"));
        assert_eq!(
            index.owner_of(Path::new("/ext/nested/lib/util.lua")).as_deref(),
            Some("inner")
        );
    }

    #[test]
    fn test_prefix_is_component_wise() {
        let mut index = OwnershipIndex::new();
        index.bind(PathBuf::from("/ext/notes"), "notes");

        // "/ext/notes-extra" shares a string prefix but not a path prefix
        assert_eq!(index.owner_of(Path::new("/ext/notes-extra/main.lua")), None);
        assert_eq!(
            index.owner_of(Path::new("/ext/notes/main.lua")).as_deref(),
            Some("notes")
        );
    }

    #[test]
    fn test_host_files_have_no_owner() {
        let mut index = OwnershipIndex::new();
        index.bind(PathBuf::from("/ext/notes"), "notes");
        assert_eq!(index.owner_of(Path::new("/usr/share/beacon/prelude.lua")), None);
    }

    #[test]
    fn test_results_are_memoized() {
        let mut index = OwnershipIndex::new();
        index.bind(PathBuf::from("/ext/notes"), "notes");

        index.owner_of(Path::new("/ext/notes/a.lua"));
        index.owner_of(Path::new("/ext/notes/a.lua"));
        index.owner_of(Path::new("/ext/notes/b.lua"));
        assert_eq!(index.cached_files(), 2);
    }

    #[test]
    fn test_bind_invalidates_cached_misses() {
        let mut index = OwnershipIndex::new();
        assert_eq!(index.owner_of(Path::new("/ext/calc/main.lua")), None);

        index.bind(PathBuf::from("/ext/calc"), "calc");
        assert_eq!(
            index.owner_of(Path::new("/ext/calc/main.lua")).as_deref(),
            Some("calc")
        );
    }

    #[test]
    fn test_unbind_forgets_owner() {
        let mut index = OwnershipIndex::new();
        index.bind(PathBuf::from("/ext/calc"), "calc");
        index.bind(PathBuf::from("/ext/notes"), "notes");
        index.owner_of(Path::new("/ext/calc/main.lua"));
        index.owner_of(Path::new("/ext/notes/main.lua"));

        index.unbind("calc");
        assert_eq!(index.len(), 1);
        assert_eq!(index.cached_files(), 1);
        assert_eq!(index.owner_of(Path::new("/ext/calc/main.lua")), None);
        assert_eq!(index.root_of("notes"), Some(Path::new("/ext/notes")));
    }
}
