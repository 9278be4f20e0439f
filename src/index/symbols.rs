//! Name-keyed symbol table
//!
//! Appends every definition site under its name; same-name symbols from
//! different files (or the same file) coexist as separate entries. Merging
//! would lose definition sites, so insertion never replaces. Removal is by
//! owning file, which is the unit of re-indexing.
//!
//! @module index/symbols

use super::types::Symbol;
use compact_str::CompactString;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::path::Path;

/// All known definition sites, keyed by symbol name
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    map: HashMap<CompactString, SmallVec<[Symbol; 2]>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a definition site. Never merges or replaces.
    pub fn insert(&mut self, symbol: Symbol) {
        self.map
            .entry(symbol.name.clone())
            .or_default()
            .push(symbol);
    }

    /// All definition sites for `name`, empty when unknown
    pub fn get(&self, name: &str) -> &[Symbol] {
        self.map.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Drop every symbol owned by `file`. Names left with no sites are
    /// removed entirely.
    pub fn remove_file(&mut self, file: &Path) {
        self.map.retain(|_, symbols| {
            symbols.retain(|s| s.file != file);
            !symbols.is_empty()
        });
    }

    /// Number of distinct names
    pub fn name_count(&self) -> usize {
        self.map.len()
    }

    /// Total definition sites across all names
    pub fn symbol_count(&self) -> usize {
        self.map.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &CompactString> {
        self.map.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompactString, &[Symbol])> {
        self.map.iter().map(|(name, syms)| (name, syms.as_slice()))
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SymbolKind;
    use std::path::PathBuf;

    fn symbol(name: &str, file: &str, line: u32) -> Symbol {
        Symbol {
            name: name.into(),
            kind: SymbolKind::Function,
            file: PathBuf::from(file),
            start_line: line,
            end_line: line + 3,
            binding_id: format!("{}:function:{}", file, line),
            raw_params: String::new(),
            params: Vec::new(),
            return_type: None,
            modifiers: Vec::new(),
            docstring: None,
            is_async: false,
            extends: None,
            implements: Vec::new(),
            receiver: None,
            class_name: None,
            member_type: None,
            attribute_types: Vec::new(),
        }
    }

    #[test]
    fn test_insert_appends_same_name() {
        let mut table = SymbolTable::new();
        table.insert(symbol("process", "/p/a.py", 1));
        table.insert(symbol("process", "/p/b.py", 10));

        assert_eq!(table.get("process").len(), 2);
        assert_eq!(table.name_count(), 1);
        assert_eq!(table.symbol_count(), 2);
    }

    #[test]
    fn test_get_unknown_is_empty() {
        let table = SymbolTable::new();
        assert!(table.get("missing").is_empty());
        assert!(!table.contains("missing"));
    }

    #[test]
    fn test_remove_file_keeps_other_sites() {
        let mut table = SymbolTable::new();
        table.insert(symbol("process", "/p/a.py", 1));
        table.insert(symbol("process", "/p/b.py", 10));
        table.insert(symbol("helper", "/p/a.py", 20));

        table.remove_file(Path::new("/p/a.py"));

        assert_eq!(table.get("process").len(), 1);
        assert_eq!(table.get("process")[0].file, PathBuf::from("/p/b.py"));
        assert!(table.get("helper").is_empty());
        assert_eq!(table.name_count(), 1);
    }
}
