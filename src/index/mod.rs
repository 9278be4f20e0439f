//! File index
//!
//! `CodeIndex` owns the indexed state: per-file entries, the name-keyed
//! symbol table, the dependency graphs, and the per-file call cache. File
//! reads and parsing run in parallel; all table and graph mutations happen
//! on the calling thread. Graphs are rebuilt wholesale after every full
//! build, never patched per file.
//!
//! @module index

pub mod symbols;
pub mod types;

pub use symbols::SymbolTable;
pub use types::{binding_id, Binding, CachedCalls, FileEntry, Symbol};

use crate::adapters::{
    adapter_for, detect_language, ClassDef, FunctionDef, ImportRecord, LanguageAdapter,
    ParsedModule, SymbolKind,
};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::discovery::{DiscoveryOptions, FileDiscovery};
use crate::graph::{GraphBuilder, ProjectGraphs};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

// =============================================================================
// BUILD STATS
// =============================================================================

/// Outcome of indexing one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// File was parsed and (re)inserted
    Indexed,
    /// Hash and mtime both matched the stored entry
    Unchanged,
    /// No adapter for the detected language
    Unsupported,
}

/// Summary of one build pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    /// Files matched by the glob after ignores
    pub files_matched: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub unsupported: usize,
    pub failed: usize,
    /// Raw file count under the root, ignores not applied. The gap between
    /// this and `files_matched` shows how much of the tree the build covered.
    pub tree_files: usize,
    pub elapsed_ms: u64,
}

// =============================================================================
// CODE INDEX
// =============================================================================

/// The indexed state of one project root
#[derive(Debug)]
pub struct CodeIndex {
    pub root: PathBuf,
    pub config: Config,
    pub files: HashMap<PathBuf, FileEntry>,
    pub symbols: SymbolTable,
    pub graphs: ProjectGraphs,
    /// Populated lazily by call-site queries, the only state mutated during
    /// reads. Validated per entry against live mtime/hash.
    pub calls_cache: RwLock<HashMap<PathBuf, CachedCalls>>,
}

impl CodeIndex {
    pub fn new(root: &Path, config: Config) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            config,
            files: HashMap::new(),
            symbols: SymbolTable::new(),
            graphs: ProjectGraphs::default(),
            calls_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Index one file. No-op when both content hash and mtime match the
    /// stored entry; otherwise the file's prior symbols are removed and the
    /// entry is rebuilt from a fresh parse. Does not touch the graphs.
    pub fn index_file(&mut self, path: &Path) -> Result<IndexOutcome> {
        let known = self.files.get(path).map(|e| (e.content_hash, e.mtime));
        match prepare_file(path, &self.root, known)? {
            Prepared::Unchanged => Ok(IndexOutcome::Unchanged),
            Prepared::Unsupported => Ok(IndexOutcome::Unsupported),
            Prepared::Entry(entry) => {
                self.insert_entry(*entry);
                Ok(IndexOutcome::Indexed)
            }
        }
    }

    /// Full build: discover files, index them (reads and parses in
    /// parallel, merges serially), then rebuild all graphs over the
    /// complete set. A single file's failure is logged and skipped.
    pub fn build(&mut self, pattern: &str, clear: bool) -> Result<BuildStats> {
        let started = std::time::Instant::now();
        let discovery = FileDiscovery::new(DiscoveryOptions::from_config(
            &self.root,
            &self.config.discovery,
        ));
        let matched = discovery.expand_glob(pattern)?;

        if clear {
            self.clear();
        }

        let known: HashMap<PathBuf, (u64, i64)> = matched
            .iter()
            .filter_map(|p| self.files.get(p).map(|e| (p.clone(), (e.content_hash, e.mtime))))
            .collect();
        let root = self.root.clone();

        let prepared: Vec<(PathBuf, Result<Prepared>)> = matched
            .par_iter()
            .map(|path| {
                let result = prepare_file(path, &root, known.get(path).copied());
                (path.clone(), result)
            })
            .collect();

        let mut stats = BuildStats {
            files_matched: matched.len(),
            ..BuildStats::default()
        };
        for (path, result) in prepared {
            match result {
                Ok(Prepared::Unchanged) => stats.unchanged += 1,
                Ok(Prepared::Unsupported) => stats.unsupported += 1,
                Ok(Prepared::Entry(entry)) => {
                    self.insert_entry(*entry);
                    stats.indexed += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    stats.failed += 1;
                }
            }
        }

        self.graphs = GraphBuilder::new(&self.root, &self.config).build(&self.files);

        stats.tree_files = discovery.count_files();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexed {} files ({} unchanged, {} failed) in {}ms",
            stats.indexed,
            stats.unchanged,
            stats.failed,
            stats.elapsed_ms
        );
        Ok(stats)
    }

    /// Drop all indexed state, including the call cache
    pub fn clear(&mut self) {
        self.files.clear();
        self.symbols.clear();
        self.graphs = ProjectGraphs::default();
        self.calls_cache.write().clear();
    }

    pub fn file(&self, path: &Path) -> Option<&FileEntry> {
        self.files.get(path)
    }

    /// Root-relative path with `/` separators
    pub fn relative_path(&self, path: &Path) -> String {
        relative_to_root(&self.root, path)
    }

    fn insert_entry(&mut self, entry: FileEntry) {
        self.symbols.remove_file(&entry.path);
        for symbol in &entry.symbols {
            self.symbols.insert(symbol.clone());
        }
        self.files.insert(entry.path.clone(), entry);
    }
}

// =============================================================================
// FILE PREPARATION
// =============================================================================

enum Prepared {
    Unchanged,
    Unsupported,
    Entry(Box<FileEntry>),
}

pub(crate) fn relative_to_root(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| path.to_string_lossy().replace('\\', "/"))
}

pub(crate) fn mtime_millis(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
        .unwrap_or(0)
}

/// Read, hash, and parse one file without touching shared state
fn prepare_file(path: &Path, root: &Path, known: Option<(u64, i64)>) -> Result<Prepared> {
    let meta = std::fs::metadata(path)?;
    let mtime = mtime_millis(&meta);
    let size = meta.len();
    let content = std::fs::read_to_string(path)?;
    let hash = xxh3_64(content.as_bytes());

    if let Some((known_hash, known_mtime)) = known {
        if known_hash == hash && known_mtime == mtime {
            return Ok(Prepared::Unchanged);
        }
    }

    let language = detect_language(path);
    let adapter = match adapter_for(language) {
        Some(adapter) => adapter,
        None => return Ok(Prepared::Unsupported),
    };

    let relative = relative_to_root(root, path);
    let entry = build_entry(adapter, path, &relative, language, &content, hash, mtime, size);
    Ok(Prepared::Entry(Box::new(entry)))
}

#[allow(clippy::too_many_arguments)]
fn build_entry(
    adapter: &dyn LanguageAdapter,
    path: &Path,
    relative: &str,
    language: &str,
    content: &str,
    hash: u64,
    mtime: i64,
    size: u64,
) -> FileEntry {
    let parsed = adapter.parse(content);
    let exports = adapter.find_exports(content);
    let imports = merge_imports(adapter.find_imports(content), adapter.find_re_exports(content));

    let mut exported_names: Vec<String> = Vec::new();
    for export in &exports {
        if !exported_names.iter().any(|n| n == &export.name) {
            exported_names.push(export.name.clone());
        }
    }

    let mut symbols = flatten_symbols(&parsed, path, relative);
    for symbol in &mut symbols {
        if symbol.kind == SymbolKind::State && symbol.member_type.is_none() {
            symbol.member_type = exports
                .iter()
                .find(|e| e.name == symbol.name)
                .and_then(|e| e.type_annotation.clone());
        }
    }
    symbols.sort_by_key(|s| s.start_line);

    let bindings = symbols
        .iter()
        .map(|s| Binding {
            id: s.binding_id.clone(),
            name: s.name.clone(),
            kind: s.kind,
            start_line: s.start_line,
            end_line: s.end_line,
            class_name: s.class_name.clone(),
        })
        .collect();

    FileEntry {
        path: path.to_path_buf(),
        relative_path: relative.to_string(),
        language: language.to_string(),
        line_count: content.lines().count() as u32,
        content_hash: hash,
        mtime,
        size,
        import_modules: imports,
        exported_names,
        export_details: exports,
        symbols,
        bindings,
    }
}

/// Re-export declarations create dependency edges too; fold them into the
/// import list, deduplicated by module and line.
fn merge_imports(mut imports: Vec<ImportRecord>, re_exports: Vec<ImportRecord>) -> Vec<ImportRecord> {
    for record in re_exports {
        if !imports
            .iter()
            .any(|i| i.module == record.module && i.line == record.line)
        {
            imports.push(record);
        }
    }
    imports
}

// =============================================================================
// SYMBOL FLATTENING
// =============================================================================

/// Flatten a parse into symbols: one per top-level function, one per class,
/// one per method with a `class_name` back-reference, one per state object.
fn flatten_symbols(parsed: &ParsedModule, path: &Path, relative: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for func in &parsed.functions {
        let kind = if func.receiver.is_some() {
            SymbolKind::Method
        } else {
            SymbolKind::Function
        };
        // A detached receiver method keeps the receiver type as its class
        let class_name = func.receiver.clone();
        symbols.push(function_symbol(func, kind, path, relative, class_name));
    }

    for class in &parsed.classes {
        symbols.push(Symbol {
            name: class.name.as_str().into(),
            kind: class.kind,
            file: path.to_path_buf(),
            start_line: class.start_line,
            end_line: class.end_line,
            binding_id: binding_id(relative, class.kind, class.start_line),
            raw_params: String::new(),
            params: Vec::new(),
            return_type: None,
            modifiers: Vec::new(),
            docstring: class.docstring.clone(),
            is_async: false,
            extends: class.extends.clone(),
            implements: class.implements.clone(),
            receiver: None,
            class_name: None,
            member_type: None,
            attribute_types: class.attribute_types.clone(),
        });

        for method in &class.methods {
            let kind = if is_constructor(method, class) {
                SymbolKind::Constructor
            } else {
                SymbolKind::Method
            };
            symbols.push(function_symbol(
                method,
                kind,
                path,
                relative,
                Some(class.name.clone()),
            ));
        }
    }

    for state in &parsed.state_objects {
        symbols.push(Symbol {
            name: state.name.as_str().into(),
            kind: SymbolKind::State,
            file: path.to_path_buf(),
            start_line: state.start_line,
            end_line: state.end_line,
            binding_id: binding_id(relative, SymbolKind::State, state.start_line),
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
        });
    }

    symbols
}

fn is_constructor(method: &FunctionDef, class: &ClassDef) -> bool {
    method.name == "constructor" || method.name == "__init__" || method.name == class.name
}

fn function_symbol(
    func: &FunctionDef,
    kind: SymbolKind,
    path: &Path,
    relative: &str,
    class_name: Option<String>,
) -> Symbol {
    Symbol {
        name: func.name.as_str().into(),
        kind,
        file: path.to_path_buf(),
        start_line: func.start_line,
        end_line: func.end_line,
        binding_id: binding_id(relative, kind, func.start_line),
        raw_params: func.raw_params.clone(),
        params: func.params.clone(),
        return_type: func.return_type.clone(),
        modifiers: func.modifiers.clone(),
        docstring: func.docstring.clone(),
        is_async: func.is_async,
        extends: None,
        implements: Vec::new(),
        receiver: func.receiver.clone(),
        class_name,
        member_type: None,
        attribute_types: Vec::new(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index_for(temp: &TempDir) -> CodeIndex {
        CodeIndex::new(temp.path(), Config::default())
    }

    #[test]
    fn test_build_indexes_supported_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("app.py"),
            "def main():\n    return 1\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("notes.md"), "# notes\n").unwrap();

        let mut index = index_for(&temp);
        let stats = index.build("**/*", true).unwrap();

        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.unsupported, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(index.files.len(), 1);
        assert_eq!(index.symbols.get("main").len(), 1);
    }

    #[test]
    fn test_rebuild_is_noop_when_unchanged() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.py"), "def main():\n    pass\n").unwrap();

        let mut index = index_for(&temp);
        index.build("**/*.py", true).unwrap();
        let stats = index.build("**/*.py", false).unwrap();

        assert_eq!(stats.indexed, 0);
        assert_eq!(stats.unchanged, 1);
    }

    #[test]
    fn test_changed_content_replaces_symbols() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("app.py");
        std::fs::write(&file, "def old_name():\n    pass\n").unwrap();

        let mut index = index_for(&temp);
        index.build("**/*.py", true).unwrap();
        assert_eq!(index.symbols.get("old_name").len(), 1);

        std::fs::write(&file, "def new_name():\n    pass\n").unwrap();
        let indexed = index.root.join("app.py");
        let outcome = index.index_file(&indexed).unwrap();

        assert_eq!(outcome, IndexOutcome::Indexed);
        assert!(index.symbols.get("old_name").is_empty());
        assert_eq!(index.symbols.get("new_name").len(), 1);
    }

    #[test]
    fn test_methods_flattened_with_class_back_reference() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("svc.py"),
            "class Service:\n    def __init__(self, db):\n        self.db = db\n\n    def run(self):\n        return self.db\n",
        )
        .unwrap();

        let mut index = index_for(&temp);
        index.build("**/*.py", true).unwrap();

        let class = &index.symbols.get("Service")[0];
        assert_eq!(class.kind, SymbolKind::Class);

        let ctor = &index.symbols.get("__init__")[0];
        assert_eq!(ctor.kind, SymbolKind::Constructor);
        assert_eq!(ctor.class_name.as_deref(), Some("Service"));

        let method = &index.symbols.get("run")[0];
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.class_name.as_deref(), Some("Service"));
        assert_eq!(method.receiver.as_deref(), Some("self"));
    }

    #[test]
    fn test_bindings_mirror_symbols() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("app.py"),
            "def first():\n    pass\n\ndef second():\n    pass\n",
        )
        .unwrap();

        let mut index = index_for(&temp);
        index.build("**/*.py", true).unwrap();

        let entry = index.files.values().next().unwrap();
        assert_eq!(entry.bindings.len(), entry.symbols.len());
        assert_eq!(entry.bindings[0].id, "app.py:function:1");
    }

    #[test]
    fn test_clear_build_drops_stale_files() {
        let temp = TempDir::new().unwrap();
        let gone = temp.path().join("gone.py");
        std::fs::write(&gone, "def gone():\n    pass\n").unwrap();

        let mut index = index_for(&temp);
        index.build("**/*.py", true).unwrap();
        assert_eq!(index.files.len(), 1);

        std::fs::remove_file(&gone).unwrap();
        std::fs::write(temp.path().join("kept.py"), "def kept():\n    pass\n").unwrap();
        index.build("**/*.py", true).unwrap();

        assert_eq!(index.files.len(), 1);
        assert!(index.symbols.get("gone").is_empty());
        assert_eq!(index.symbols.get("kept").len(), 1);
    }
}
