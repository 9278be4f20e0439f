//! Dependency and inheritance graphs
//!
//! Edges depend on global resolution state, so graphs are rebuilt wholesale
//! over the complete file set after every full build or cache load; they are
//! never patched per file. `A -> B` exists iff one of A's imports resolves
//! to indexed file B. The export graph is the exact transpose.
//!
//! @module graph

mod imports;

use crate::adapters::SymbolKind;
use crate::core::config::Config;
use crate::index::FileEntry;
use imports::ImportResolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// =============================================================================
// GRAPH TYPES
// =============================================================================

/// A named type definition referenced from the inheritance graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub kind: SymbolKind,
    pub file: PathBuf,
}

/// All project-level graphs, rebuilt together
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectGraphs {
    /// file -> files it imports
    pub import_graph: HashMap<PathBuf, Vec<PathBuf>>,
    /// file -> files importing it (transpose of import_graph)
    pub export_graph: HashMap<PathBuf, Vec<PathBuf>>,
    /// type name -> parent name; a name collision keeps the last writer
    pub extends_graph: HashMap<String, String>,
    /// parent or interface name -> subtypes/implementors
    pub extended_by_graph: HashMap<String, Vec<TypeRef>>,
    /// Same-name types whose extends edges overwrote each other
    #[serde(default)]
    pub collisions: usize,
}

impl ProjectGraphs {
    pub fn imports_of(&self, path: &Path) -> &[PathBuf] {
        self.import_graph.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn importers_of(&self, path: &Path) -> &[PathBuf] {
        self.export_graph.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn subtypes_of(&self, name: &str) -> &[TypeRef] {
        self.extended_by_graph
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builds all graphs from the complete indexed file set
pub struct GraphBuilder<'a> {
    root: &'a Path,
    config: &'a Config,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(root: &'a Path, config: &'a Config) -> Self {
        Self { root, config }
    }

    pub fn build(&self, files: &HashMap<PathBuf, FileEntry>) -> ProjectGraphs {
        let resolver = ImportResolver::new(self.root, self.config, files);

        let mut import_graph: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        for entry in files.values() {
            let mut targets: Vec<PathBuf> = Vec::new();
            for record in &entry.import_modules {
                for target in resolver.resolve(entry, record) {
                    if target != entry.path && !targets.contains(&target) {
                        targets.push(target);
                    }
                }
            }
            if !targets.is_empty() {
                targets.sort();
                import_graph.insert(entry.path.clone(), targets);
            }
        }

        let mut export_graph: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        for (from, targets) in &import_graph {
            for to in targets {
                export_graph.entry(to.clone()).or_default().push(from.clone());
            }
        }
        for importers in export_graph.values_mut() {
            importers.sort();
        }

        let (extends_graph, extended_by_graph, collisions) = build_inheritance(files);

        ProjectGraphs {
            import_graph,
            export_graph,
            extends_graph,
            extended_by_graph,
            collisions,
        }
    }
}

/// Extends/implements edges from parsed type symbols. Files are walked in
/// sorted order so the last writer on a name collision is deterministic.
fn build_inheritance(
    files: &HashMap<PathBuf, FileEntry>,
) -> (
    HashMap<String, String>,
    HashMap<String, Vec<TypeRef>>,
    usize,
) {
    let mut extends_graph: HashMap<String, String> = HashMap::new();
    let mut extended_by_graph: HashMap<String, Vec<TypeRef>> = HashMap::new();
    let mut collisions = 0;

    let mut paths: Vec<&PathBuf> = files.keys().collect();
    paths.sort();

    for path in paths {
        let entry = &files[path.as_path()];
        for symbol in &entry.symbols {
            if !symbol.kind.is_type_like() {
                continue;
            }
            let type_ref = TypeRef {
                name: symbol.name.to_string(),
                kind: symbol.kind,
                file: entry.path.clone(),
            };
            if let Some(parent) = &symbol.extends {
                if let Some(prev) = extends_graph.insert(symbol.name.to_string(), parent.clone()) {
                    if prev != *parent {
                        collisions += 1;
                        tracing::warn!(
                            "Inheritance name collision on {}: {} replaces {}",
                            symbol.name,
                            parent,
                            prev
                        );
                    }
                }
                extended_by_graph
                    .entry(parent.clone())
                    .or_default()
                    .push(type_ref.clone());
            }
            for interface in &symbol.implements {
                extended_by_graph
                    .entry(interface.clone())
                    .or_default()
                    .push(type_ref.clone());
            }
        }
    }

    (extends_graph, extended_by_graph, collisions)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CodeIndex;
    use tempfile::TempDir;

    fn build_index(temp: &TempDir) -> CodeIndex {
        let mut index = CodeIndex::new(temp.path(), Config::default());
        index.build("**/*", true).unwrap();
        index
    }

    #[test]
    fn test_ts_relative_import_edge() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("src/app.ts"),
            "import { helper } from './util';\nexport function run() { return helper(); }\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("src/util.ts"),
            "export function helper() { return 1; }\n",
        )
        .unwrap();

        let index = build_index(&temp);
        let app = index.root.join("src/app.ts");
        let util = index.root.join("src/util.ts");

        assert_eq!(index.graphs.imports_of(&app), &[util.clone()]);
        assert_eq!(index.graphs.importers_of(&util), &[app]);
    }

    #[test]
    fn test_ts_index_file_probing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src/lib")).unwrap();
        std::fs::write(
            temp.path().join("src/app.ts"),
            "import { x } from './lib';\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("src/lib/index.ts"), "export const x = 1;\n").unwrap();

        let index = build_index(&temp);
        let app = index.root.join("src/app.ts");
        assert_eq!(
            index.graphs.imports_of(&app),
            &[index.root.join("src/lib/index.ts")]
        );
    }

    #[test]
    fn test_ts_tsconfig_path_mapping() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src/lib")).unwrap();
        std::fs::write(
            temp.path().join("tsconfig.json"),
            r#"{"compilerOptions": {"baseUrl": ".", "paths": {"@lib/*": ["src/lib/*"]}}}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join("src/app.ts"),
            "import { math } from '@lib/math';\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("src/lib/math.ts"),
            "export const math = 1;\n",
        )
        .unwrap();

        let index = build_index(&temp);
        let app = index.root.join("src/app.ts");
        assert_eq!(
            index.graphs.imports_of(&app),
            &[index.root.join("src/lib/math.ts")]
        );
    }

    #[test]
    fn test_python_relative_and_absolute_imports() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("pkg")).unwrap();
        std::fs::write(temp.path().join("pkg/__init__.py"), "").unwrap();
        std::fs::write(
            temp.path().join("pkg/worker.py"),
            "from .helper import run\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("pkg/helper.py"), "def run():\n    pass\n").unwrap();
        std::fs::write(temp.path().join("main.py"), "import pkg.worker\n").unwrap();

        let index = build_index(&temp);
        let worker = index.root.join("pkg/worker.py");
        let main = index.root.join("main.py");

        assert_eq!(
            index.graphs.imports_of(&worker),
            &[index.root.join("pkg/helper.py")]
        );
        assert_eq!(index.graphs.imports_of(&main), &[worker]);
    }

    #[test]
    fn test_rust_crate_import_probing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("Cargo.toml"),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("src/lib.rs"),
            "pub mod util;\nuse crate::util::hash;\n\npub fn id() -> u64 { hash(0) }\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("src/util.rs"),
            "pub fn hash(x: u64) -> u64 { x }\n",
        )
        .unwrap();

        let index = build_index(&temp);
        let lib = index.root.join("src/lib.rs");
        assert_eq!(
            index.graphs.imports_of(&lib),
            &[index.root.join("src/util.rs")]
        );
    }

    #[test]
    fn test_go_module_path_edges() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("store")).unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/app\n").unwrap();
        std::fs::write(
            temp.path().join("main.go"),
            "package main\n\nimport \"example.com/app/store\"\n\nfunc main() {}\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("store/store.go"),
            "package store\n\nfunc Open() {}\n",
        )
        .unwrap();

        let index = build_index(&temp);
        let main = index.root.join("main.go");
        assert_eq!(
            index.graphs.imports_of(&main),
            &[index.root.join("store/store.go")]
        );
    }

    #[test]
    fn test_java_suffix_matching() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src/main/java/com/acme/util")).unwrap();
        std::fs::create_dir_all(temp.path().join("src/main/java/com/acme/app")).unwrap();
        std::fs::write(
            temp.path().join("src/main/java/com/acme/app/Main.java"),
            "package com.acme.app;\n\nimport com.acme.util.Strings;\n\npublic class Main {}\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("src/main/java/com/acme/util/Strings.java"),
            "package com.acme.util;\n\npublic class Strings {}\n",
        )
        .unwrap();

        let index = build_index(&temp);
        let main = index.root.join("src/main/java/com/acme/app/Main.java");
        assert_eq!(
            index.graphs.imports_of(&main),
            &[index.root.join("src/main/java/com/acme/util/Strings.java")]
        );
    }

    #[test]
    fn test_unresolved_import_is_external() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("app.py"),
            "import requests\n\ndef main():\n    pass\n",
        )
        .unwrap();

        let index = build_index(&temp);
        let app = index.root.join("app.py");
        assert!(index.graphs.imports_of(&app).is_empty());
    }

    #[test]
    fn test_inheritance_graph() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("animals.py"),
            "class Animal:\n    pass\n\nclass Dog(Animal):\n    pass\n",
        )
        .unwrap();

        let index = build_index(&temp);
        assert_eq!(
            index.graphs.extends_graph.get("Dog").map(String::as_str),
            Some("Animal")
        );
        let subtypes = index.graphs.subtypes_of("Animal");
        assert_eq!(subtypes.len(), 1);
        assert_eq!(subtypes[0].name, "Dog");
        assert_eq!(subtypes[0].kind, SymbolKind::Class);
        assert_eq!(index.graphs.collisions, 0);
    }

    #[test]
    fn test_inheritance_name_collision_counted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("a.py"),
            "class Base1:\n    pass\n\nclass Dog(Base1):\n    pass\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("b.py"),
            "class Base2:\n    pass\n\nclass Dog(Base2):\n    pass\n",
        )
        .unwrap();

        let index = build_index(&temp);
        assert_eq!(index.graphs.collisions, 1);
        // b.py sorts after a.py, so its edge wins
        assert_eq!(
            index.graphs.extends_graph.get("Dog").map(String::as_str),
            Some("Base2")
        );
        // both subtype entries survive, one per parent
        assert_eq!(index.graphs.subtypes_of("Base1").len(), 1);
        assert_eq!(index.graphs.subtypes_of("Base2").len(), 1);
    }
}
