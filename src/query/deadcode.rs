//! Dead-code analysis
//!
//! One whole-project identifier-occurrence scan, then a candidacy filter.
//! A callable is dead iff nothing outside its own definition line mentions
//! its name. Entry points and polymorphic-dispatch targets never become
//! candidates: the call graph cannot observe their invocation, so flagging
//! them would be noise, not signal.
//!
//! @module query/deadcode

use super::QueryEngine;
use crate::core::project::is_test_file;
use crate::index::{FileEntry, Symbol};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct DeadcodeOptions {
    /// Also report exported symbols with zero internal references
    pub include_exported: bool,
    /// Also consider symbols defined in test files
    pub include_tests: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadSymbol {
    pub symbol: Symbol,
    pub exported: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadcodeResult {
    pub dead: Vec<DeadSymbol>,
    pub scanned_files: usize,
    /// Callables that passed the candidacy filter
    pub candidates: usize,
    pub warnings: Vec<String>,
}

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_$][A-Za-z0-9_$]*").unwrap());

/// Test-framework prefixes recognized in Go function names
const GO_TEST_PREFIXES: [&str; 4] = ["Test", "Benchmark", "Example", "Fuzz"];

impl<'a> QueryEngine<'a> {
    /// Find callables with no reference anywhere in the project.
    pub fn deadcode(&self, opts: &DeadcodeOptions) -> DeadcodeResult {
        let mut paths: Vec<&PathBuf> = self.index.files.keys().collect();
        paths.sort();

        // Non-definition occurrence count per identifier, one pass over
        // every indexed file.
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        let mut scanned_files = 0;
        for path in &paths {
            let entry = &self.index.files[path.as_path()];
            let content = match self.source.content(path) {
                Some(content) => content,
                None => continue,
            };
            scanned_files += 1;

            let mut def_lines: HashMap<&str, HashSet<u32>> = HashMap::new();
            for symbol in &entry.symbols {
                def_lines
                    .entry(symbol.name.as_str())
                    .or_default()
                    .insert(symbol.start_line);
            }

            for (idx, line_text) in content.lines().enumerate() {
                let line = idx as u32 + 1;
                for mat in IDENT_RE.find_iter(line_text) {
                    let name = mat.as_str();
                    if def_lines.get(name).map_or(false, |l| l.contains(&line)) {
                        continue;
                    }
                    *occurrences.entry(name.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut candidates = 0;
        let mut dead = Vec::new();
        for path in &paths {
            let entry = &self.index.files[path.as_path()];
            if !opts.include_tests && is_test_file(&entry.path, &entry.language) {
                continue;
            }
            for symbol in &entry.symbols {
                if !symbol.kind.is_callable() {
                    continue;
                }
                if is_entry_point(symbol, &entry.language) || self.is_dispatch_target(entry, symbol)
                {
                    continue;
                }
                let exported = entry
                    .exported_names
                    .iter()
                    .any(|n| n == symbol.name.as_str());
                if exported && !opts.include_exported {
                    continue;
                }
                candidates += 1;

                if occurrences.get(symbol.name.as_str()).copied().unwrap_or(0) == 0 {
                    dead.push(DeadSymbol {
                        symbol: symbol.clone(),
                        exported,
                    });
                }
            }
        }

        dead.sort_by(|a, b| {
            (&a.symbol.file, a.symbol.start_line).cmp(&(&b.symbol.file, b.symbol.start_line))
        });

        let warnings = self.completeness_warnings();
        self.source.clear();
        DeadcodeResult {
            dead,
            scanned_files,
            candidates,
            warnings,
        }
    }

    /// Whether a method can be invoked through dynamic dispatch: declared on
    /// an interface or trait, annotated as an override, or shadowing a
    /// same-name member somewhere up the inheritance chain. An ancestor the
    /// index cannot see exempts conservatively.
    fn is_dispatch_target(&self, entry: &FileEntry, symbol: &Symbol) -> bool {
        if symbol.modifiers.iter().any(|m| m == "@Override") {
            return true;
        }
        let class = match symbol.class_name.as_deref() {
            Some(class) => class,
            None => return false,
        };
        let class_sym = entry
            .symbols
            .iter()
            .find(|s| s.kind.is_type_like() && s.name.as_str() == class);
        let class_sym = match class_sym {
            Some(class_sym) => class_sym,
            None => return false,
        };
        use crate::adapters::SymbolKind;
        if matches!(class_sym.kind, SymbolKind::Interface | SymbolKind::Trait) {
            return true;
        }

        let mut pending: Vec<&str> = Vec::new();
        pending.extend(class_sym.extends.as_deref());
        pending.extend(class_sym.implements.iter().map(|s| s.as_str()));

        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(ancestor) = pending.pop() {
            if !visited.insert(ancestor) {
                continue;
            }
            let defs = self.index.symbols.get(ancestor);
            if defs.is_empty() {
                // External base type; its contract is invisible
                return true;
            }
            for def in defs {
                let members_declare = self
                    .index
                    .files
                    .get(&def.file)
                    .map(|e| {
                        e.symbols.iter().any(|s| {
                            s.class_name.as_deref() == Some(ancestor)
                                && s.name.as_str() == symbol.name.as_str()
                        })
                    })
                    .unwrap_or(false);
                if members_declare {
                    return true;
                }
                pending.extend(def.extends.as_deref());
                pending.extend(def.implements.iter().map(|s| s.as_str()));
            }
        }
        false
    }
}

/// Names a runtime or test framework calls on its own
fn is_entry_point(symbol: &Symbol, language: &str) -> bool {
    let name = symbol.name.as_str();
    if name == "main" {
        return true;
    }
    match language {
        "python" => {
            (name.starts_with("__") && name.ends_with("__"))
                || name.starts_with("test_")
                || name == "setUp"
                || name == "tearDown"
        }
        "go" => {
            name == "init"
                || GO_TEST_PREFIXES.iter().any(|p| {
                    name.strip_prefix(p)
                        .and_then(|rest| rest.chars().next())
                        .map(|c| c.is_uppercase())
                        .unwrap_or(false)
                })
        }
        "java" => symbol.modifiers.iter().any(|m| m == "@Test"),
        _ => false,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::index::CodeIndex;
    use tempfile::TempDir;

    fn build(temp: &TempDir) -> CodeIndex {
        let mut index = CodeIndex::new(temp.path(), Config::default());
        index.build("**/*", true).unwrap();
        index
    }

    fn dead_names(result: &DeadcodeResult) -> Vec<&str> {
        result
            .dead
            .iter()
            .map(|d| d.symbol.name.as_str())
            .collect()
    }

    #[test]
    fn test_uncalled_unexported_helper_is_dead() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("app.py"),
            "__all__ = [\"used\"]\n\ndef _helper():\n    pass\n\ndef used():\n    pass\n\nused()\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.deadcode(&DeadcodeOptions::default());

        assert_eq!(dead_names(&result), vec!["_helper"]);
    }

    #[test]
    fn test_any_call_site_revives_helper() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("app.py"),
            "def _helper():\n    pass\n\n_helper()\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.deadcode(&DeadcodeOptions::default());

        assert!(result.dead.is_empty());
    }

    #[test]
    fn test_exported_excluded_unless_included() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("lib.py"),
            "__all__ = [\"api\"]\n\ndef api():\n    pass\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);

        let default = engine.deadcode(&DeadcodeOptions::default());
        assert!(default.dead.is_empty());

        let included = engine.deadcode(&DeadcodeOptions {
            include_exported: true,
            ..Default::default()
        });
        assert_eq!(dead_names(&included), vec!["api"]);
        assert!(included.dead[0].exported);
    }

    #[test]
    fn test_entry_points_never_candidates() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("run.py"),
            "def main():\n    pass\n\ndef test_roundtrip():\n    pass\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.deadcode(&DeadcodeOptions::default());

        assert!(result.dead.is_empty());
        assert_eq!(result.candidates, 0);
    }

    #[test]
    fn test_override_of_indexed_parent_exempt() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("zoo.py"),
            "class Animal:\n    def speak(self):\n        pass\n\nclass Dog(Animal):\n    def speak(self):\n        pass\n\na = Animal()\na.speak\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.deadcode(&DeadcodeOptions::default());

        assert!(
            !dead_names(&result).contains(&"speak"),
            "override candidacy: {:?}",
            dead_names(&result)
        );
    }

    #[test]
    fn test_test_file_symbols_skipped_by_default() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("test_app.py"),
            "def _make_fixture():\n    pass\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);

        assert!(engine.deadcode(&DeadcodeOptions::default()).dead.is_empty());
        let included = engine.deadcode(&DeadcodeOptions {
            include_tests: true,
            ..Default::default()
        });
        assert_eq!(dead_names(&included), vec!["_make_fixture"]);
    }
}
