//! Import string resolution
//!
//! Turns an import declaration into indexed file paths, per language:
//!
//! - typescript/javascript: relative paths with extension and index-file
//!   probing, configured alias substitution, tsconfig path mapping with
//!   recursive `extends`, package-manifest root matching
//! - python: dotted absolute and leading-dot relative modules
//! - rust: `crate::`/`self::`/`super::` prefixes rooted at the nearest
//!   Cargo.toml, probing `m.rs` and `m/mod.rs`
//! - go: module-path matching against the go.mod module line
//! - java: dotted packages matched by progressively shorter path suffixes
//!
//! An import that resolves to nothing is external, never an error.
//!
//! @module graph/imports

use crate::adapters::{ImportKind, ImportRecord};
use crate::core::config::Config;
use crate::index::FileEntry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

const TS_EXTENSIONS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

/// Resolves import strings against the indexed file set
pub(crate) struct ImportResolver<'a> {
    root: &'a Path,
    /// relative path -> absolute path, sorted for deterministic matching
    rel_files: BTreeMap<String, PathBuf>,
    /// configured alias substitutions, longest prefix first
    aliases: Vec<(String, String)>,
    tsconfig: TsConfig,
    package_name: Option<String>,
    go_module: Option<String>,
}

impl<'a> ImportResolver<'a> {
    pub fn new(root: &'a Path, config: &Config, files: &HashMap<PathBuf, FileEntry>) -> Self {
        let rel_files = files
            .values()
            .map(|e| (e.relative_path.clone(), e.path.clone()))
            .collect();

        let mut aliases: Vec<(String, String)> = config
            .imports
            .aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));

        Self {
            root,
            rel_files,
            aliases,
            tsconfig: TsConfig::load(root),
            package_name: load_package_name(root),
            go_module: load_go_module(root),
        }
    }

    /// All indexed files an import record points at. Empty means external.
    pub fn resolve(&self, entry: &FileEntry, record: &ImportRecord) -> Vec<PathBuf> {
        let from_dir = parent_of(&entry.relative_path);
        match entry.language.as_str() {
            "typescript" | "javascript" => self
                .resolve_ts(&from_dir, &record.module)
                .into_iter()
                .collect(),
            "python" => self
                .resolve_python(&from_dir, &record.module)
                .into_iter()
                .collect(),
            "rust" => self
                .resolve_rust(&entry.relative_path, &record.module)
                .into_iter()
                .collect(),
            "go" => self.resolve_go(&record.module),
            "java" => self.resolve_java(record),
            _ => Vec::new(),
        }
    }

    fn probe(&self, rel: &str) -> Option<PathBuf> {
        self.rel_files.get(rel).cloned()
    }

    // -------------------------------------------------------------------------
    // TYPESCRIPT / JAVASCRIPT
    // -------------------------------------------------------------------------

    fn resolve_ts(&self, from_dir: &str, module: &str) -> Option<PathBuf> {
        if module.starts_with('.') {
            let joined = join_rel(from_dir, module)?;
            return self.probe_ts(&joined);
        }

        for (alias, target) in &self.aliases {
            if let Some(rest) = module.strip_prefix(alias.as_str()) {
                let candidate = normalize_rel(&format!("{}{}", target, rest))?;
                if let Some(hit) = self.probe_ts(&candidate) {
                    return Some(hit);
                }
            }
        }

        for candidate in self.tsconfig.candidates(module) {
            if let Some(hit) = self.probe_ts(&candidate) {
                return Some(hit);
            }
        }

        if let Some(name) = &self.package_name {
            if module == name {
                return self
                    .probe_ts("index")
                    .or_else(|| self.probe_ts("src/index"));
            }
            if let Some(rest) = module.strip_prefix(&format!("{}/", name)) {
                return self
                    .probe_ts(rest)
                    .or_else(|| self.probe_ts(&format!("src/{}", rest)));
            }
        }

        None
    }

    /// Probe a root-relative stem: exact, then each extension, then the
    /// index file of a directory import. A `.js`/`.jsx` suffix in source
    /// maps back to the compiled-from file.
    fn probe_ts(&self, rel: &str) -> Option<PathBuf> {
        if let Some(hit) = self.probe(rel) {
            return Some(hit);
        }
        let stem = rel
            .strip_suffix(".jsx")
            .or_else(|| rel.strip_suffix(".js"))
            .unwrap_or(rel);
        for ext in TS_EXTENSIONS {
            if let Some(hit) = self.probe(&format!("{}.{}", stem, ext)) {
                return Some(hit);
            }
        }
        for ext in TS_EXTENSIONS {
            if let Some(hit) = self.probe(&format!("{}/index.{}", stem, ext)) {
                return Some(hit);
            }
        }
        None
    }

    // -------------------------------------------------------------------------
    // PYTHON
    // -------------------------------------------------------------------------

    fn resolve_python(&self, from_dir: &str, module: &str) -> Option<PathBuf> {
        let (base_dir, rest) = if let Some(stripped) = module.strip_prefix('.') {
            let mut ups = 0;
            let mut rest = stripped;
            while let Some(r) = rest.strip_prefix('.') {
                ups += 1;
                rest = r;
            }
            let mut dir = from_dir.to_string();
            for _ in 0..ups {
                if dir.is_empty() {
                    return None;
                }
                dir = parent_of(&dir);
            }
            (dir, rest)
        } else {
            (String::new(), module)
        };

        if rest.is_empty() {
            return self.probe(&join_parts(&base_dir, "__init__.py"));
        }

        let path_part = rest.replace('.', "/");
        let base = join_parts(&base_dir, &path_part);
        self.probe(&format!("{}.py", base))
            .or_else(|| self.probe(&format!("{}/__init__.py", base)))
    }

    // -------------------------------------------------------------------------
    // RUST
    // -------------------------------------------------------------------------

    fn resolve_rust(&self, file_rel: &str, module: &str) -> Option<PathBuf> {
        let segments: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
        let (base, consumed) = match *segments.first()? {
            "crate" => (self.crate_src_dir(file_rel), 1),
            "self" => (rust_module_dir(file_rel), 1),
            "super" => {
                let mut dir = rust_module_dir(file_rel);
                let mut i = 0;
                while segments.get(i) == Some(&"super") {
                    if dir.is_empty() {
                        return None;
                    }
                    dir = parent_of(&dir);
                    i += 1;
                }
                (dir, i)
            }
            // Anything else names an external crate
            _ => return None,
        };

        let rest = &segments[consumed..];
        if rest.is_empty() {
            return self
                .probe(&join_parts(&base, "mod.rs"))
                .or_else(|| self.probe(&join_parts(&base, "lib.rs")))
                .or_else(|| self.probe(&join_parts(&base, "main.rs")));
        }

        // Trailing segments may be items, not modules; shorten until a
        // module file matches.
        for n in (1..=rest.len()).rev() {
            let path = rest[..n].join("/");
            let full = join_parts(&base, &path);
            if let Some(hit) = self.probe(&format!("{}.rs", full)) {
                return Some(hit);
            }
            if let Some(hit) = self.probe(&format!("{}/mod.rs", full)) {
                return Some(hit);
            }
        }
        None
    }

    /// Source directory of the crate owning `file_rel`: nearest ancestor
    /// directory with a Cargo.toml, plus `src/` when present.
    fn crate_src_dir(&self, file_rel: &str) -> String {
        let mut dir = parent_of(file_rel);
        loop {
            if self.root.join(&dir).join("Cargo.toml").exists() {
                let src = join_parts(&dir, "src");
                if self.root.join(&src).is_dir() {
                    return src;
                }
                return dir;
            }
            if dir.is_empty() {
                return "src".to_string();
            }
            dir = parent_of(&dir);
        }
    }

    // -------------------------------------------------------------------------
    // GO
    // -------------------------------------------------------------------------

    /// A Go import names a package directory; every indexed file in that
    /// directory is a target.
    fn resolve_go(&self, module: &str) -> Vec<PathBuf> {
        let Some(go_module) = &self.go_module else {
            return Vec::new();
        };
        let rel_dir = if module == go_module {
            ""
        } else if let Some(rest) = module.strip_prefix(&format!("{}/", go_module)) {
            rest
        } else {
            return Vec::new();
        };

        self.rel_files
            .iter()
            .filter(|(rel, _)| {
                let (dir, name) = rel.rsplit_once('/').unwrap_or(("", rel.as_str()));
                dir == rel_dir && name.ends_with(".go")
            })
            .map(|(_, path)| path.clone())
            .collect()
    }

    // -------------------------------------------------------------------------
    // JAVA
    // -------------------------------------------------------------------------

    /// Source roots vary (src/main/java, src, flat), so a dotted package is
    /// matched by path suffix, preferring the longest suffix that hits.
    fn resolve_java(&self, record: &ImportRecord) -> Vec<PathBuf> {
        if record.kind == ImportKind::Namespace {
            let dir_suffix = record.module.replace('.', "/");
            return self
                .rel_files
                .iter()
                .filter(|(rel, _)| {
                    rel.ends_with(".java")
                        && rel
                            .rsplit_once('/')
                            .map(|(dir, _)| {
                                dir == dir_suffix || dir.ends_with(&format!("/{}", dir_suffix))
                            })
                            .unwrap_or(false)
                })
                .map(|(_, path)| path.clone())
                .collect();
        }

        let full = format!("{}.java", record.module.replace('.', "/"));
        let parts: Vec<&str> = full.split('/').collect();
        for start in 0..parts.len() {
            let suffix = parts[start..].join("/");
            let hit = self
                .rel_files
                .iter()
                .find(|(rel, _)| {
                    *rel == &suffix || rel.ends_with(&format!("/{}", suffix))
                })
                .map(|(_, path)| path.clone());
            if let Some(hit) = hit {
                return vec![hit];
            }
        }
        Vec::new()
    }
}

// =============================================================================
// PATH HELPERS
// =============================================================================

fn parent_of(rel: &str) -> String {
    rel.rsplit_once('/').map(|(d, _)| d.to_string()).unwrap_or_default()
}

fn join_parts(dir: &str, rest: &str) -> String {
    if dir.is_empty() {
        rest.to_string()
    } else if rest.is_empty() {
        dir.to_string()
    } else {
        format!("{}/{}", dir, rest)
    }
}

/// Join a relative module onto a directory and normalize `.`/`..` segments.
/// Escaping the root yields None (external).
fn join_rel(dir: &str, module: &str) -> Option<String> {
    normalize_rel(&join_parts(dir, module))
}

fn normalize_rel(path: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            p => stack.push(p),
        }
    }
    Some(stack.join("/"))
}

/// Directory owning a Rust module's children: `foo.rs` owns `foo/`,
/// `mod.rs`/`lib.rs`/`main.rs` own their directory.
fn rust_module_dir(file_rel: &str) -> String {
    let dir = parent_of(file_rel);
    let name = file_rel.rsplit('/').next().unwrap_or(file_rel);
    let stem = name.strip_suffix(".rs").unwrap_or(name);
    if matches!(stem, "mod" | "lib" | "main") {
        dir
    } else {
        join_parts(&dir, stem)
    }
}

// =============================================================================
// MANIFEST LOADING
// =============================================================================

fn load_package_name(root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("package.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;
    value.get("name")?.as_str().map(|s| s.to_string())
}

fn load_go_module(root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("go.mod")).ok()?;
    text.lines()
        .find_map(|l| l.trim().strip_prefix("module "))
        .map(|m| m.trim().to_string())
}

/// tsconfig path mapping, with `extends` chains merged child-over-parent
#[derive(Debug, Default)]
struct TsConfig {
    base_url: String,
    /// pattern -> substitution targets; `*` in both sides
    paths: Vec<(String, Vec<String>)>,
}

impl TsConfig {
    fn load(root: &Path) -> Self {
        let mut visited = HashSet::new();
        let mut config = TsConfig::default();
        load_tsconfig_into(&root.join("tsconfig.json"), &mut config, &mut visited);
        config
    }

    /// Root-relative probe candidates for a module under the path mapping
    fn candidates(&self, module: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (pattern, targets) in &self.paths {
            let substituted: Option<Vec<String>> = match pattern.strip_suffix('*') {
                Some(prefix) => module.strip_prefix(prefix).map(|rest| {
                    targets.iter().map(|t| t.replace('*', rest)).collect()
                }),
                None if pattern == module => Some(targets.clone()),
                None => None,
            };
            if let Some(subs) = substituted {
                for sub in subs {
                    let joined = join_parts(&self.base_url, &sub);
                    if let Some(normalized) = normalize_rel(&joined) {
                        out.push(normalized);
                    }
                }
            }
        }
        out
    }
}

/// Parent settings load first so the child's entries override them. A
/// malformed file contributes nothing.
fn load_tsconfig_into(path: &Path, config: &mut TsConfig, visited: &mut HashSet<PathBuf>) {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return;
    }
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return,
    };
    let value: serde_json::Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Unparseable {}: {}", path.display(), e);
            return;
        }
    };

    if let Some(parent) = value.get("extends").and_then(|v| v.as_str()) {
        let base = path.parent().unwrap_or(Path::new(""));
        let mut parent_path = base.join(parent);
        if parent_path.extension().is_none() {
            parent_path.set_extension("json");
        }
        load_tsconfig_into(&parent_path, config, visited);
    }

    let options = value.get("compilerOptions");
    if let Some(base_url) = options
        .and_then(|o| o.get("baseUrl"))
        .and_then(|v| v.as_str())
    {
        config.base_url = base_url.trim_start_matches("./").trim_matches('/').to_string();
    }
    if let Some(paths) = options
        .and_then(|o| o.get("paths"))
        .and_then(|v| v.as_object())
    {
        for (pattern, targets) in paths {
            let targets: Vec<String> = targets
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|t| t.as_str())
                        .map(|t| t.trim_start_matches("./").to_string())
                        .collect()
                })
                .unwrap_or_default();
            config.paths.retain(|(p, _)| p != pattern);
            config.paths.push((pattern.clone(), targets));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
