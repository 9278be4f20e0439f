//! Query engine
//!
//! Read-side operations over a built index. Queries never fail outward:
//! the only user-visible outcomes are a result object, or "not found" with
//! fuzzy suggestions. The engine opportunistically fills the call cache and
//! a bounded source cache, the only state it mutates.
//!
//! @module query

pub mod deadcode;
pub mod impact;
pub mod stacktrace;
pub mod traverse;

pub use deadcode::{DeadSymbol, DeadcodeOptions, DeadcodeResult};
pub use impact::{ImpactResult, PlanOperation, PlanResult, VerifyResult};
pub use stacktrace::StackTraceResult;
pub use traverse::{GraphDirection, GraphNode, TraceNode};

use crate::adapters::{adapter_for, detect_language, UsageRecord};
use crate::calls::{weight_label, CallSiteResolver, CalleesResult, CallersResult};
use crate::core::project::is_test_file;
use crate::discovery::{DiscoveryOptions, FileDiscovery};
use crate::graph::TypeRef;
use crate::index::{CodeIndex, Symbol};
use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// A fuzzy-match candidate for an unknown name
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub score: i32,
}

/// Winner plus every losing candidate; alternatives are never hidden
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub symbol: Symbol,
    pub score: i32,
    pub alternatives: Vec<Symbol>,
}

/// Outcome of a name lookup
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Lookup<T> {
    Found(T),
    NotFound {
        name: String,
        suggestions: Vec<Suggestion>,
    },
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileUsages {
    pub file: PathBuf,
    pub usages: Vec<UsageRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsagesResult {
    pub name: String,
    pub total: usize,
    pub files: Vec<FileUsages>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextResult {
    pub resolution: Resolution,
    pub callers: CallersResult,
    pub callees: CalleesResult,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AboutResult {
    pub symbol: Symbol,
    pub signature: String,
    pub exported: bool,
    pub call_count: usize,
    pub weight: String,
    pub language: String,
    pub alternatives: Vec<Symbol>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedResult {
    pub symbol: Symbol,
    /// Members of the same class (or of this class, when the symbol is one)
    pub class_members: Vec<Symbol>,
    /// Other top-level symbols in the same file
    pub file_siblings: Vec<Symbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub subtypes: Vec<TypeRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartResult {
    pub resolution: Resolution,
    pub usage_total: usize,
    pub usage_files: usize,
    pub callers: CallersResult,
    pub callees: CalleesResult,
    pub related: RelatedResult,
    pub warnings: Vec<String>,
}

/// How much of the project static analysis can actually see
#[derive(Debug, Clone, Serialize)]
pub struct CompletenessReport {
    pub indexed_files: usize,
    pub tree_files: usize,
    pub dynamic_constructs: usize,
    pub dynamic_files: usize,
}

// =============================================================================
// SOURCE CACHE
// =============================================================================

/// Bounded cache of file contents for line-level inspection. Cleared after
/// bulk operations to bound memory.
pub(crate) struct SourceCache {
    lru: Mutex<LruCache<PathBuf, Arc<String>>>,
}

impl SourceCache {
    fn new() -> Self {
        let capacity = NonZeroUsize::new(64).unwrap_or(NonZeroUsize::MIN);
        Self {
            lru: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn content(&self, path: &Path) -> Option<Arc<String>> {
        let mut lru = self.lru.lock();
        if let Some(hit) = lru.get(path) {
            return Some(hit.clone());
        }
        let text = std::fs::read_to_string(path).ok()?;
        let arc = Arc::new(text);
        lru.put(path.to_path_buf(), arc.clone());
        Some(arc)
    }

    /// 1-indexed line text
    pub fn line(&self, path: &Path, line: u32) -> Option<String> {
        self.content(path)?
            .lines()
            .nth(line.saturating_sub(1) as usize)
            .map(|l| l.to_string())
    }

    pub fn clear(&self) {
        self.lru.lock().clear();
    }
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct QueryEngine<'a> {
    pub(crate) index: &'a CodeIndex,
    pub(crate) resolver: CallSiteResolver<'a>,
    pub(crate) source: SourceCache,
    completeness: OnceCell<CompletenessReport>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a CodeIndex) -> Self {
        Self {
            index,
            resolver: CallSiteResolver::new(index),
            source: SourceCache::new(),
            completeness: OnceCell::new(),
        }
    }

    // -------------------------------------------------------------------------
    // RESOLUTION
    // -------------------------------------------------------------------------

    /// Pick the best definition for a name. Type-like definitions beat
    /// callables, production paths beat tests and vendored code. Losing
    /// candidates are returned as alternatives.
    pub fn resolve_symbol(&self, name: &str, file_filter: Option<&str>) -> Lookup<Resolution> {
        let mut candidates: Vec<&Symbol> = self.index.symbols.get(name).iter().collect();
        if let Some(filter) = file_filter {
            candidates.retain(|s| self.index.relative_path(&s.file).contains(filter));
        }
        if candidates.is_empty() {
            return Lookup::NotFound {
                name: name.to_string(),
                suggestions: self.suggestions_for(name),
            };
        }

        let mut scored: Vec<(i32, &Symbol)> = candidates
            .into_iter()
            .map(|s| (self.candidate_score(s), s))
            .collect();
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.file.cmp(&b.1.file))
                .then_with(|| a.1.start_line.cmp(&b.1.start_line))
        });

        let (score, winner) = scored[0];
        Lookup::Found(Resolution {
            symbol: winner.clone(),
            score,
            alternatives: scored[1..].iter().map(|(_, s)| (*s).clone()).collect(),
        })
    }

    fn candidate_score(&self, symbol: &Symbol) -> i32 {
        const DEPRIORITIZED: [&str; 7] = [
            "examples",
            "docs",
            "vendor",
            "third_party",
            "third-party",
            "benchmarks",
            "samples",
        ];
        const PREFERRED: [&str; 6] = ["lib", "src", "core", "internal", "pkg", "crates"];

        let language = self.language_of(&symbol.file);
        let relative = self.index.relative_path(&symbol.file);

        let mut score = 0;
        if symbol.kind.is_type_like() {
            score += 1000;
        }
        if is_test_file(&symbol.file, &language) {
            score -= 500;
        }

        let lowered = relative.to_lowercase();
        let dirs: Vec<&str> = lowered.split('/').collect();
        let dirs = &dirs[..dirs.len().saturating_sub(1)];
        if dirs.iter().any(|d| DEPRIORITIZED.contains(d)) {
            score -= 300;
        }
        if dirs.iter().any(|d| PREFERRED.contains(d)) {
            score += 200;
        }
        score
    }

    fn language_of(&self, path: &Path) -> String {
        self.index
            .files
            .get(path)
            .map(|e| e.language.clone())
            .unwrap_or_else(|| detect_language(path).to_string())
    }

    /// `find` is resolution plus suggestions, the front door for a name
    pub fn find(&self, name: &str, file_filter: Option<&str>) -> Lookup<Resolution> {
        self.resolve_symbol(name, file_filter)
    }

    fn suggestions_for(&self, name: &str) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = self
            .index
            .symbols
            .names()
            .filter_map(|candidate| {
                fuzzy_score(name, candidate.as_str()).map(|score| Suggestion {
                    name: candidate.to_string(),
                    score,
                })
            })
            .collect();
        suggestions.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        suggestions.truncate(10);
        suggestions
    }

    // -------------------------------------------------------------------------
    // USAGE QUERIES
    // -------------------------------------------------------------------------

    /// Adapter-driven occurrence scan across all indexed files
    pub fn usages(&self, name: &str) -> UsagesResult {
        let mut paths: Vec<&PathBuf> = self.index.files.keys().collect();
        paths.sort();

        let mut files = Vec::new();
        let mut total = 0;
        for path in paths {
            let entry = &self.index.files[path.as_path()];
            let adapter = match adapter_for(&entry.language) {
                Some(adapter) => adapter,
                None => continue,
            };
            let content = match self.source.content(path) {
                Some(content) => content,
                None => continue,
            };
            if !content.contains(name) {
                continue;
            }
            let mut usages = adapter.find_usages(&content, name);
            for callback in adapter.find_callback_usages(&content, name) {
                if !usages.iter().any(|u| u.line == callback.line) {
                    usages.push(callback);
                }
            }
            if usages.is_empty() {
                continue;
            }
            usages.sort_by_key(|u| u.line);
            total += usages.len();
            files.push(FileUsages {
                file: (*path).clone(),
                usages,
            });
        }

        UsagesResult {
            name: name.to_string(),
            total,
            files,
            warnings: self.completeness_warnings(),
        }
    }

    /// Definition plus who calls it and what it calls
    pub fn context(&self, name: &str) -> Lookup<ContextResult> {
        let resolution = match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => resolution,
            Lookup::NotFound { name, suggestions } => {
                return Lookup::NotFound { name, suggestions }
            }
        };
        let callers = self.resolver.callers_of(&resolution.symbol);
        let callees = self.resolver.callees_of(&resolution.symbol);
        Lookup::Found(ContextResult {
            resolution,
            callers,
            callees,
            warnings: self.completeness_warnings(),
        })
    }

    /// Combined definition/usages/call/relation summary
    pub fn smart(&self, name: &str) -> Lookup<SmartResult> {
        let resolution = match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => resolution,
            Lookup::NotFound { name, suggestions } => {
                return Lookup::NotFound { name, suggestions }
            }
        };
        let usages = self.usages(name);
        let callers = self.resolver.callers_of(&resolution.symbol);
        let callees = self.resolver.callees_of(&resolution.symbol);
        let related = self.related_for(&resolution.symbol);
        Lookup::Found(SmartResult {
            resolution,
            usage_total: usages.total,
            usage_files: usages.files.len(),
            callers,
            callees,
            related,
            warnings: usages.warnings,
        })
    }

    // -------------------------------------------------------------------------
    // SYMBOL CARDS
    // -------------------------------------------------------------------------

    pub fn about(&self, name: &str) -> Lookup<AboutResult> {
        let resolution = match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => resolution,
            Lookup::NotFound { name, suggestions } => {
                return Lookup::NotFound { name, suggestions }
            }
        };
        let symbol = resolution.symbol;
        let exported = self
            .index
            .files
            .get(&symbol.file)
            .map(|e| e.exported_names.iter().any(|n| n == symbol.name.as_str()))
            .unwrap_or(false);
        let call_count = self.resolver.call_count(symbol.name.as_str());
        let signature = signature_of(&symbol);
        let language = self.language_of(&symbol.file);
        Lookup::Found(AboutResult {
            signature,
            exported,
            call_count,
            weight: weight_label(call_count).to_string(),
            language,
            alternatives: resolution.alternatives,
            symbol,
        })
    }

    pub fn related(&self, name: &str) -> Lookup<RelatedResult> {
        match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => Lookup::Found(self.related_for(&resolution.symbol)),
            Lookup::NotFound { name, suggestions } => Lookup::NotFound { name, suggestions },
        }
    }

    fn related_for(&self, symbol: &Symbol) -> RelatedResult {
        let entry = self.index.files.get(&symbol.file);

        let class_of_interest = if symbol.kind.is_type_like() {
            Some(symbol.name.as_str())
        } else {
            symbol.class_name.as_deref()
        };

        let class_members = match (entry, class_of_interest) {
            (Some(entry), Some(class)) => entry
                .symbols
                .iter()
                .filter(|s| {
                    s.class_name.as_deref() == Some(class) && s.binding_id != symbol.binding_id
                })
                .cloned()
                .collect(),
            _ => Vec::new(),
        };

        let file_siblings = entry
            .map(|e| {
                e.symbols
                    .iter()
                    .filter(|s| s.class_name.is_none() && s.binding_id != symbol.binding_id)
                    .take(20)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let graph_name = class_of_interest.unwrap_or(symbol.name.as_str());
        RelatedResult {
            symbol: symbol.clone(),
            class_members,
            file_siblings,
            parent: self.index.graphs.extends_graph.get(graph_name).cloned(),
            subtypes: self.index.graphs.subtypes_of(graph_name).to_vec(),
        }
    }

    // -------------------------------------------------------------------------
    // COMPLETENESS
    // -------------------------------------------------------------------------

    /// One whole-project scan for analysis-defeating dynamism, cached for
    /// the engine's lifetime. A heuristic lower bound, not exhaustive.
    pub fn completeness(&self) -> &CompletenessReport {
        self.completeness.get_or_init(|| {
            let mut dynamic_constructs = 0;
            let mut dynamic_files = 0;
            for (path, entry) in &self.index.files {
                let adapter = match adapter_for(&entry.language) {
                    Some(adapter) => adapter,
                    None => continue,
                };
                let count = self
                    .source
                    .content(path)
                    .map(|content| adapter.count_dynamic(&content))
                    .unwrap_or(0);
                if count > 0 {
                    dynamic_constructs += count;
                    dynamic_files += 1;
                }
            }

            let discovery = FileDiscovery::new(DiscoveryOptions::from_config(
                &self.index.root,
                &self.index.config.discovery,
            ));
            CompletenessReport {
                indexed_files: self.index.files.len(),
                tree_files: discovery.count_files(),
                dynamic_constructs,
                dynamic_files,
            }
        })
    }

    /// Non-fatal warnings attached to occurrence-based queries
    pub fn completeness_warnings(&self) -> Vec<String> {
        let report = self.completeness();
        let mut warnings = Vec::new();
        if report.dynamic_constructs > 0 {
            warnings.push(format!(
                "{} dynamic constructs in {} files may hide references from static analysis",
                report.dynamic_constructs, report.dynamic_files
            ));
        }
        if report.tree_files > report.indexed_files * 2 {
            warnings.push(format!(
                "only {} of {} files in the tree are indexed; results may be partial",
                report.indexed_files, report.tree_files
            ));
        }
        warnings
    }
}

/// Human-readable one-line signature
pub fn signature_of(symbol: &Symbol) -> String {
    let mut sig = String::new();
    if symbol.is_async {
        sig.push_str("async ");
    }
    sig.push_str(symbol.name.as_str());
    if symbol.kind.is_callable() {
        sig.push('(');
        sig.push_str(&symbol.raw_params);
        sig.push(')');
        if let Some(ret) = &symbol.return_type {
            sig.push_str(" -> ");
            sig.push_str(ret);
        }
    }
    sig
}

// =============================================================================
// FUZZY MATCHING
// =============================================================================

/// Score a candidate name against a query; None means excluded.
pub fn fuzzy_score(query: &str, candidate: &str) -> Option<i32> {
    if candidate == query {
        return Some(1000);
    }
    if candidate.eq_ignore_ascii_case(query) {
        return Some(900);
    }

    let query_lower = query.to_lowercase();
    let candidate_lower = candidate.to_lowercase();

    if candidate_lower.starts_with(&query_lower) {
        let overshoot = (candidate.len() - query.len()).min(60) as i32;
        return Some(860 - overshoot);
    }

    if is_subsequence(&query_lower, &hump_initials(candidate).to_lowercase()) {
        return Some(600);
    }

    if let Some(pos) = candidate_lower.find(&query_lower) {
        let penalty = pos.min(60) as i32;
        return Some(460 - penalty);
    }

    let word_prefix = split_words(candidate)
        .iter()
        .any(|w| w.to_lowercase().starts_with(&query_lower));
    if word_prefix {
        return Some(300);
    }

    None
}

/// First letter plus every hump: `getUserCount` -> "gUC", `read_file` -> "rf"
fn hump_initials(name: &str) -> String {
    let mut initials = String::new();
    let mut new_word = true;
    for c in name.chars() {
        if c == '_' || c == '-' {
            new_word = true;
            continue;
        }
        if new_word || c.is_uppercase() {
            initials.push(c);
        }
        new_word = false;
    }
    initials
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut chars = haystack.chars();
    needle.chars().all(|n| chars.any(|h| h == n))
}

fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use tempfile::TempDir;

    fn build(temp: &TempDir) -> CodeIndex {
        let mut index = CodeIndex::new(temp.path(), Config::default());
        index.build("**/*", true).unwrap();
        index
    }

    #[test]
    fn test_fuzzy_score_tiers() {
        assert_eq!(fuzzy_score("getUser", "getUser"), Some(1000));
        assert_eq!(fuzzy_score("getuser", "getUser"), Some(900));
        assert!(fuzzy_score("get", "getUserCount").unwrap() >= 800);
        assert_eq!(fuzzy_score("guc", "getUserCount"), Some(600));
        assert!(matches!(fuzzy_score("User", "fetchUserData"), Some(s) if (400..600).contains(&s)));
        assert_eq!(fuzzy_score("count", "user_count_total"), Some(300));
        assert_eq!(fuzzy_score("zzz", "getUserCount"), None);
    }

    #[test]
    fn test_resolve_prefers_type_over_function() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("a.py"),
            "def Config():\n    pass\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("b.py"),
            "class Config:\n    pass\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let resolution = engine.resolve_symbol("Config", None).found().unwrap();

        assert!(resolution.symbol.kind.is_type_like());
        assert_eq!(resolution.alternatives.len(), 1);
    }

    #[test]
    fn test_resolve_penalizes_test_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("helpers.py"), "def setup():\n    pass\n").unwrap();
        std::fs::write(temp.path().join("test_helpers.py"), "def setup():\n    pass\n").unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let resolution = engine.resolve_symbol("setup", None).found().unwrap();

        assert!(resolution.symbol.file.ends_with("helpers.py"));
        assert_eq!(resolution.alternatives.len(), 1);
    }

    #[test]
    fn test_not_found_offers_suggestions() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("a.py"),
            "def process_batch():\n    pass\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        match engine.resolve_symbol("process", None) {
            Lookup::NotFound { suggestions, .. } => {
                assert!(suggestions.iter().any(|s| s.name == "process_batch"));
            }
            Lookup::Found(_) => panic!("expected not-found"),
        }
    }

    #[test]
    fn test_usages_across_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("util.py"), "def shared():\n    pass\n").unwrap();
        std::fs::write(
            temp.path().join("main.py"),
            "from util import shared\n\nshared()\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.usages("shared");

        assert_eq!(result.files.len(), 2);
        assert!(result.total >= 3);
    }

    #[test]
    fn test_about_reports_export_and_weight() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("lib.py"),
            "__all__ = [\"entry\"]\n\ndef entry():\n    pass\n\ndef caller():\n    entry()\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let about = engine.about("entry").found().unwrap();

        assert!(about.exported);
        assert_eq!(about.call_count, 1);
        assert_eq!(about.weight, "utility");
    }

    #[test]
    fn test_related_members_and_subtypes() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("zoo.py"),
            "class Animal:\n    def speak(self):\n        pass\n\nclass Dog(Animal):\n    def speak(self):\n        pass\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let related = engine.related("Animal").found().unwrap();

        assert_eq!(related.class_members.len(), 1);
        assert_eq!(related.subtypes.len(), 1);
        assert_eq!(related.subtypes[0].name, "Dog");
    }

    #[test]
    fn test_completeness_counts_dynamic_constructs() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("dyn.py"),
            "def load(name):\n    return eval(name)\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let report = engine.completeness();

        assert_eq!(report.dynamic_files, 1);
        assert!(report.dynamic_constructs >= 1);
        assert!(!engine.completeness_warnings().is_empty());
    }
}
