//! Language Adapters
//!
//! One adapter per supported language, behind a fixed contract: structural
//! parse plus call/import/export/usage extraction. Extraction is best-effort
//! regex scanning over source text; an adapter failure yields empty data,
//! never an error. Adapter selection is a closed lookup table keyed by the
//! detected language.
//!
//! @module adapters

pub mod go;
pub mod java;
pub mod python;
pub mod rust;
pub mod typescript;

use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// RECORD TYPES
// =============================================================================

/// Kind of symbol extracted from source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Constructor,
    Class,
    Struct,
    Interface,
    Trait,
    TypeAlias,
    Enum,
    State,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::TypeAlias => "type",
            Self::Enum => "enum",
            Self::State => "state",
            Self::Variable => "variable",
        }
    }

    /// Type-like definitions rank above callables in symbol resolution.
    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            Self::Class
                | Self::Struct
                | Self::Interface
                | Self::Trait
                | Self::TypeAlias
                | Self::Enum
        )
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Function | Self::Method | Self::Constructor)
    }
}

/// A single declared parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub rest: bool,
}

/// A function or method definition
#[derive(Debug, Clone, Default)]
pub struct FunctionDef {
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub raw_params: String,
    pub params: Vec<ParamInfo>,
    pub return_type: Option<String>,
    pub modifiers: Vec<String>,
    pub docstring: Option<String>,
    pub is_async: bool,
    /// Explicit receiver for receiver-syntax methods (`func (r *T) Name`)
    pub receiver: Option<String>,
}

/// A class/struct/interface/trait/enum definition with its members
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub methods: Vec<FunctionDef>,
    /// Instance-attribute name -> type name, from constructor assignments
    pub attribute_types: Vec<(String, String)>,
    pub docstring: Option<String>,
}

/// A module-level state object (exported const table, module global)
#[derive(Debug, Clone)]
pub struct StateDef {
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
    pub is_exported: bool,
}

/// Structural parse result for one file
#[derive(Debug, Clone, Default)]
pub struct ParsedModule {
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub state_objects: Vec<StateDef>,
}

/// Function enclosing a call site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnclosingFn {
    pub name: String,
    pub start_line: u32,
}

/// A call site extracted from source text.
///
/// `binding_id` and `uncertain` are filled by the call-site resolver; the
/// adapter provides the structural fields only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub name: String,
    pub line: u32,
    pub is_method: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing: Option<EnclosingFn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_id: Option<String>,
    #[serde(default)]
    pub uncertain: bool,
}

/// How an import was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import { a, b } from "m"` / `from m import a, b` / `use m::{a, b}`
    Named,
    /// `import m` / `import "pkg"` / bare module import
    Module,
    /// `import * as m` / `import a.b.*`
    Namespace,
    /// `import "m"` for side effects only
    SideEffect,
    /// `require("m")`
    Require,
    /// Re-export (`export * from`, `pub use`)
    ReExport,
}

/// One import declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub module: String,
    pub names: Vec<String>,
    pub kind: ImportKind,
    #[serde(default)]
    pub dynamic: bool,
    pub line: u32,
}

/// One exported name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub name: String,
    pub kind: SymbolKind,
    pub line: u32,
    #[serde(default)]
    pub is_variable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decl_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,
}

/// Classification of a name occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    Call,
    Import,
    Definition,
    Reference,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Import => "import",
            Self::Definition => "definition",
            Self::Reference => "reference",
        }
    }
}

/// One occurrence of a name in a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub line: u32,
    pub usage_type: UsageType,
}

// =============================================================================
// ADAPTER CONTRACT
// =============================================================================

/// Per-language structural extraction contract consumed by the index.
///
/// Implementations are pure text scanners: no I/O, no shared state. Every
/// method is total over arbitrary input; unparseable text yields empty
/// results.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> &'static str;

    fn parse(&self, text: &str) -> ParsedModule;

    fn find_calls(&self, text: &str) -> Vec<CallRecord>;

    fn find_imports(&self, text: &str) -> Vec<ImportRecord>;

    fn find_exports(&self, text: &str) -> Vec<ExportRecord>;

    fn find_usages(&self, text: &str, name: &str) -> Vec<UsageRecord>;

    /// Occurrences of `name` passed as a bare callback argument.
    fn find_callback_usages(&self, _text: &str, _name: &str) -> Vec<UsageRecord> {
        Vec::new()
    }

    /// Re-export declarations (`export * from`, `pub use`).
    fn find_re_exports(&self, _text: &str) -> Vec<ImportRecord> {
        Vec::new()
    }

    /// Count of dynamism markers that defeat static analysis (dynamic
    /// imports, eval-like constructs, reflection access).
    fn count_dynamic(&self, _text: &str) -> usize {
        0
    }
}

/// Look up the adapter for a detected language. Closed set; unknown
/// languages have no adapter and contribute nothing to the index.
pub fn adapter_for(language: &str) -> Option<&'static dyn LanguageAdapter> {
    match language {
        "typescript" | "javascript" => Some(&typescript::TypeScriptAdapter),
        "python" => Some(&python::PythonAdapter),
        "rust" => Some(&rust::RustAdapter),
        "go" => Some(&go::GoAdapter),
        "java" => Some(&java::JavaAdapter),
        _ => None,
    }
}

// =============================================================================
// LANGUAGE DETECTION
// =============================================================================

/// Detect language from file path extension
pub fn detect_language(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| match ext.to_lowercase().as_str() {
            "ts" | "tsx" | "mts" | "cts" => "typescript",
            "js" | "jsx" | "mjs" | "cjs" => "javascript",
            "py" | "pyi" => "python",
            "rs" => "rust",
            "go" => "go",
            "java" => "java",
            _ => "unknown",
        })
        .unwrap_or("unknown")
}

/// Whether a language has a built-in adapter
pub fn is_supported(language: &str) -> bool {
    adapter_for(language).is_some()
}

// =============================================================================
// SHARED SCANNING HELPERS
// =============================================================================

/// 1-indexed line number of a byte offset
pub(crate) fn line_of(content: &str, byte_offset: usize) -> u32 {
    content[..byte_offset].matches('\n').count() as u32 + 1
}

/// Estimate the end line of a definition starting at `start_line` (1-indexed).
///
/// Brace-counting for brace languages; dedent scanning for indentation
/// languages. Falls back to a bounded window when no end is found.
pub(crate) fn estimate_end_line(lines: &[&str], start_line: usize) -> usize {
    if start_line == 0 || start_line > lines.len() {
        return start_line;
    }

    let start_idx = start_line - 1;
    let start_indent = lines
        .get(start_idx)
        .map(|l| l.len() - l.trim_start().len())
        .unwrap_or(0);

    let mut brace_count = 0i32;
    let mut found_opening = false;

    for (i, line) in lines.iter().enumerate().skip(start_idx) {
        let trimmed = line.trim();

        for ch in trimmed.chars() {
            match ch {
                '{' => {
                    brace_count += 1;
                    found_opening = true;
                }
                '}' => brace_count -= 1,
                _ => {}
            }
        }

        if found_opening && brace_count == 0 {
            return i + 1;
        }

        // Indentation languages: a non-comment line back at or below the
        // starting indent ends the block.
        if !found_opening && i > start_idx {
            let current_indent = line.len() - line.trim_start().len();
            if !trimmed.is_empty() && current_indent <= start_indent && !trimmed.starts_with('#') {
                return i;
            }
        }
    }

    (start_line + 50).min(lines.len())
}

/// Split a parameter or argument list at top-level commas only.
///
/// Depth-aware over `()[]{}<>` and both quote styles, so `f(a, [b, c])`
/// splits into two parts, not three.
pub fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut in_quote: Option<char> = None;
    let mut prev = '\0';

    for ch in s.chars() {
        match in_quote {
            Some(q) => {
                current.push(ch);
                if ch == q && prev != '\\' {
                    in_quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    in_quote = Some(ch);
                    current.push(ch);
                }
                '(' | '[' | '{' | '<' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' | ']' | '}' | '>' => {
                    // `=>` and comparison operators must not drive depth negative
                    if depth > 0 {
                        depth -= 1;
                    }
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    let part = current.trim();
                    if !part.is_empty() {
                        parts.push(part.to_string());
                    }
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
        prev = ch;
    }

    let part = current.trim();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
    parts
}

/// (name, start_line, end_line) spans of every callable in a parse,
/// including class methods, sorted by start line.
pub(crate) fn function_spans(module: &ParsedModule) -> Vec<(String, u32, u32)> {
    let mut spans: Vec<(String, u32, u32)> = module
        .functions
        .iter()
        .map(|f| (f.name.clone(), f.start_line, f.end_line))
        .collect();
    for class in &module.classes {
        for m in &class.methods {
            spans.push((m.name.clone(), m.start_line, m.end_line));
        }
    }
    spans.sort_by_key(|s| s.1);
    spans
}

/// Innermost function span containing `line`
pub(crate) fn enclosing_at(spans: &[(String, u32, u32)], line: u32) -> Option<EnclosingFn> {
    spans
        .iter()
        .filter(|(_, start, end)| *start <= line && line <= *end)
        .min_by_key(|(_, start, end)| end - start)
        .map(|(name, start, _)| EnclosingFn {
            name: name.clone(),
            start_line: *start,
        })
}

/// Configuration for the shared call scanner
pub(crate) struct CallScan<'a> {
    /// Names to skip entirely (keywords, well-known builtins)
    pub skip: &'a dyn Fn(&str) -> bool,
    /// Receiver names meaning "the enclosing instance" (`self`, `this`, `cls`)
    pub implicit_receivers: &'a [&'a str],
}

/// Shared call-site scanner over `identifier(` and `receiver.method(`.
///
/// Definition sites (the identifier right after a declaration keyword) are
/// excluded so `def foo(` does not count as a call of `foo`.
pub(crate) fn scan_calls(
    content: &str,
    cfg: &CallScan<'_>,
    spans: &[(String, u32, u32)],
) -> Vec<CallRecord> {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static CALL_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?:([A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*)\s*\.\s*)?([A-Za-z_$][A-Za-z0-9_$]*)\s*\(",
        )
        .unwrap()
    });

    const DECL_KEYWORDS: &[&str] = &[
        "fn", "def", "func", "function", "class", "struct", "trait", "interface", "enum", "impl",
    ];

    let mut calls = Vec::new();

    for caps in CALL_RE.captures_iter(content) {
        let name_match = match caps.get(2) {
            Some(m) => m,
            None => continue,
        };
        let name = name_match.as_str();
        if (cfg.skip)(name) {
            continue;
        }

        let receiver = caps.get(1).map(|m| m.as_str().to_string());

        // Skip definition sites: declaration keyword immediately before the
        // matched identifier on the same line.
        let match_start = caps.get(0).map(|m| m.start()).unwrap_or(name_match.start());
        let line_start = content[..match_start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let prefix = &content[line_start..match_start];
        let last_word = prefix
            .trim_end()
            .rsplit(|c: char| !c.is_alphanumeric() && c != '_')
            .next()
            .unwrap_or("");
        if DECL_KEYWORDS.contains(&last_word) {
            continue;
        }
        // `new Name(` is a construction, recorded as a call of the type name
        let is_construction = last_word == "new";

        let line = line_of(content, name_match.start());

        // A name on its own definition line is the declaration, not a call
        if spans
            .iter()
            .any(|(span_name, start, _)| span_name == name && *start == line)
        {
            continue;
        }

        let (is_method, self_attribute) = match &receiver {
            Some(recv) => {
                let mut parts = recv.split('.');
                let head = parts.next().unwrap_or("");
                let attr = if cfg.implicit_receivers.contains(&head) {
                    parts.next().map(|s| s.to_string())
                } else {
                    None
                };
                (true, attr)
            }
            None => (false, None),
        };

        calls.push(CallRecord {
            name: name.to_string(),
            line,
            is_method: is_method && !is_construction,
            receiver,
            self_attribute,
            enclosing: enclosing_at(spans, line),
            binding_id: None,
            uncertain: false,
        });
    }

    calls
}

/// Shared usage scanner: word-boundary occurrences of `name`, classified by
/// the shape of the containing line.
pub(crate) fn scan_usages(
    content: &str,
    name: &str,
    is_import_line: &dyn Fn(&str) -> bool,
    is_def_line: &dyn Fn(&str) -> bool,
) -> Vec<UsageRecord> {
    let pattern = match regex::Regex::new(&format!(r"\b{}\b", regex::escape(name))) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    let mut usages = Vec::new();
    for (idx, line_text) in content.lines().enumerate() {
        for mat in pattern.find_iter(line_text) {
            let usage_type = if is_def_line(line_text) {
                UsageType::Definition
            } else if is_import_line(line_text) {
                UsageType::Import
            } else {
                let rest = line_text[mat.end()..].trim_start();
                if rest.starts_with('(') {
                    UsageType::Call
                } else {
                    UsageType::Reference
                }
            };
            usages.push(UsageRecord {
                line: idx as u32 + 1,
                usage_type,
            });
        }
    }
    usages
}

/// Shared callback-argument scanner: `name` as a bare argument, not invoked.
pub(crate) fn scan_callback_usages(content: &str, name: &str) -> Vec<UsageRecord> {
    let pattern = match regex::Regex::new(&format!(
        r"[(,]\s*{}\s*[),]",
        regex::escape(name)
    )) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };

    let mut usages = Vec::new();
    for (idx, line_text) in content.lines().enumerate() {
        for _ in pattern.find_iter(line_text) {
            usages.push(UsageRecord {
                line: idx as u32 + 1,
                usage_type: UsageType::Reference,
            });
        }
    }
    usages
}

/// Count regex matches of dynamism markers in `text`
pub(crate) fn count_matches(text: &str, patterns: &[&regex::Regex]) -> usize {
    patterns.iter().map(|re| re.find_iter(text).count()).sum()
}

/// Read a balanced `open`..`close` span starting at `open_idx` (which must
/// point at `open`). Returns the inner text and the byte index just past the
/// closing delimiter. Quote-aware so `)` inside a string does not close.
pub(crate) fn read_balanced(
    content: &str,
    open_idx: usize,
    open: char,
    close: char,
) -> Option<(String, usize)> {
    let bytes = content.as_bytes();
    if open_idx >= bytes.len() || bytes[open_idx] as char != open {
        return None;
    }

    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    let mut prev = '\0';

    for (i, ch) in content[open_idx..].char_indices() {
        match in_quote {
            Some(q) => {
                if ch == q && prev != '\\' {
                    in_quote = None;
                }
            }
            None => {
                if ch == '\'' || ch == '"' || ch == '`' {
                    in_quote = Some(ch);
                } else if ch == open {
                    depth += 1;
                } else if ch == close {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &content[open_idx + open.len_utf8()..open_idx + i];
                        return Some((inner.to_string(), open_idx + i + close.len_utf8()));
                    }
                }
            }
        }
        prev = ch;
    }
    None
}

/// Doc block (`/** .. */`) ending on the line above `def_idx` (0-indexed)
pub(crate) fn block_doc_above(lines: &[&str], def_idx: usize) -> Option<String> {
    if def_idx == 0 {
        return None;
    }
    let mut i = def_idx - 1;
    if !lines.get(i)?.trim_end().ends_with("*/") {
        return None;
    }
    let mut collected = Vec::new();
    loop {
        let trimmed = lines[i].trim();
        collected.push(trimmed);
        if trimmed.starts_with("/**") || trimmed.starts_with("/*") {
            break;
        }
        if i == 0 {
            return None;
        }
        i -= 1;
    }
    collected.reverse();
    let text = collected
        .iter()
        .map(|l| {
            l.trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches('*')
                .trim()
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Contiguous line-comment doc (`///` or `//`) above `def_idx` (0-indexed)
pub(crate) fn line_doc_above(lines: &[&str], def_idx: usize, prefix: &str) -> Option<String> {
    let mut collected = Vec::new();
    let mut i = def_idx;
    while i > 0 {
        i -= 1;
        let trimmed = lines[i].trim();
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            collected.push(rest.trim());
        } else if trimmed.starts_with("#[") || trimmed.starts_with('@') {
            // Attributes and annotations sit between doc and definition
            continue;
        } else {
            break;
        }
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    Some(collected.join(" "))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Path::new("foo.ts")), "typescript");
        assert_eq!(detect_language(Path::new("foo.tsx")), "typescript");
        assert_eq!(detect_language(Path::new("foo.js")), "javascript");
        assert_eq!(detect_language(Path::new("foo.py")), "python");
        assert_eq!(detect_language(Path::new("foo.rs")), "rust");
        assert_eq!(detect_language(Path::new("foo.go")), "go");
        assert_eq!(detect_language(Path::new("Foo.java")), "java");
        assert_eq!(detect_language(Path::new("foo.xyz")), "unknown");
    }

    #[test]
    fn test_adapter_lookup() {
        assert!(adapter_for("typescript").is_some());
        assert!(adapter_for("javascript").is_some());
        assert!(adapter_for("python").is_some());
        assert!(adapter_for("rust").is_some());
        assert!(adapter_for("go").is_some());
        assert!(adapter_for("java").is_some());
        assert!(adapter_for("cobol").is_none());
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(split_top_level("a, b, c"), vec!["a", "b", "c"]);
        assert_eq!(split_top_level("a, [b, c]"), vec!["a", "[b, c]"]);
        assert_eq!(split_top_level("f(x, y), z"), vec!["f(x, y)", "z"]);
        assert_eq!(split_top_level(r#""a, b", c"#), vec![r#""a, b""#, "c"]);
        assert_eq!(split_top_level("Map<K, V> m, int n"), vec!["Map<K, V> m", "int n"]);
        assert!(split_top_level("").is_empty());
    }

    #[test]
    fn test_enclosing_at_innermost() {
        let spans = vec![
            ("outer".to_string(), 1, 20),
            ("inner".to_string(), 5, 10),
        ];
        assert_eq!(enclosing_at(&spans, 7).unwrap().name, "inner");
        assert_eq!(enclosing_at(&spans, 15).unwrap().name, "outer");
        assert!(enclosing_at(&spans, 30).is_none());
    }

    #[test]
    fn test_estimate_end_line_braces() {
        let src = "fn foo() {\n    body();\n}\nfn bar() {}\n";
        let lines: Vec<&str> = src.lines().collect();
        assert_eq!(estimate_end_line(&lines, 1), 3);
    }

    #[test]
    fn test_estimate_end_line_dedent() {
        let src = "def foo():\n    a = 1\n    return a\n\nx = 2\n";
        let lines: Vec<&str> = src.lines().collect();
        assert_eq!(estimate_end_line(&lines, 1), 4);
    }
}
