//! Core index data structures
//!
//! `FileEntry` is the per-file record; `Symbol` is one definition site. A
//! Symbol is owned by exactly one FileEntry; the symbol table holds appended
//! copies keyed by name.
//!
//! @module index/types

use crate::adapters::{CallRecord, ExportRecord, ImportRecord, ParamInfo, SymbolKind};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// SYMBOL
// =============================================================================

/// A code symbol definition (function, class, method, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: CompactString,
    pub kind: SymbolKind,
    /// Absolute path of the owning file
    pub file: PathBuf,
    /// 1-indexed, inclusive
    pub start_line: u32,
    pub end_line: u32,
    /// Stable definition-site identity: `relative_path:kind:start_line`
    pub binding_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_params: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    /// Explicit or implicit receiver for methods (`self`, `this`, a Go
    /// receiver type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Owning class for flattened members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Declared type for state/variable symbols
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,
    /// Instance-attribute name -> type name, on class symbols only.
    /// Feeds receiver-typed call resolution without a re-parse.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_types: Vec<(String, String)>,
}

impl Symbol {
    /// Minimum argument count a call site must supply
    pub fn required_param_count(&self) -> usize {
        self.params.iter().filter(|p| !p.optional && !p.rest).count()
    }

    /// Maximum argument count, `None` when a rest parameter is present
    pub fn max_param_count(&self) -> Option<usize> {
        if self.params.iter().any(|p| p.rest) {
            None
        } else {
            Some(self.params.len())
        }
    }
}

/// Compose a binding id from its parts
pub fn binding_id(relative_path: &str, kind: SymbolKind, start_line: u32) -> String {
    format!("{}:{}:{}", relative_path, kind.as_str(), start_line)
}

// =============================================================================
// BINDING
// =============================================================================

/// One name binding local to a file, the unit of call-site resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub id: String,
    pub name: CompactString,
    pub kind: SymbolKind,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

// =============================================================================
// FILE ENTRY
// =============================================================================

/// Per-file index record, refreshed when hash or mtime differs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub relative_path: String,
    pub language: String,
    pub line_count: u32,
    pub content_hash: u64,
    /// Filesystem mtime in epoch milliseconds
    pub mtime: i64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_modules: Vec<ImportRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exported_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_details: Vec<ExportRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<Symbol>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

// =============================================================================
// CALLS CACHE
// =============================================================================

/// Cached call-site extraction for one file.
///
/// Validity is checked against the live file: mtime match trusts the entry
/// outright; on mtime mismatch the content is rehashed, and a hash match
/// refreshes the stored mtime while keeping the calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCalls {
    pub mtime: i64,
    pub hash: u64,
    pub calls: Vec<CallRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_id_format() {
        assert_eq!(
            binding_id("src/app.ts", SymbolKind::Function, 12),
            "src/app.ts:function:12"
        );
        assert_eq!(
            binding_id("pkg/svc.go", SymbolKind::Method, 3),
            "pkg/svc.go:method:3"
        );
    }

    #[test]
    fn test_param_count_bounds() {
        let sym = Symbol {
            name: "f".into(),
            kind: SymbolKind::Function,
            file: PathBuf::from("/p/a.py"),
            start_line: 1,
            end_line: 2,
            binding_id: "a.py:function:1".to_string(),
            raw_params: String::new(),
            params: vec![
                ParamInfo {
                    name: "a".to_string(),
                    ..ParamInfo::default()
                },
                ParamInfo {
                    name: "b".to_string(),
                    optional: true,
                    ..ParamInfo::default()
                },
                ParamInfo {
                    name: "rest".to_string(),
                    optional: true,
                    rest: true,
                    ..ParamInfo::default()
                },
            ],
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
        };
        assert_eq!(sym.required_param_count(), 1);
        assert_eq!(sym.max_param_count(), None);
    }
}
