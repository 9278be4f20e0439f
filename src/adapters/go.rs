//! Go adapter
//!
//! Structural extraction for `.go` sources: func and receiver-method
//! declarations, struct/interface types with field and method-set scans,
//! single and block imports, capitalization-based exports.
//!
//! @module adapters/go

use super::{
    count_matches, estimate_end_line, function_spans, line_doc_above, line_of, read_balanced,
    scan_callback_usages, scan_calls, scan_usages, split_top_level, CallRecord, CallScan,
    ClassDef, ExportRecord, FunctionDef, ImportKind, ImportRecord, LanguageAdapter, ParamInfo,
    ParsedModule, StateDef, SymbolKind, UsageRecord,
};
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// COMPILED REGEX PATTERNS
// =============================================================================

static FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^func\s+(?:\(\s*([A-Za-z_][A-Za-z0-9_]*)\s+\*?([A-Za-z_][A-Za-z0-9_]*)\s*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

static TYPE_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^type\s+([A-Za-z_][A-Za-z0-9_]*)\s+(\S+)").unwrap());

static IMPORT_SINGLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^import\s+(?:([A-Za-z_][A-Za-z0-9_]*|[._])\s+)?"([^"]+)""#).unwrap()
});

static IMPORT_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^import\s*\(").unwrap());

static IMPORT_SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:([A-Za-z_][A-Za-z0-9_]*|[._])\s+)?"([^"]+)"\s*$"#).unwrap()
});

static STATE_SINGLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:var|const)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

static STATE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(?:var|const)\s*\(").unwrap());

static FIELD_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s+(\*?\[\]?[A-Za-z_][A-Za-z0-9_.\[\]*]*|\*?[A-Za-z_][A-Za-z0-9_.\[\]*]*)")
        .unwrap()
});

static IFACE_METHOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

static REFLECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\breflect\.[A-Za-z]+\s*\(").unwrap());

// =============================================================================
// ADAPTER
// =============================================================================

pub struct GoAdapter;

impl LanguageAdapter for GoAdapter {
    fn language(&self) -> &'static str {
        "go"
    }

    fn parse(&self, text: &str) -> ParsedModule {
        let lines: Vec<&str> = text.lines().collect();
        let mut module = ParsedModule::default();

        for caps in TYPE_DECL_RE.captures_iter(text) {
            let (name_match, rest) = match (caps.get(1), caps.get(2)) {
                (Some(n), Some(r)) => (n, r.as_str()),
                _ => continue,
            };
            let start_line = line_of(text, name_match.start());
            let docstring = line_doc_above(&lines, start_line as usize - 1, "//");

            if rest.starts_with("struct") {
                let end_line = estimate_end_line(&lines, start_line as usize) as u32;
                module.classes.push(ClassDef {
                    name: name_match.as_str().to_string(),
                    kind: SymbolKind::Struct,
                    start_line,
                    end_line,
                    extends: None,
                    implements: Vec::new(),
                    methods: Vec::new(),
                    attribute_types: struct_fields(text, name_match.end()),
                    docstring,
                });
            } else if rest.starts_with("interface") {
                let end_line = estimate_end_line(&lines, start_line as usize) as u32;
                module.classes.push(ClassDef {
                    name: name_match.as_str().to_string(),
                    kind: SymbolKind::Interface,
                    start_line,
                    end_line,
                    extends: None,
                    implements: Vec::new(),
                    methods: interface_methods(text, name_match.end(), start_line),
                    attribute_types: Vec::new(),
                    docstring,
                });
            } else {
                module.classes.push(ClassDef {
                    name: name_match.as_str().to_string(),
                    kind: SymbolKind::TypeAlias,
                    start_line,
                    end_line: start_line,
                    extends: None,
                    implements: Vec::new(),
                    methods: Vec::new(),
                    attribute_types: Vec::new(),
                    docstring,
                });
            }
        }

        for caps in FUNC_RE.captures_iter(text) {
            let name_match = match caps.get(3) {
                Some(m) => m,
                None => continue,
            };
            let receiver_type = caps.get(2).map(|m| m.as_str().to_string());
            let (raw_params, after_idx) = match params_after(text, name_match.end()) {
                Some(v) => v,
                None => continue,
            };
            let start_line = line_of(text, name_match.start());

            let func = FunctionDef {
                name: name_match.as_str().to_string(),
                start_line,
                end_line: estimate_end_line(&lines, start_line as usize) as u32,
                raw_params: raw_params.trim().to_string(),
                params: parse_params(&raw_params),
                return_type: return_type_after(text, after_idx),
                modifiers: Vec::new(),
                docstring: line_doc_above(&lines, start_line as usize - 1, "//"),
                is_async: false,
                receiver: receiver_type.clone(),
            };

            // A receiver method belongs to its receiver type's definition
            // when that type is declared in the same file.
            match receiver_type
                .and_then(|ty| module.classes.iter_mut().find(|c| c.name == ty))
            {
                Some(class) => class.methods.push(func),
                None => module.functions.push(func),
            }
        }

        for caps in STATE_SINGLE_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let line = line_of(text, m.start());
                module.state_objects.push(StateDef {
                    name: m.as_str().to_string(),
                    start_line: line,
                    end_line: line,
                    is_exported: is_exported_name(m.as_str()),
                });
            }
        }

        for mat in STATE_BLOCK_RE.find_iter(text) {
            let open_idx = mat.end() - 1;
            if let Some((inner, _)) = read_balanced(text, open_idx, '(', ')') {
                let block_line = line_of(text, open_idx);
                for (i, entry) in inner.lines().enumerate() {
                    let line = block_line + i as u32;
                    let trimmed = entry.trim();
                    if trimmed.is_empty() || trimmed.starts_with("//") {
                        continue;
                    }
                    if let Some(name) = trimmed
                        .split(|c: char| !c.is_alphanumeric() && c != '_')
                        .next()
                        .filter(|n| !n.is_empty())
                    {
                        module.state_objects.push(StateDef {
                            name: name.to_string(),
                            start_line: line,
                            end_line: line,
                            is_exported: is_exported_name(name),
                        });
                    }
                }
            }
        }

        module
    }

    fn find_calls(&self, text: &str) -> Vec<CallRecord> {
        let spans = function_spans(&self.parse(text));
        scan_calls(
            text,
            &CallScan {
                skip: &|name| is_keyword(name) || is_builtin(name),
                implicit_receivers: &[],
            },
            &spans,
        )
    }

    fn find_imports(&self, text: &str) -> Vec<ImportRecord> {
        let mut imports = Vec::new();

        for caps in IMPORT_SINGLE_RE.captures_iter(text) {
            if let Some(path) = caps.get(2) {
                imports.push(import_record(
                    caps.get(1).map(|m| m.as_str()),
                    path.as_str(),
                    line_of(text, path.start()),
                ));
            }
        }

        for mat in IMPORT_BLOCK_RE.find_iter(text) {
            let open_idx = mat.end() - 1;
            if let Some((inner, _)) = read_balanced(text, open_idx, '(', ')') {
                let block_line = line_of(text, open_idx);
                for (i, entry) in inner.lines().enumerate() {
                    let line = block_line + i as u32;
                    if let Some(caps) = IMPORT_SPEC_RE.captures(entry) {
                        if let Some(path) = caps.get(2) {
                            imports.push(import_record(
                                caps.get(1).map(|m| m.as_str()),
                                path.as_str(),
                                line,
                            ));
                        }
                    }
                }
            }
        }

        imports
    }

    fn find_exports(&self, text: &str) -> Vec<ExportRecord> {
        let module = self.parse(text);
        let mut exports = Vec::new();

        for func in &module.functions {
            if func.receiver.is_none() && is_exported_name(&func.name) {
                exports.push(ExportRecord {
                    name: func.name.clone(),
                    kind: SymbolKind::Function,
                    line: func.start_line,
                    is_variable: false,
                    decl_kind: Some("func".to_string()),
                    type_annotation: None,
                });
            }
        }
        for class in &module.classes {
            if is_exported_name(&class.name) {
                exports.push(ExportRecord {
                    name: class.name.clone(),
                    kind: class.kind,
                    line: class.start_line,
                    is_variable: false,
                    decl_kind: Some("type".to_string()),
                    type_annotation: None,
                });
            }
        }
        for state in &module.state_objects {
            if state.is_exported {
                exports.push(ExportRecord {
                    name: state.name.clone(),
                    kind: SymbolKind::State,
                    line: state.start_line,
                    is_variable: true,
                    decl_kind: None,
                    type_annotation: None,
                });
            }
        }

        exports
    }

    fn find_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        let def_re = match Regex::new(&format!(
            r"\bfunc\s+(?:\([^)]*\)\s*)?{}\b|\btype\s+{}\b",
            regex::escape(name),
            regex::escape(name)
        )) {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };

        scan_usages(
            text,
            name,
            &|line| {
                line.trim_start().starts_with("import ") || IMPORT_SPEC_RE.is_match(line)
            },
            &|line| def_re.is_match(line),
        )
    }

    fn find_callback_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        scan_callback_usages(text, name)
    }

    fn count_dynamic(&self, text: &str) -> usize {
        count_matches(text, &[&REFLECT_RE])
    }
}

// =============================================================================
// EXTRACTION HELPERS
// =============================================================================

/// Exported Go identifiers start with an uppercase letter
fn is_exported_name(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

/// Parameter list after a func name, skipping a type-parameter list
fn params_after(text: &str, name_end: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut idx = name_end;
    if idx < bytes.len() && bytes[idx] == b'[' {
        let (_, past) = read_balanced(text, idx, '[', ']')?;
        idx = past;
    }
    if idx >= bytes.len() || bytes[idx] != b'(' {
        return None;
    }
    read_balanced(text, idx, '(', ')')
}

/// `name Type` parameters; grouped names (`a, b int`) leave the untyped
/// members without an annotation.
fn parse_params(raw: &str) -> Vec<ParamInfo> {
    let mut params = Vec::new();
    for part in split_top_level(raw) {
        let part = part.trim();
        let (name, ty) = match part.split_once(char::is_whitespace) {
            Some((head, tail)) => (head.trim(), Some(tail.trim().to_string())),
            None => (part, None),
        };
        if name.is_empty() || !name.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false) {
            continue;
        }
        let rest = ty.as_deref().map(|t| t.starts_with("...")).unwrap_or(false);
        params.push(ParamInfo {
            name: name.to_string(),
            type_annotation: ty,
            optional: rest,
            default: None,
            rest,
        });
    }
    params
}

/// Result type between the parameter list and the body brace
fn return_type_after(text: &str, after_idx: usize) -> Option<String> {
    let tail = &text[after_idx..];
    let end = tail.find('{').unwrap_or(tail.len());
    let ty = tail[..end].trim();
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}

/// Field name -> base type for a struct body starting after `name_end`
fn struct_fields(text: &str, name_end: usize) -> Vec<(String, String)> {
    let open_idx = match text[name_end..].find('{') {
        Some(i) => name_end + i,
        None => return Vec::new(),
    };
    let inner = match read_balanced(text, open_idx, '{', '}') {
        Some((inner, _)) => inner,
        None => return Vec::new(),
    };

    let mut fields = Vec::new();
    for line in inner.lines() {
        if let Some(caps) = FIELD_LINE_RE.captures(line) {
            if let (Some(name), Some(ty)) = (caps.get(1), caps.get(2)) {
                let base = ty
                    .as_str()
                    .trim_start_matches(['*', '[', ']'])
                    .rsplit('.')
                    .next()
                    .unwrap_or("")
                    .to_string();
                if !base.is_empty() {
                    fields.push((name.as_str().to_string(), base));
                }
            }
        }
    }
    fields
}

/// Method-set signatures of an interface body, for dispatch accounting
fn interface_methods(text: &str, name_end: usize, start_line: u32) -> Vec<FunctionDef> {
    let open_idx = match text[name_end..].find('{') {
        Some(i) => name_end + i,
        None => return Vec::new(),
    };
    let inner = match read_balanced(text, open_idx, '{', '}') {
        Some((inner, _)) => inner,
        None => return Vec::new(),
    };

    let mut methods = Vec::new();
    for (i, entry) in inner.lines().enumerate() {
        let line = start_line + i as u32;
        if let Some(caps) = IFACE_METHOD_RE.captures(entry) {
            if let Some(name) = caps.get(1) {
                methods.push(FunctionDef {
                    name: name.as_str().to_string(),
                    start_line: line,
                    end_line: line,
                    ..FunctionDef::default()
                });
            }
        }
    }
    methods
}

fn import_record(alias: Option<&str>, path: &str, line: u32) -> ImportRecord {
    let (kind, names) = match alias {
        Some("_") => (ImportKind::SideEffect, Vec::new()),
        Some(".") => (ImportKind::Namespace, Vec::new()),
        Some(alias) => (ImportKind::Module, vec![alias.to_string()]),
        None => (ImportKind::Module, Vec::new()),
    };
    ImportRecord {
        module: path.to_string(),
        names,
        kind,
        dynamic: false,
        line,
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "if" | "else"
            | "for"
            | "range"
            | "switch"
            | "case"
            | "default"
            | "break"
            | "continue"
            | "return"
            | "func"
            | "type"
            | "struct"
            | "interface"
            | "map"
            | "chan"
            | "go"
            | "defer"
            | "select"
            | "var"
            | "const"
            | "package"
            | "import"
            | "fallthrough"
            | "goto"
            | "nil"
            | "true"
            | "false"
            | "iota"
    )
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "make" | "len"
            | "cap"
            | "new"
            | "append"
            | "copy"
            | "delete"
            | "panic"
            | "recover"
            | "close"
            | "print"
            | "println"
            | "string"
            | "int"
            | "int32"
            | "int64"
            | "uint"
            | "uint32"
            | "uint64"
            | "float32"
            | "float64"
            | "byte"
            | "rune"
            | "bool"
            | "error"
            | "any"
            | "complex"
            | "real"
            | "imag"
            | "min"
            | "max"
            | "clear"
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::UsageType;

    const SAMPLE: &str = r#"package service

import (
	"context"
	"fmt"
	_ "net/http/pprof"

	pkgerrors "github.com/pkg/errors"
)

const MaxRetries = 3

var defaultTimeout = 30

// Storage is the persistence contract.
type Storage interface {
	Save(ctx context.Context, key string) error
	Load(key string) (string, error)
}

// Service coordinates storage access.
type Service struct {
	store   Storage
	limiter *rate.Limiter
	name    string
}

// NewService builds a Service.
func NewService(store Storage) *Service {
	return &Service{store: store}
}

// Save persists one entry.
func (s *Service) Save(ctx context.Context, key string, tags ...string) error {
	if err := validate(key); err != nil {
		return pkgerrors.Wrap(err, "validate")
	}
	return s.store.Save(ctx, key)
}

func validate(key string) error {
	if len(key) == 0 {
		return fmt.Errorf("empty key")
	}
	return nil
}
"#;

    #[test]
    fn test_parse_types_and_methods() {
        let module = GoAdapter.parse(SAMPLE);

        let storage = module
            .classes
            .iter()
            .find(|c| c.name == "Storage")
            .expect("Storage");
        assert_eq!(storage.kind, SymbolKind::Interface);
        let sig_names: Vec<_> = storage.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(sig_names, vec!["Save", "Load"]);

        let service = module
            .classes
            .iter()
            .find(|c| c.name == "Service")
            .expect("Service");
        assert_eq!(service.kind, SymbolKind::Struct);
        assert_eq!(
            service.docstring.as_deref(),
            Some("Service coordinates storage access.")
        );
        assert!(service
            .attribute_types
            .iter()
            .any(|(f, t)| f == "store" && t == "Storage"));
        assert!(service
            .attribute_types
            .iter()
            .any(|(f, t)| f == "limiter" && t == "Limiter"));

        let save = service.methods.iter().find(|m| m.name == "Save").expect("Save");
        assert_eq!(save.receiver.as_deref(), Some("Service"));
        assert!(save.params.iter().any(|p| p.name == "tags" && p.rest));
        assert_eq!(save.return_type.as_deref(), Some("error"));

        assert!(module
            .functions
            .iter()
            .any(|f| f.name == "NewService" && f.receiver.is_none()));
        assert!(module.functions.iter().any(|f| f.name == "validate"));
    }

    #[test]
    fn test_find_imports_block() {
        let imports = GoAdapter.find_imports(SAMPLE);

        assert!(imports
            .iter()
            .any(|i| i.module == "context" && i.kind == ImportKind::Module));
        assert!(imports
            .iter()
            .any(|i| i.module == "net/http/pprof" && i.kind == ImportKind::SideEffect));

        let aliased = imports
            .iter()
            .find(|i| i.module == "github.com/pkg/errors")
            .expect("aliased import");
        assert_eq!(aliased.names, vec!["pkgerrors"]);
    }

    #[test]
    fn test_find_exports_capitalization() {
        let exports = GoAdapter.find_exports(SAMPLE);
        let names: Vec<_> = exports.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Storage"));
        assert!(names.contains(&"Service"));
        assert!(names.contains(&"NewService"));
        assert!(names.contains(&"MaxRetries"));
        assert!(!names.contains(&"validate"));
        assert!(!names.contains(&"defaultTimeout"));
    }

    #[test]
    fn test_find_calls() {
        let calls = GoAdapter.find_calls(SAMPLE);

        let validate = calls
            .iter()
            .find(|c| c.name == "validate")
            .expect("validate call");
        assert!(!validate.is_method);
        assert_eq!(validate.enclosing.as_ref().unwrap().name, "Save");

        let store_save = calls
            .iter()
            .find(|c| c.name == "Save" && c.is_method)
            .expect("s.store.Save");
        assert_eq!(store_save.receiver.as_deref(), Some("s.store"));

        assert!(calls
            .iter()
            .any(|c| c.name == "Wrap" && c.receiver.as_deref() == Some("pkgerrors")));
    }

    #[test]
    fn test_find_usages() {
        let usages = GoAdapter.find_usages(SAMPLE, "validate");
        assert!(usages.iter().any(|u| u.usage_type == UsageType::Definition));
        assert!(usages.iter().any(|u| u.usage_type == UsageType::Call));

        let imported = GoAdapter.find_usages(SAMPLE, "fmt");
        assert!(imported.iter().any(|u| u.usage_type == UsageType::Import));
    }

    #[test]
    fn test_count_dynamic_reflect() {
        let src = "v := reflect.ValueOf(x)\nt := reflect.TypeOf(x)\n";
        assert_eq!(GoAdapter.count_dynamic(src), 2);
    }
}
