//! Python adapter
//!
//! Structural extraction for `.py` sources: def/class definitions with
//! docstrings and decorators, dotted and relative imports, `__all__` or
//! convention-based exports, `self`/`cls` receiver handling.
//!
//! @module adapters/python

use super::{
    count_matches, estimate_end_line, function_spans, line_of, read_balanced,
    scan_callback_usages, scan_calls, scan_usages, split_top_level, CallRecord, CallScan,
    ClassDef, ExportRecord, FunctionDef, ImportKind, ImportRecord, LanguageAdapter, ParamInfo,
    ParsedModule, StateDef, SymbolKind, UsageRecord,
};
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// COMPILED REGEX PATTERNS
// =============================================================================

static DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^([\t ]*)(async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap()
});

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[\t ]*class\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(([^)]*)\))?\s*:").unwrap()
});

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[\t ]*import\s+([A-Za-z_][A-Za-z0-9_.]*)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?")
        .unwrap()
});

static FROM_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[\t ]*from\s+(\.*[A-Za-z_][A-Za-z0-9_.]*|\.+)\s+import\s+(\*|[^\n#]+)")
        .unwrap()
});

static STATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Z][A-Z0-9_]*)\s*(?::[^=\n]+)?=").unwrap());

static ALL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^__all__\s*(?::[^=\n]+)?=\s*\[([^\]]*)\]").unwrap());

static ATTR_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"self\.([A-Za-z_][A-Za-z0-9_]*)\s*(?::\s*([A-Za-z_][A-Za-z0-9_.\[\], ]*?)\s*)?=\s*(?:([A-Za-z_][A-Za-z0-9_.]*)\s*\()?",
    )
    .unwrap()
});

static EVAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:eval|exec)\s*\(").unwrap());
static REFLECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:getattr|setattr|delattr)\s*\(").unwrap());
static DYN_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__import__\s*\(|importlib\.import_module\s*\(").unwrap());

// =============================================================================
// ADAPTER
// =============================================================================

pub struct PythonAdapter;

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> &'static str {
        "python"
    }

    fn parse(&self, text: &str) -> ParsedModule {
        let lines: Vec<&str> = text.lines().collect();
        let mut module = ParsedModule::default();

        // Classes first so defs can be assigned to the enclosing class
        for caps in CLASS_RE.captures_iter(text) {
            let name_match = match caps.get(1) {
                Some(m) => m,
                None => continue,
            };
            let start_line = line_of(text, name_match.start());
            let end_line = estimate_end_line(&lines, start_line as usize) as u32;

            let bases: Vec<String> = caps
                .get(2)
                .map(|m| {
                    split_top_level(m.as_str())
                        .into_iter()
                        .map(|b| b.trim().to_string())
                        .filter(|b| !b.is_empty() && b != "object" && !b.contains('='))
                        .collect()
                })
                .unwrap_or_default();
            let mut bases = bases;
            let extends = if bases.is_empty() {
                None
            } else {
                Some(bases.remove(0))
            };

            module.classes.push(ClassDef {
                name: name_match.as_str().to_string(),
                kind: SymbolKind::Class,
                start_line,
                end_line,
                extends,
                implements: bases,
                methods: Vec::new(),
                attribute_types: attribute_types_in_range(text, start_line, end_line),
                docstring: docstring_after(&lines, start_line as usize),
            });
        }

        for caps in DEF_RE.captures_iter(text) {
            let name_match = match caps.get(3) {
                Some(m) => m,
                None => continue,
            };
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let open_idx = whole.end() - 1;
            let (raw_params, after_idx) = match read_balanced(text, open_idx, '(', ')') {
                Some(v) => v,
                None => continue,
            };

            let start_line = line_of(text, whole.start());
            let sig_end_line = line_of(text, after_idx.min(text.len().saturating_sub(1)));
            let is_method_candidate = !caps
                .get(1)
                .map(|m| m.as_str().is_empty())
                .unwrap_or(true);

            let (params, receiver) = parse_params(&raw_params, is_method_candidate);
            let func = FunctionDef {
                name: name_match.as_str().to_string(),
                start_line,
                end_line: estimate_end_line(&lines, start_line as usize) as u32,
                raw_params: raw_params.trim().to_string(),
                params,
                return_type: return_type_after(text, after_idx),
                is_async: caps.get(2).is_some(),
                docstring: docstring_after(&lines, sig_end_line as usize),
                modifiers: decorators_above(&lines, start_line as usize),
                receiver,
            };

            // Innermost class whose range contains this def owns it as a method
            let owner = module
                .classes
                .iter_mut()
                .filter(|c| c.start_line < start_line && start_line <= c.end_line)
                .min_by_key(|c| c.end_line - c.start_line);
            match owner {
                Some(class) => class.methods.push(func),
                None => module.functions.push(func),
            }
        }

        for caps in STATE_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let line = line_of(text, m.start());
                module.state_objects.push(StateDef {
                    name: m.as_str().to_string(),
                    start_line: line,
                    end_line: line,
                    is_exported: !m.as_str().starts_with('_'),
                });
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
                implicit_receivers: &["self", "cls"],
            },
            &spans,
        )
    }

    fn find_imports(&self, text: &str) -> Vec<ImportRecord> {
        let mut imports = Vec::new();

        for caps in IMPORT_RE.captures_iter(text) {
            let module = match caps.get(1) {
                Some(m) => m,
                None => continue,
            };
            let names = caps
                .get(2)
                .map(|alias| vec![alias.as_str().to_string()])
                .unwrap_or_default();
            imports.push(ImportRecord {
                module: module.as_str().to_string(),
                names,
                kind: ImportKind::Module,
                dynamic: false,
                line: line_of(text, module.start()),
            });
        }

        for caps in FROM_IMPORT_RE.captures_iter(text) {
            let (module, clause) = match (caps.get(1), caps.get(2)) {
                (Some(m), Some(c)) => (m, c.as_str().trim()),
                _ => continue,
            };
            let (kind, names) = if clause == "*" {
                (ImportKind::Namespace, Vec::new())
            } else {
                let names = clause
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .split(',')
                    .filter_map(|part| {
                        let part = part.trim();
                        if part.is_empty() {
                            return None;
                        }
                        let name = match part.split_once(" as ") {
                            Some((_, alias)) => alias.trim(),
                            None => part,
                        };
                        Some(name.to_string())
                    })
                    .collect();
                (ImportKind::Named, names)
            };
            imports.push(ImportRecord {
                module: module.as_str().to_string(),
                names,
                kind,
                dynamic: false,
                line: line_of(text, module.start()),
            });
        }

        for caps in DYN_IMPORT_RE.captures_iter(text) {
            if let Some(m) = caps.get(0) {
                imports.push(ImportRecord {
                    module: String::new(),
                    names: Vec::new(),
                    kind: ImportKind::Module,
                    dynamic: true,
                    line: line_of(text, m.start()),
                });
            }
        }

        imports
    }

    fn find_exports(&self, text: &str) -> Vec<ExportRecord> {
        // An explicit __all__ is authoritative
        if let Some(caps) = ALL_RE.captures(text) {
            let line = line_of(text, caps.get(0).map(|m| m.start()).unwrap_or(0));
            if let Some(inner) = caps.get(1) {
                return inner
                    .as_str()
                    .split(',')
                    .filter_map(|part| {
                        let name = part.trim().trim_matches(|c| c == '"' || c == '\'');
                        if name.is_empty() {
                            return None;
                        }
                        Some(ExportRecord {
                            name: name.to_string(),
                            kind: SymbolKind::Variable,
                            line,
                            is_variable: false,
                            decl_kind: Some("__all__".to_string()),
                            type_annotation: None,
                        })
                    })
                    .collect();
            }
        }

        // Convention: public top-level defs, classes, and module constants
        let module = self.parse(text);
        let mut exports = Vec::new();
        for func in &module.functions {
            if !func.name.starts_with('_') {
                exports.push(ExportRecord {
                    name: func.name.clone(),
                    kind: SymbolKind::Function,
                    line: func.start_line,
                    is_variable: false,
                    decl_kind: None,
                    type_annotation: None,
                });
            }
        }
        for class in &module.classes {
            if !class.name.starts_with('_') {
                exports.push(ExportRecord {
                    name: class.name.clone(),
                    kind: class.kind,
                    line: class.start_line,
                    is_variable: false,
                    decl_kind: None,
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
            r"\b(?:def|class)\s+{}\b",
            regex::escape(name)
        )) {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };

        scan_usages(
            text,
            name,
            &|line| {
                let t = line.trim_start();
                t.starts_with("import ") || t.starts_with("from ")
            },
            &|line| def_re.is_match(line),
        )
    }

    fn find_callback_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        scan_callback_usages(text, name)
    }

    fn count_dynamic(&self, text: &str) -> usize {
        count_matches(text, &[&EVAL_RE, &REFLECT_RE, &DYN_IMPORT_RE])
    }
}

// =============================================================================
// EXTRACTION HELPERS
// =============================================================================

/// Parse a def's parameter list. The leading `self`/`cls` of a method is
/// recorded as the receiver, not a parameter.
fn parse_params(raw: &str, is_method: bool) -> (Vec<ParamInfo>, Option<String>) {
    let mut receiver = None;
    let mut params = Vec::new();

    for (i, part) in split_top_level(raw).into_iter().enumerate() {
        let part = part.trim();
        // Bare positional/keyword markers carry no binding
        if part == "*" || part == "/" {
            continue;
        }
        if i == 0 && is_method && (part == "self" || part == "cls") {
            receiver = Some(part.to_string());
            continue;
        }

        let rest = part.starts_with('*');
        let part = part.trim_start_matches('*');

        let (before_default, default) = match part.split_once('=') {
            Some((head, tail)) => (head.trim(), Some(tail.trim().to_string())),
            None => (part, None),
        };
        let (name, type_annotation) = match before_default.split_once(':') {
            Some((head, tail)) => (head.trim(), Some(tail.trim().to_string())),
            None => (before_default, None),
        };
        if name.is_empty() {
            continue;
        }

        params.push(ParamInfo {
            name: name.to_string(),
            type_annotation,
            optional: default.is_some() || rest,
            default,
            rest,
        });
    }

    (params, receiver)
}

/// `-> T:` annotation after the closing paren of a signature
fn return_type_after(text: &str, after_idx: usize) -> Option<String> {
    let tail = text[after_idx..].trim_start();
    let tail = tail.strip_prefix("->")?;
    let end = tail.find(':').unwrap_or(tail.len());
    let ty = tail[..end].trim();
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}

/// Triple-quoted docstring on the lines following a signature
fn docstring_after(lines: &[&str], sig_end_line: usize) -> Option<String> {
    let mut i = sig_end_line; // 0-indexed line after the signature
    while i < lines.len() && lines[i].trim().is_empty() {
        i += 1;
    }
    let first = lines.get(i)?.trim();
    let quote = if first.starts_with("\"\"\"") {
        "\"\"\""
    } else if first.starts_with("'''") {
        "'''"
    } else {
        return None;
    };

    let inner = &first[quote.len()..];
    if let Some(end) = inner.find(quote) {
        let text = inner[..end].trim();
        return if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        };
    }

    let mut collected = vec![inner.trim()];
    for line in lines.iter().skip(i + 1) {
        let trimmed = line.trim();
        if let Some(end) = trimmed.find(quote) {
            collected.push(trimmed[..end].trim());
            break;
        }
        collected.push(trimmed);
    }
    let text = collected
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decorator names on the lines directly above a def
fn decorators_above(lines: &[&str], def_line: usize) -> Vec<String> {
    let mut decorators = Vec::new();
    let mut i = def_line - 1; // 0-indexed line above the def
    while i > 0 {
        i -= 1;
        let trimmed = lines[i].trim();
        if let Some(rest) = trimmed.strip_prefix('@') {
            let name = rest
                .split(|c: char| c == '(' || c == ' ')
                .next()
                .unwrap_or("");
            if !name.is_empty() {
                decorators.push(name.to_string());
            }
        } else if trimmed.is_empty() {
            continue;
        } else {
            break;
        }
    }
    decorators.reverse();
    decorators
}

/// `self.attr = Type(...)` and annotated assignments within a class body
fn attribute_types_in_range(text: &str, start_line: u32, end_line: u32) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for caps in ATTR_ASSIGN_RE.captures_iter(text) {
        let attr = match caps.get(1) {
            Some(m) => m,
            None => continue,
        };
        let line = line_of(text, attr.start());
        if line <= start_line || line > end_line {
            continue;
        }
        let ty = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .or_else(|| {
                caps.get(3).and_then(|m| {
                    let ctor = m.as_str().rsplit('.').next().unwrap_or("");
                    ctor.chars()
                        .next()
                        .filter(|c| c.is_uppercase())
                        .map(|_| ctor.to_string())
                })
            });
        if let Some(ty) = ty {
            attrs.push((attr.as_str().to_string(), ty));
        }
    }
    attrs
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "if" | "elif"
            | "else"
            | "for"
            | "while"
            | "break"
            | "continue"
            | "return"
            | "def"
            | "class"
            | "import"
            | "from"
            | "as"
            | "with"
            | "lambda"
            | "assert"
            | "pass"
            | "raise"
            | "try"
            | "except"
            | "finally"
            | "yield"
            | "global"
            | "nonlocal"
            | "and"
            | "or"
            | "not"
            | "is"
            | "in"
            | "del"
            | "async"
            | "await"
            | "None"
            | "True"
            | "False"
            | "self"
            | "cls"
    )
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "print"
            | "len"
            | "range"
            | "str"
            | "int"
            | "float"
            | "bool"
            | "list"
            | "dict"
            | "set"
            | "tuple"
            | "type"
            | "object"
            | "isinstance"
            | "issubclass"
            | "hasattr"
            | "open"
            | "input"
            | "id"
            | "iter"
            | "next"
            | "zip"
            | "map"
            | "filter"
            | "sorted"
            | "reversed"
            | "enumerate"
            | "sum"
            | "min"
            | "max"
            | "abs"
            | "round"
            | "format"
            | "repr"
            | "hash"
            | "callable"
            | "super"
            | "staticmethod"
            | "classmethod"
            | "property"
            | "append"
            | "extend"
            | "get"
            | "items"
            | "keys"
            | "values"
            | "join"
            | "split"
            | "strip"
            | "startswith"
            | "endswith"
            | "ValueError"
            | "TypeError"
            | "KeyError"
            | "RuntimeError"
            | "Exception"
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::UsageType;

    const SAMPLE: &str = r#"
"""Service module."""

from typing import Optional
from .utils import format_data, validate_input
import asyncio

MAX_RETRIES = 3


class DataService(BaseService, Closeable):
    """Stores entities."""

    def __init__(self, config: Optional[dict] = None):
        self.config = config or {}
        self.validator = Validator()
        self._storage: dict = {}

    async def save(self, entity, *tags):
        """Save an entity."""
        validate_input(entity)
        self._storage[self._get_id(entity)] = entity

    def _get_id(self, entity) -> str:
        return str(entity.id)


def standalone(x, y=1) -> int:
    """Add things."""
    return x + y


def _private_helper():
    pass
"#;

    #[test]
    fn test_parse_class_and_methods() {
        let module = PythonAdapter.parse(SAMPLE);
        let service = module
            .classes
            .iter()
            .find(|c| c.name == "DataService")
            .expect("DataService");
        assert_eq!(service.extends.as_deref(), Some("BaseService"));
        assert_eq!(service.implements, vec!["Closeable"]);
        assert_eq!(service.docstring.as_deref(), Some("Stores entities."));

        let names: Vec<_> = service.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["__init__", "save", "_get_id"]);

        let init = &service.methods[0];
        assert_eq!(init.receiver.as_deref(), Some("self"));
        assert_eq!(init.params.len(), 1);
        assert_eq!(init.params[0].name, "config");
        assert!(init.params[0].optional);

        let save = &service.methods[1];
        assert!(save.is_async);
        assert_eq!(save.docstring.as_deref(), Some("Save an entity."));
        assert!(save.params.iter().any(|p| p.name == "tags" && p.rest));

        assert!(module.functions.iter().any(|f| f.name == "standalone"));
        assert!(module.functions.iter().any(|f| f.name == "_private_helper"));
    }

    #[test]
    fn test_attribute_types() {
        let module = PythonAdapter.parse(SAMPLE);
        let service = &module.classes[0];
        assert!(service
            .attribute_types
            .iter()
            .any(|(a, t)| a == "validator" && t == "Validator"));
        assert!(service
            .attribute_types
            .iter()
            .any(|(a, t)| a == "_storage" && t == "dict"));
    }

    #[test]
    fn test_find_imports() {
        let imports = PythonAdapter.find_imports(SAMPLE);

        let utils = imports.iter().find(|i| i.module == ".utils").expect(".utils");
        assert_eq!(utils.kind, ImportKind::Named);
        assert_eq!(utils.names, vec!["format_data", "validate_input"]);

        assert!(imports
            .iter()
            .any(|i| i.module == "asyncio" && i.kind == ImportKind::Module));
        assert!(imports.iter().any(|i| i.module == "typing"));
    }

    #[test]
    fn test_find_exports_convention() {
        let exports = PythonAdapter.find_exports(SAMPLE);
        let names: Vec<_> = exports.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"DataService"));
        assert!(names.contains(&"standalone"));
        assert!(names.contains(&"MAX_RETRIES"));
        assert!(!names.contains(&"_private_helper"));
    }

    #[test]
    fn test_find_exports_all_overrides() {
        let src = "__all__ = [\"alpha\", 'beta']\n\ndef alpha():\n    pass\n\ndef gamma():\n    pass\n";
        let exports = PythonAdapter.find_exports(src);
        let names: Vec<_> = exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_find_calls() {
        let calls = PythonAdapter.find_calls(SAMPLE);

        let validate = calls
            .iter()
            .find(|c| c.name == "validate_input")
            .expect("validate_input");
        assert!(!validate.is_method);
        assert_eq!(validate.enclosing.as_ref().unwrap().name, "save");

        let get_id = calls.iter().find(|c| c.name == "_get_id").expect("_get_id");
        assert!(get_id.is_method);
        assert_eq!(get_id.receiver.as_deref(), Some("self"));
    }

    #[test]
    fn test_find_usages() {
        let usages = PythonAdapter.find_usages(SAMPLE, "validate_input");
        assert!(usages.iter().any(|u| u.usage_type == UsageType::Import));
        assert!(usages.iter().any(|u| u.usage_type == UsageType::Call));

        let defs = PythonAdapter.find_usages(SAMPLE, "standalone");
        assert!(defs.iter().any(|u| u.usage_type == UsageType::Definition));
    }

    #[test]
    fn test_relative_import_modules() {
        let src = "from ..pkg.mod import thing\nfrom . import sibling\n";
        let imports = PythonAdapter.find_imports(src);
        assert!(imports.iter().any(|i| i.module == "..pkg.mod"));
        assert!(imports.iter().any(|i| i.module == "."));
    }

    #[test]
    fn test_count_dynamic() {
        let src = "eval(code)\ngetattr(obj, name)()\nimportlib.import_module(mod)\n";
        assert_eq!(PythonAdapter.count_dynamic(src), 3);
    }
}
