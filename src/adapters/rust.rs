//! Rust adapter
//!
//! Structural extraction for `.rs` sources: fn/struct/enum/trait definitions,
//! impl-block method attribution, `use` imports with brace groups, pub-based
//! exports, `&self` receiver handling.
//!
//! @module adapters/rust

use super::{
    estimate_end_line, function_spans, line_of, line_doc_above, read_balanced,
    scan_callback_usages, scan_calls, scan_usages, split_top_level, CallRecord, CallScan,
    ClassDef, ExportRecord, FunctionDef, ImportKind, ImportRecord, LanguageAdapter, ParamInfo,
    ParsedModule, StateDef, SymbolKind, UsageRecord,
};
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// COMPILED REGEX PATTERNS
// =============================================================================

static FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^([\t ]*)(pub(?:\([^)]*\))?\s+)?(?:const\s+)?(async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

static TYPE_DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[\t ]*(pub(?:\([^)]*\))?\s+)?(struct|enum|trait)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .unwrap()
});

static TYPE_ALIAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(pub(?:\([^)]*\))?\s+)?type\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});

static IMPL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*impl(?:<[^>]*>)?\s+(?:([A-Za-z_][A-Za-z0-9_:]*)(?:<[^>]*>)?\s+for\s+)?([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

static USE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[\t ]*(pub(?:\([^)]*\))?\s+)?use\s+([^;]+);").unwrap());

static STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*(pub(?:\([^)]*\))?\s+)?(?:static|const)\s+(?:mut\s+)?([A-Z_][A-Z0-9_]*)\s*:",
    )
    .unwrap()
});

// =============================================================================
// ADAPTER
// =============================================================================

pub struct RustAdapter;

impl LanguageAdapter for RustAdapter {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn parse(&self, text: &str) -> ParsedModule {
        let lines: Vec<&str> = text.lines().collect();
        let mut module = ParsedModule::default();

        for caps in TYPE_DEF_RE.captures_iter(text) {
            let (kw, name_match) = match (caps.get(2), caps.get(3)) {
                (Some(k), Some(n)) => (k.as_str(), n),
                _ => continue,
            };
            let kind = match kw {
                "struct" => SymbolKind::Struct,
                "enum" => SymbolKind::Enum,
                "trait" => SymbolKind::Trait,
                _ => continue,
            };
            let start_line = line_of(text, name_match.start());
            let extends = if kind == SymbolKind::Trait {
                supertrait_of(text, name_match.end())
            } else {
                None
            };

            module.classes.push(ClassDef {
                name: name_match.as_str().to_string(),
                kind,
                start_line,
                end_line: estimate_end_line(&lines, start_line as usize) as u32,
                extends,
                implements: Vec::new(),
                methods: Vec::new(),
                attribute_types: Vec::new(),
                docstring: line_doc_above(&lines, start_line as usize - 1, "///"),
            });
        }

        for caps in TYPE_ALIAS_RE.captures_iter(text) {
            if let Some(name_match) = caps.get(2) {
                let start_line = line_of(text, name_match.start());
                module.classes.push(ClassDef {
                    name: name_match.as_str().to_string(),
                    kind: SymbolKind::TypeAlias,
                    start_line,
                    end_line: start_line,
                    extends: None,
                    implements: Vec::new(),
                    methods: Vec::new(),
                    attribute_types: Vec::new(),
                    docstring: line_doc_above(&lines, start_line as usize - 1, "///"),
                });
            }
        }

        // Impl blocks: trait impls contribute `implements`, and both kinds own
        // the fns in their range as methods of the self type.
        let mut impls: Vec<(String, u32, u32)> = Vec::new();
        for caps in IMPL_RE.captures_iter(text) {
            let type_match = match caps.get(2) {
                Some(m) => m,
                None => continue,
            };
            let start_line = line_of(text, type_match.start());
            let end_line = estimate_end_line(&lines, start_line as usize) as u32;
            let type_name = type_match.as_str().to_string();

            if let Some(trait_path) = caps.get(1) {
                let trait_name = trait_path
                    .as_str()
                    .rsplit("::")
                    .next()
                    .unwrap_or("")
                    .to_string();
                if let Some(class) = module.classes.iter_mut().find(|c| c.name == type_name) {
                    if !trait_name.is_empty() && !class.implements.contains(&trait_name) {
                        class.implements.push(trait_name);
                    }
                }
            }
            impls.push((type_name, start_line, end_line));
        }

        for caps in FN_RE.captures_iter(text) {
            let name_match = match caps.get(4) {
                Some(m) => m,
                None => continue,
            };
            let (raw_params, after_idx) = match params_after(text, name_match.end()) {
                Some(v) => v,
                None => continue,
            };
            let start_line = line_of(text, name_match.start());
            let (params, receiver) = parse_params(&raw_params);

            let mut modifiers = Vec::new();
            if caps.get(2).is_some() {
                modifiers.push("pub".to_string());
            }

            let func = FunctionDef {
                name: name_match.as_str().to_string(),
                start_line,
                end_line: estimate_end_line(&lines, start_line as usize) as u32,
                raw_params: raw_params.trim().to_string(),
                params,
                return_type: return_type_after(text, after_idx),
                modifiers,
                docstring: line_doc_above(&lines, start_line as usize - 1, "///"),
                is_async: caps.get(3).is_some(),
                receiver,
            };

            // An fn inside an impl block is a method of the impl's self type;
            // inside a trait block it is a trait method signature.
            let owner_impl = impls
                .iter()
                .filter(|(_, start, end)| *start < start_line && start_line <= *end)
                .min_by_key(|(_, start, end)| end - start);
            if let Some((type_name, _, _)) = owner_impl {
                if let Some(class) = module.classes.iter_mut().find(|c| &c.name == type_name) {
                    class.methods.push(func);
                    continue;
                }
                module.functions.push(func);
                continue;
            }

            let owner_trait = module
                .classes
                .iter_mut()
                .filter(|c| {
                    c.kind == SymbolKind::Trait
                        && c.start_line < start_line
                        && start_line <= c.end_line
                })
                .min_by_key(|c| c.end_line - c.start_line);
            match owner_trait {
                Some(class) => class.methods.push(func),
                None => module.functions.push(func),
            }
        }

        for caps in STATE_RE.captures_iter(text) {
            if let Some(m) = caps.get(2) {
                let line = line_of(text, m.start());
                module.state_objects.push(StateDef {
                    name: m.as_str().to_string(),
                    start_line: line,
                    end_line: line,
                    is_exported: caps.get(1).is_some(),
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
                implicit_receivers: &["self"],
            },
            &spans,
        )
    }

    fn find_imports(&self, text: &str) -> Vec<ImportRecord> {
        let mut imports = Vec::new();
        for caps in USE_RE.captures_iter(text) {
            let path_match = match caps.get(2) {
                Some(m) => m,
                None => continue,
            };
            let line = line_of(text, path_match.start());
            let is_re_export = caps.get(1).is_some();
            if let Some(record) = parse_use_path(path_match.as_str(), line, is_re_export) {
                imports.push(record);
            }
        }
        imports
    }

    fn find_exports(&self, text: &str) -> Vec<ExportRecord> {
        let mut exports = Vec::new();

        for caps in FN_RE.captures_iter(text) {
            let indent_empty = caps.get(1).map(|m| m.as_str().is_empty()).unwrap_or(true);
            if caps.get(2).is_none() || !indent_empty {
                continue;
            }
            if let Some(m) = caps.get(4) {
                exports.push(ExportRecord {
                    name: m.as_str().to_string(),
                    kind: SymbolKind::Function,
                    line: line_of(text, m.start()),
                    is_variable: false,
                    decl_kind: Some("fn".to_string()),
                    type_annotation: None,
                });
            }
        }

        for caps in TYPE_DEF_RE.captures_iter(text) {
            if caps.get(1).is_none() {
                continue;
            }
            if let (Some(kw), Some(m)) = (caps.get(2), caps.get(3)) {
                let kind = match kw.as_str() {
                    "struct" => SymbolKind::Struct,
                    "enum" => SymbolKind::Enum,
                    "trait" => SymbolKind::Trait,
                    _ => continue,
                };
                exports.push(ExportRecord {
                    name: m.as_str().to_string(),
                    kind,
                    line: line_of(text, m.start()),
                    is_variable: false,
                    decl_kind: Some(kw.as_str().to_string()),
                    type_annotation: None,
                });
            }
        }

        for caps in TYPE_ALIAS_RE.captures_iter(text) {
            if caps.get(1).is_none() {
                continue;
            }
            if let Some(m) = caps.get(2) {
                exports.push(ExportRecord {
                    name: m.as_str().to_string(),
                    kind: SymbolKind::TypeAlias,
                    line: line_of(text, m.start()),
                    is_variable: false,
                    decl_kind: Some("type".to_string()),
                    type_annotation: None,
                });
            }
        }

        for caps in STATE_RE.captures_iter(text) {
            if caps.get(1).is_none() {
                continue;
            }
            if let Some(m) = caps.get(2) {
                exports.push(ExportRecord {
                    name: m.as_str().to_string(),
                    kind: SymbolKind::State,
                    line: line_of(text, m.start()),
                    is_variable: true,
                    decl_kind: Some("const".to_string()),
                    type_annotation: None,
                });
            }
        }

        exports
    }

    fn find_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        let def_re = match Regex::new(&format!(
            r"\b(?:fn|struct|enum|trait|type|const|static|mod)\s+{}\b",
            regex::escape(name)
        )) {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };

        scan_usages(
            text,
            name,
            &|line| line.trim_start().starts_with("use "),
            &|line| def_re.is_match(line),
        )
    }

    fn find_callback_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        scan_callback_usages(text, name)
    }

    fn find_re_exports(&self, text: &str) -> Vec<ImportRecord> {
        self.find_imports(text)
            .into_iter()
            .filter(|i| i.kind == ImportKind::ReExport)
            .collect()
    }
}

// =============================================================================
// EXTRACTION HELPERS
// =============================================================================

/// Parameter list after an fn name, skipping a generic parameter list
fn params_after(text: &str, name_end: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut idx = name_end;
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    if idx < bytes.len() && bytes[idx] == b'<' {
        let (_, past) = read_balanced(text, idx, '<', '>')?;
        idx = past;
        while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
            idx += 1;
        }
    }
    if idx >= bytes.len() || bytes[idx] != b'(' {
        return None;
    }
    read_balanced(text, idx, '(', ')')
}

/// Parse an fn's parameter list. A leading `self` form is recorded as the
/// receiver, not a parameter.
fn parse_params(raw: &str) -> (Vec<ParamInfo>, Option<String>) {
    let mut receiver = None;
    let mut params = Vec::new();

    for (i, part) in split_top_level(raw).into_iter().enumerate() {
        let part = part.trim();
        if i == 0 {
            let bare = part.trim_start_matches('&').trim_start();
            let bare = bare.strip_prefix("mut ").unwrap_or(bare).trim_start();
            // Covers `self`, `&self`, `&mut self`, `&'a mut self`, `self: Box<Self>`
            if bare == "self" || bare.starts_with("self:") || bare.ends_with(" self") {
                receiver = Some("self".to_string());
                continue;
            }
        }

        let (name, type_annotation) = match part.split_once(':') {
            Some((head, tail)) => (head.trim(), Some(tail.trim().to_string())),
            None => (part, None),
        };
        let name = name.strip_prefix("mut ").unwrap_or(name).trim();
        if name.is_empty() {
            continue;
        }

        params.push(ParamInfo {
            name: name.to_string(),
            type_annotation,
            optional: false,
            default: None,
            rest: false,
        });
    }

    (params, receiver)
}

/// `-> T` annotation between the closing paren and the body or semicolon
fn return_type_after(text: &str, after_idx: usize) -> Option<String> {
    let tail = text[after_idx..].trim_start();
    let tail = tail.strip_prefix("->")?;
    let end = tail
        .find(|c| c == '{' || c == ';')
        .unwrap_or(tail.len());
    let ty = tail[..end].trim();
    let ty = match ty.find(" where ") {
        Some(pos) => ty[..pos].trim(),
        None => ty,
    };
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}

/// First supertrait in a `trait Foo: Bar + Baz` header
fn supertrait_of(text: &str, name_end: usize) -> Option<String> {
    let header_end = text[name_end..]
        .find(|c| c == '{' || c == '\n')
        .map(|i| name_end + i)
        .unwrap_or(text.len());
    let header = text[name_end..header_end].trim_start();
    let bounds = header.strip_prefix(':')?;
    let first = bounds.split('+').next()?.trim();
    let first = first.rsplit("::").next().unwrap_or(first);
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

/// One `use` path into an import record. Brace groups become named imports
/// against the path before the braces; `::*` is a namespace import.
fn parse_use_path(path: &str, line: u32, is_re_export: bool) -> Option<ImportRecord> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    let base_kind = if is_re_export {
        ImportKind::ReExport
    } else {
        ImportKind::Named
    };

    if let Some(brace_idx) = path.find('{') {
        let module = path[..brace_idx].trim_end_matches("::").trim().to_string();
        let inner = path[brace_idx + 1..].trim_end_matches('}');
        let names = split_top_level(inner)
            .into_iter()
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() || part == "*" {
                    return None;
                }
                let name = match part.split_once(" as ") {
                    Some((_, alias)) => alias.trim(),
                    None => part.rsplit("::").next().unwrap_or(part),
                };
                if name == "self" {
                    module.rsplit("::").next().map(|s| s.to_string())
                } else {
                    Some(name.to_string())
                }
            })
            .collect();
        return Some(ImportRecord {
            module,
            names,
            kind: base_kind,
            dynamic: false,
            line,
        });
    }

    if let Some(module) = path.strip_suffix("::*") {
        return Some(ImportRecord {
            module: module.to_string(),
            names: Vec::new(),
            kind: if is_re_export {
                ImportKind::ReExport
            } else {
                ImportKind::Namespace
            },
            dynamic: false,
            line,
        });
    }

    let (path, alias) = match path.split_once(" as ") {
        Some((head, alias)) => (head.trim(), Some(alias.trim())),
        None => (path, None),
    };
    match path.rfind("::") {
        Some(idx) => {
            let last = &path[idx + 2..];
            Some(ImportRecord {
                module: path[..idx].to_string(),
                names: vec![alias.unwrap_or(last).to_string()],
                kind: base_kind,
                dynamic: false,
                line,
            })
        }
        None => Some(ImportRecord {
            module: path.to_string(),
            names: Vec::new(),
            kind: if is_re_export {
                ImportKind::ReExport
            } else {
                ImportKind::Module
            },
            dynamic: false,
            line,
        }),
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "if" | "else"
            | "match"
            | "while"
            | "for"
            | "loop"
            | "break"
            | "continue"
            | "return"
            | "fn"
            | "let"
            | "mut"
            | "impl"
            | "struct"
            | "enum"
            | "trait"
            | "use"
            | "mod"
            | "pub"
            | "crate"
            | "super"
            | "self"
            | "Self"
            | "move"
            | "async"
            | "await"
            | "dyn"
            | "ref"
            | "where"
            | "unsafe"
            | "type"
            | "const"
            | "static"
            | "in"
            | "as"
            | "true"
            | "false"
    )
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "Some" | "None"
            | "Ok"
            | "Err"
            | "Box"
            | "Vec"
            | "String"
            | "new"
            | "default"
            | "clone"
            | "to_string"
            | "to_owned"
            | "into"
            | "from"
            | "as_str"
            | "as_ref"
            | "len"
            | "is_empty"
            | "unwrap"
            | "unwrap_or"
            | "unwrap_or_else"
            | "unwrap_or_default"
            | "expect"
            | "iter"
            | "into_iter"
            | "collect"
            | "push"
            | "pop"
            | "insert"
            | "remove"
            | "get"
            | "get_mut"
            | "contains"
            | "contains_key"
            | "map"
            | "and_then"
            | "ok_or"
            | "ok_or_else"
            | "filter"
            | "find"
            | "any"
            | "all"
            | "drop"
            | "format"
            | "write"
            | "read"
            | "parse"
            | "trim"
            | "split"
            | "join"
            | "starts_with"
            | "ends_with"
            | "replace"
    )
}

// =============================================================================
// TESTS
// =============================================================================
