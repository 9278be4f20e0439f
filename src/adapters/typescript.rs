//! TypeScript / JavaScript adapter
//!
//! Structural extraction for `.ts`/`.tsx` and `.js`/`.jsx` sources: function
//! and class declarations, arrow-function bindings, interfaces, type aliases,
//! enums, ES imports/exports, CommonJS require/module.exports.
//!
//! @module adapters/typescript

use super::{
    block_doc_above, count_matches, estimate_end_line, function_spans, line_of, read_balanced,
    scan_callback_usages, scan_calls, scan_usages, split_top_level, CallRecord, CallScan,
    ClassDef, ExportRecord, FunctionDef, ImportKind, ImportRecord, LanguageAdapter, ParamInfo,
    ParsedModule, StateDef, SymbolKind, UsageRecord, UsageType,
};
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// COMPILED REGEX PATTERNS
// =============================================================================

static FN_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*(?:<[^>]*>)?\s*\(",
    )
    .unwrap()
});

static ARROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?::[^=\n]+)?=\s*(?:async\s+)?\(",
    )
    .unwrap()
});

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)(?:<[^>]*>)?(?:\s+extends\s+([A-Za-z_$][A-Za-z0-9_$.]*))?(?:\s+implements\s+([^{\n]+))?",
    )
    .unwrap()
});

static INTERFACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*(?:export\s+)?interface\s+([A-Za-z_$][A-Za-z0-9_$]*)(?:<[^>]*>)?(?:\s+extends\s+([^{\n]+))?",
    )
    .unwrap()
});

static TYPE_ALIAS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[\t ]*(?:export\s+)?type\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?:<[^>]*>)?\s*=")
        .unwrap()
});

static ENUM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[\t ]*(?:export\s+)?(?:const\s+)?enum\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap()
});

static STATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*(export\s+)?const\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*(?::[^=\n]+)?=\s*\{",
    )
    .unwrap()
});

static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[\t ]*(?:(?:public|private|protected|readonly|static|abstract|override|async|get|set)\s+)*\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)\s*(?:<[^>]*>)?\s*\(",
    )
    .unwrap()
});

static IMPORT_FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[\t ]*import\s+(?:type\s+)?(.+?)\s+from\s+['"]([^'"]+)['"]"#).unwrap()
});

static SIDE_EFFECT_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[\t ]*import\s+['"]([^'"]+)['"]"#).unwrap());

static REQUIRE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?:(?:const|let|var)\s+(\{[^}]*\}|[A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*)?require\s*\(\s*['"]([^'"]+)['"]\s*\)"#,
    )
    .unwrap()
});

static DYNAMIC_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

static RE_EXPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[\t ]*export\s+(\*|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#).unwrap()
});

static EXPORT_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*export\s+(?:default\s+)?(?:abstract\s+)?(?:async\s+)?(function|class|interface|type|enum|const|let|var)\s+\*?\s*([A-Za-z_$][A-Za-z0-9_$]*)",
    )
    .unwrap()
});

static EXPORT_BRACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[\t ]*export\s*\{([^}]*)\}").unwrap());

static MODULE_EXPORTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[\t ]*(?:module\.)?exports\.([A-Za-z_$][A-Za-z0-9_$]*)\s*=").unwrap()
});

static ATTR_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"this\.([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*new\s+([A-Za-z_$][A-Za-z0-9_$]*)")
        .unwrap()
});

static EVAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\beval\s*\(").unwrap());
static NEW_FUNCTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnew\s+Function\s*\(").unwrap());
static DYN_IMPORT_EXPR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*\(\s*[^'")\s]"#).unwrap());
static DYN_REQUIRE_EXPR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\brequire\s*\(\s*[^'")\s]"#).unwrap());

// =============================================================================
// ADAPTER
// =============================================================================

pub struct TypeScriptAdapter;

impl LanguageAdapter for TypeScriptAdapter {
    fn language(&self) -> &'static str {
        "typescript"
    }

    fn parse(&self, text: &str) -> ParsedModule {
        let lines: Vec<&str> = text.lines().collect();
        let mut module = ParsedModule::default();

        for caps in FN_DECL_RE.captures_iter(text) {
            if let Some(func) = function_at(text, &lines, &caps, false) {
                module.functions.push(func);
            }
        }

        for caps in ARROW_RE.captures_iter(text) {
            if let Some(func) = function_at(text, &lines, &caps, true) {
                module.functions.push(func);
            }
        }

        for caps in CLASS_RE.captures_iter(text) {
            module.classes.push(class_at(text, &lines, &caps, SymbolKind::Class));
        }

        for caps in INTERFACE_RE.captures_iter(text) {
            module
                .classes
                .push(class_at(text, &lines, &caps, SymbolKind::Interface));
        }

        for caps in TYPE_ALIAS_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let line = line_of(text, m.start());
                module.classes.push(ClassDef {
                    name: m.as_str().to_string(),
                    kind: SymbolKind::TypeAlias,
                    start_line: line,
                    end_line: line,
                    extends: None,
                    implements: Vec::new(),
                    methods: Vec::new(),
                    attribute_types: Vec::new(),
                    docstring: block_doc_above(&lines, line as usize - 1),
                });
            }
        }

        for caps in ENUM_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let line = line_of(text, m.start());
                module.classes.push(ClassDef {
                    name: m.as_str().to_string(),
                    kind: SymbolKind::Enum,
                    start_line: line,
                    end_line: estimate_end_line(&lines, line as usize) as u32,
                    extends: None,
                    implements: Vec::new(),
                    methods: Vec::new(),
                    attribute_types: Vec::new(),
                    docstring: block_doc_above(&lines, line as usize - 1),
                });
            }
        }

        for caps in STATE_RE.captures_iter(text) {
            if let Some(m) = caps.get(2) {
                let line = line_of(text, m.start());
                module.state_objects.push(StateDef {
                    name: m.as_str().to_string(),
                    start_line: line,
                    end_line: estimate_end_line(&lines, line as usize) as u32,
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
                implicit_receivers: &["this"],
            },
            &spans,
        )
    }

    fn find_imports(&self, text: &str) -> Vec<ImportRecord> {
        let mut imports = Vec::new();

        for caps in IMPORT_FROM_RE.captures_iter(text) {
            let (clause, module) = match (caps.get(1), caps.get(2)) {
                (Some(c), Some(m)) => (c.as_str().trim(), m.as_str()),
                _ => continue,
            };
            let line = line_of(text, caps.get(0).map(|m| m.start()).unwrap_or(0));
            let (kind, names) = parse_import_clause(clause);
            imports.push(ImportRecord {
                module: module.to_string(),
                names,
                kind,
                dynamic: false,
                line,
            });
        }

        for caps in SIDE_EFFECT_IMPORT_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                imports.push(ImportRecord {
                    module: m.as_str().to_string(),
                    names: Vec::new(),
                    kind: ImportKind::SideEffect,
                    dynamic: false,
                    line: line_of(text, m.start()),
                });
            }
        }

        for caps in REQUIRE_RE.captures_iter(text) {
            if let Some(m) = caps.get(2) {
                let names = caps
                    .get(1)
                    .map(|b| brace_names(b.as_str()))
                    .unwrap_or_default();
                imports.push(ImportRecord {
                    module: m.as_str().to_string(),
                    names,
                    kind: ImportKind::Require,
                    dynamic: false,
                    line: line_of(text, m.start()),
                });
            }
        }

        for caps in DYNAMIC_IMPORT_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                imports.push(ImportRecord {
                    module: m.as_str().to_string(),
                    names: Vec::new(),
                    kind: ImportKind::Module,
                    dynamic: true,
                    line: line_of(text, m.start()),
                });
            }
        }

        imports.extend(self.find_re_exports(text));
        imports
    }

    fn find_exports(&self, text: &str) -> Vec<ExportRecord> {
        let mut exports = Vec::new();

        for caps in EXPORT_DECL_RE.captures_iter(text) {
            let (decl, name) = match (caps.get(1), caps.get(2)) {
                (Some(d), Some(n)) => (d.as_str(), n.as_str()),
                _ => continue,
            };
            let line = line_of(text, caps.get(0).map(|m| m.start()).unwrap_or(0));
            let kind = match decl {
                "function" => SymbolKind::Function,
                "class" => SymbolKind::Class,
                "interface" => SymbolKind::Interface,
                "type" => SymbolKind::TypeAlias,
                "enum" => SymbolKind::Enum,
                _ => SymbolKind::Variable,
            };
            let is_variable = matches!(decl, "const" | "let" | "var");
            let type_annotation = if is_variable {
                full_line(text, &caps)
                    .and_then(|l| type_annotation_of(&l))
            } else {
                None
            };
            exports.push(ExportRecord {
                name: name.to_string(),
                kind,
                line,
                is_variable,
                decl_kind: is_variable.then(|| decl.to_string()),
                type_annotation,
            });
        }

        for caps in EXPORT_BRACE_RE.captures_iter(text) {
            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            // `export { a } from "m"` is a re-export, not a local export
            let rest = text[whole.end()..].trim_start();
            if rest.starts_with("from") {
                continue;
            }
            let line = line_of(text, whole.start());
            if let Some(inner) = caps.get(1) {
                for name in brace_names(inner.as_str()) {
                    exports.push(ExportRecord {
                        name,
                        kind: SymbolKind::Variable,
                        line,
                        is_variable: false,
                        decl_kind: None,
                        type_annotation: None,
                    });
                }
            }
        }

        for caps in MODULE_EXPORTS_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                exports.push(ExportRecord {
                    name: m.as_str().to_string(),
                    kind: SymbolKind::Variable,
                    line: line_of(text, m.start()),
                    is_variable: true,
                    decl_kind: Some("exports".to_string()),
                    type_annotation: None,
                });
            }
        }

        exports
    }

    fn find_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        let def_re = Regex::new(&format!(
            r"\b(?:function|class|interface|enum|type)\s+{0}\b|\b(?:const|let|var)\s+{0}\s*[:=]",
            regex::escape(name)
        ));
        let def_re = match def_re {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };

        scan_usages(
            text,
            name,
            &|line| {
                let t = line.trim_start();
                t.starts_with("import ")
                    || t.contains("require(")
                    || (t.starts_with("export") && t.contains(" from "))
            },
            &|line| def_re.is_match(line),
        )
    }

    fn find_callback_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        scan_callback_usages(text, name)
    }

    fn find_re_exports(&self, text: &str) -> Vec<ImportRecord> {
        let mut re_exports = Vec::new();
        for caps in RE_EXPORT_RE.captures_iter(text) {
            let (clause, module) = match (caps.get(1), caps.get(2)) {
                (Some(c), Some(m)) => (c.as_str(), m.as_str()),
                _ => continue,
            };
            let names = if clause == "*" {
                Vec::new()
            } else {
                brace_names(clause)
            };
            re_exports.push(ImportRecord {
                module: module.to_string(),
                names,
                kind: ImportKind::ReExport,
                dynamic: false,
                line: line_of(text, caps.get(0).map(|m| m.start()).unwrap_or(0)),
            });
        }
        re_exports
    }

    fn count_dynamic(&self, text: &str) -> usize {
        count_matches(
            text,
            &[
                &EVAL_RE,
                &NEW_FUNCTION_RE,
                &DYN_IMPORT_EXPR_RE,
                &DYN_REQUIRE_EXPR_RE,
            ],
        )
    }
}

// =============================================================================
// EXTRACTION HELPERS
// =============================================================================

/// Build a FunctionDef from a declaration match whose `(` is the last matched
/// character. `arrow` declarations must be confirmed by a `=>` after the
/// parameter list.
fn function_at(
    text: &str,
    lines: &[&str],
    caps: &regex::Captures<'_>,
    arrow: bool,
) -> Option<FunctionDef> {
    let name_match = caps.get(1)?;
    let whole = caps.get(0)?;
    let open_idx = whole.end() - 1;
    let (raw_params, after_idx) = read_balanced(text, open_idx, '(', ')')?;

    if arrow {
        let rest = text[after_idx..].trim_start();
        let confirmed = match rest.strip_prefix(':') {
            // Return-type annotation sits between `)` and `=>`
            Some(after_colon) => after_colon
                .lines()
                .next()
                .map(|l| l.contains("=>"))
                .unwrap_or(false),
            None => rest.starts_with("=>"),
        };
        if !confirmed {
            return None;
        }
    }

    let header = whole.as_str();
    let start_line = line_of(text, whole.start());
    let mut modifiers = Vec::new();
    for word in ["export", "default", "async", "static"] {
        if header.contains(&format!("{} ", word)) {
            modifiers.push(word.to_string());
        }
    }

    Some(FunctionDef {
        name: name_match.as_str().to_string(),
        start_line,
        end_line: estimate_end_line(lines, start_line as usize) as u32,
        raw_params: raw_params.trim().to_string(),
        params: parse_params(&raw_params),
        return_type: return_type_after(text, after_idx),
        is_async: header.contains("async"),
        docstring: block_doc_above(lines, start_line as usize - 1),
        modifiers,
        receiver: None,
    })
}

fn class_at(
    text: &str,
    lines: &[&str],
    caps: &regex::Captures<'_>,
    kind: SymbolKind,
) -> ClassDef {
    let name = caps
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let start_line = caps
        .get(0)
        .map(|m| line_of(text, m.start()))
        .unwrap_or(1);
    let end_line = estimate_end_line(lines, start_line as usize) as u32;

    let extends = caps.get(2).map(|m| m.as_str().trim().to_string());
    let implements = caps
        .get(3)
        .map(|m| {
            split_top_level(m.as_str())
                .into_iter()
                .map(|s| s.trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    // Interface `extends A, B` lands in capture 2 as a single head; split it
    let (extends, mut implements) = match (kind, &extends) {
        (SymbolKind::Interface, Some(list)) if list.contains(',') => {
            let mut parts = split_top_level(list);
            let first = if parts.is_empty() {
                None
            } else {
                Some(parts.remove(0))
            };
            (first, parts)
        }
        _ => (extends, implements),
    };
    implements.retain(|s| !s.is_empty());

    let methods = methods_in_range(text, lines, start_line, end_line);
    let attribute_types = attribute_types_in_range(text, lines, start_line, end_line);

    ClassDef {
        name,
        kind,
        start_line,
        end_line,
        extends,
        implements,
        methods,
        attribute_types,
        docstring: block_doc_above(lines, start_line as usize - 1),
    }
}

/// Method definitions on lines within (start_line, end_line].
///
/// Only lines at the body's minimum indent are considered, so statements
/// inside method bodies never register as methods.
fn methods_in_range(text: &str, lines: &[&str], start_line: u32, end_line: u32) -> Vec<FunctionDef> {
    let body_indent = lines
        .iter()
        .enumerate()
        .filter(|(idx, l)| {
            let line_no = *idx as u32 + 1;
            let trimmed = l.trim();
            line_no > start_line
                && line_no <= end_line
                && !trimmed.is_empty()
                && !trimmed.starts_with('}')
                && !trimmed.starts_with("//")
                && !trimmed.starts_with('*')
                && !trimmed.starts_with("/*")
        })
        .map(|(_, l)| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut methods = Vec::new();
    let mut offset = 0usize;

    for (idx, line_text) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let indent = line_text.len() - line_text.trim_start().len();
        if line_no > start_line
            && line_no <= end_line
            && indent == body_indent
            && !line_text.trim().is_empty()
        {
            if let Some(caps) = METHOD_RE.captures(line_text) {
                if let Some(name_match) = caps.get(1) {
                    let name = name_match.as_str();
                    if !is_keyword(name) || name == "constructor" {
                        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("");
                        let open_idx = offset + whole.len() - 1;
                        if let Some((raw_params, after_idx)) =
                            read_balanced(text, open_idx, '(', ')')
                        {
                            let mut modifiers = Vec::new();
                            for word in ["public", "private", "protected", "static", "async", "abstract", "override", "get", "set"] {
                                if whole.contains(&format!("{} ", word)) {
                                    modifiers.push(word.to_string());
                                }
                            }
                            methods.push(FunctionDef {
                                name: name.to_string(),
                                start_line: line_no,
                                end_line: estimate_end_line(lines, line_no as usize) as u32,
                                raw_params: raw_params.trim().to_string(),
                                params: parse_params(&raw_params),
                                return_type: return_type_after(text, after_idx),
                                is_async: whole.contains("async"),
                                docstring: block_doc_above(lines, line_no as usize - 1),
                                modifiers,
                                receiver: None,
                            });
                        }
                    }
                }
            }
        }
        offset += line_text.len() + 1;
    }

    methods
}

/// `this.attr = new Type(...)` assignments within a class body
fn attribute_types_in_range(
    text: &str,
    _lines: &[&str],
    start_line: u32,
    end_line: u32,
) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for caps in ATTR_ASSIGN_RE.captures_iter(text) {
        if let (Some(attr), Some(ty)) = (caps.get(1), caps.get(2)) {
            let line = line_of(text, attr.start());
            if line > start_line && line <= end_line {
                attrs.push((attr.as_str().to_string(), ty.as_str().to_string()));
            }
        }
    }
    attrs
}

/// Parse a raw parameter list into structured parameters
fn parse_params(raw: &str) -> Vec<ParamInfo> {
    split_top_level(raw)
        .into_iter()
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let rest = part.starts_with("...");
            let part = part.trim_start_matches("...");

            let (before_default, default) = match split_once_top(part, '=') {
                Some((head, tail)) => (head.trim().to_string(), Some(tail.trim().to_string())),
                None => (part.to_string(), None),
            };
            let (name_part, type_annotation) = match split_once_top(&before_default, ':') {
                Some((head, tail)) => (head.trim().to_string(), Some(tail.trim().to_string())),
                None => (before_default.clone(), None),
            };
            let optional = name_part.ends_with('?') || default.is_some();
            let name = name_part.trim_end_matches('?').trim().to_string();
            if name.is_empty() {
                return None;
            }

            Some(ParamInfo {
                name,
                type_annotation,
                optional,
                default,
                rest,
            })
        })
        .collect()
}

/// Split at the first top-level occurrence of `sep` (outside brackets/quotes)
fn split_once_top(s: &str, sep: char) -> Option<(String, String)> {
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    let mut prev = '\0';
    for (i, ch) in s.char_indices() {
        match in_quote {
            Some(q) => {
                if ch == q && prev != '\\' {
                    in_quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => in_quote = Some(ch),
                '(' | '[' | '{' | '<' => depth += 1,
                ')' | ']' | '}' | '>' => {
                    if depth > 0 {
                        depth -= 1;
                    }
                }
                c if c == sep && depth == 0 => {
                    return Some((s[..i].to_string(), s[i + sep.len_utf8()..].to_string()));
                }
                _ => {}
            },
        }
        prev = ch;
    }
    None
}

/// Return-type annotation after a closing paren: `): T {` or `): T =>`
fn return_type_after(text: &str, after_idx: usize) -> Option<String> {
    let tail = text[after_idx..].trim_start();
    let tail = tail.strip_prefix(':')?;
    let end = tail
        .find(|c| c == '{' || c == ';' || c == '\n')
        .unwrap_or(tail.len());
    let ty = tail[..end].trim().trim_end_matches("=>").trim();
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}

/// Local names from an import/export brace clause, `a as b` keeping the alias
fn brace_names(clause: &str) -> Vec<String> {
    let inner = clause.trim().trim_start_matches('{').trim_end_matches('}');
    inner
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
        .collect()
}

/// Classify an `import X from` clause into kind + local names
fn parse_import_clause(clause: &str) -> (ImportKind, Vec<String>) {
    let clause = clause.trim();
    if clause.starts_with('{') {
        (ImportKind::Named, brace_names(clause))
    } else if clause.starts_with('*') {
        let name = clause
            .split_once(" as ")
            .map(|(_, n)| n.trim().to_string())
            .into_iter()
            .collect();
        (ImportKind::Namespace, name)
    } else if let Some((default, braces)) = clause.split_once(',') {
        let mut names = vec![default.trim().to_string()];
        names.extend(brace_names(braces.trim()));
        (ImportKind::Named, names)
    } else {
        (ImportKind::Module, vec![clause.to_string()])
    }
}

fn full_line(text: &str, caps: &regex::Captures<'_>) -> Option<String> {
    let start = caps.get(0)?.start();
    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(text.len());
    Some(text[line_start..line_end].to_string())
}

fn type_annotation_of(line: &str) -> Option<String> {
    // Only the declaration head, so a `:` inside the initializer never counts
    let head = line.split('=').next().unwrap_or("");
    let ty = head.split_once(':')?.1.trim();
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "if" | "else"
            | "for"
            | "while"
            | "do"
            | "switch"
            | "case"
            | "default"
            | "break"
            | "continue"
            | "return"
            | "throw"
            | "try"
            | "catch"
            | "finally"
            | "var"
            | "let"
            | "const"
            | "function"
            | "class"
            | "extends"
            | "implements"
            | "import"
            | "export"
            | "from"
            | "as"
            | "async"
            | "await"
            | "yield"
            | "static"
            | "get"
            | "set"
            | "new"
            | "delete"
            | "in"
            | "of"
            | "typeof"
            | "instanceof"
            | "void"
            | "this"
            | "super"
            | "constructor"
            | "true"
            | "false"
            | "null"
            | "undefined"
    )
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "console"
            | "log"
            | "error"
            | "warn"
            | "info"
            | "debug"
            | "parseInt"
            | "parseFloat"
            | "isNaN"
            | "isFinite"
            | "setTimeout"
            | "setInterval"
            | "clearTimeout"
            | "clearInterval"
            | "require"
            | "JSON"
            | "Math"
            | "Date"
            | "Array"
            | "Object"
            | "String"
            | "Number"
            | "Boolean"
            | "Symbol"
            | "Map"
            | "Set"
            | "WeakMap"
            | "WeakSet"
            | "Promise"
            | "Proxy"
            | "Reflect"
            | "Error"
            | "RegExp"
            | "fetch"
            | "stringify"
            | "parse"
            | "resolve"
            | "reject"
            | "then"
            | "push"
            | "pop"
            | "map"
            | "filter"
            | "forEach"
            | "join"
            | "split"
            | "slice"
            | "concat"
            | "includes"
            | "indexOf"
            | "keys"
            | "values"
            | "entries"
    )
}

// =============================================================================
// TESTS
// =============================================================================
