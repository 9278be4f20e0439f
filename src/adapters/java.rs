//! Java adapter
//!
//! Structural extraction for `.java` sources: class/interface/enum headers
//! with extends/implements, modifier-prefixed method declarations,
//! constructors, dotted imports, field-typed `this` receiver handling.
//!
//! @module adapters/java

use super::{
    block_doc_above, count_matches, estimate_end_line, function_spans, line_of, read_balanced,
    scan_callback_usages, scan_calls, scan_usages, split_top_level, CallRecord, CallScan,
    ClassDef, ExportRecord, FunctionDef, ImportKind, ImportRecord, LanguageAdapter, ParamInfo,
    ParsedModule, StateDef, SymbolKind, UsageRecord,
};
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// COMPILED REGEX PATTERNS
// =============================================================================

static TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]*((?:(?:public|protected|private|abstract|final|static|strictfp)\s+)*)(class|interface|enum)\s+([A-Za-z_$][A-Za-z0-9_$]*)(?:<[^>]*>)?(?:\s+extends\s+([A-Za-z_$][A-Za-z0-9_$.,<> ]*?))?(?:\s+implements\s+([A-Za-z_$][A-Za-z0-9_$.,<> ]*?))?\s*\{",
    )
    .unwrap()
});

static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]+((?:(?:public|protected|private|static|final|abstract|synchronized|native|default)\s+)*)(?:<[^>]*>\s*)?([A-Za-z_$][A-Za-z0-9_$.<>\[\]]*)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(",
    )
    .unwrap()
});

static CTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]+((?:(?:public|protected|private)\s+)?)([A-Z][A-Za-z0-9_$]*)\s*\(",
    )
    .unwrap()
});

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]+(?:(?:public|protected|private|static|final|transient|volatile)\s+)*([A-Z][A-Za-z0-9_$]*(?:<[^>]*>)?(?:\[\])?)\s+([a-z_$][A-Za-z0-9_$]*)\s*[=;]",
    )
    .unwrap()
});

static CONST_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[\t ]+(?:public\s+)?static\s+final\s+[A-Za-z_$][A-Za-z0-9_$.<>\[\]]*\s+([A-Z][A-Z0-9_]*)\s*=",
    )
    .unwrap()
});

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^import\s+(static\s+)?([A-Za-z_$][A-Za-z0-9_$.]*?)(\.\*)?\s*;").unwrap()
});

static REFLECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Class\.forName\s*\(|\.getMethod\s*\(|\.getDeclaredMethod\s*\(|\.invoke\s*\(|\.newInstance\s*\(",
    )
    .unwrap()
});

// Control-flow and declaration words that METHOD_RE can mistake for a
// return type or method name.
const NON_TYPE_WORDS: &[&str] = &[
    "return", "new", "throw", "else", "if", "while", "for", "switch", "catch", "do", "case",
    "assert", "break", "continue", "synchronized", "class", "interface", "enum", "package",
    "import", "extends", "implements",
];

// =============================================================================
// ADAPTER
// =============================================================================

pub struct JavaAdapter;

impl LanguageAdapter for JavaAdapter {
    fn language(&self) -> &'static str {
        "java"
    }

    fn parse(&self, text: &str) -> ParsedModule {
        let lines: Vec<&str> = text.lines().collect();
        let mut module = ParsedModule::default();

        for caps in TYPE_RE.captures_iter(text) {
            let (kw, name_match) = match (caps.get(2), caps.get(3)) {
                (Some(k), Some(n)) => (k.as_str(), n),
                _ => continue,
            };
            let kind = match kw {
                "class" => SymbolKind::Class,
                "interface" => SymbolKind::Interface,
                "enum" => SymbolKind::Enum,
                _ => continue,
            };
            let start_line = line_of(text, name_match.start());
            let end_line = estimate_end_line(&lines, start_line as usize) as u32;

            let mut extends_list: Vec<String> = caps
                .get(4)
                .map(|m| {
                    split_top_level(m.as_str())
                        .into_iter()
                        .map(|s| base_type(&s))
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let mut implements: Vec<String> = caps
                .get(5)
                .map(|m| {
                    split_top_level(m.as_str())
                        .into_iter()
                        .map(|s| base_type(&s))
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let extends = if extends_list.is_empty() {
                None
            } else {
                let first = extends_list.remove(0);
                // An interface's extra supertypes fold into implements
                implements.splice(0..0, extends_list.drain(..));
                Some(first)
            };

            module.classes.push(ClassDef {
                name: name_match.as_str().to_string(),
                kind,
                start_line,
                end_line,
                extends,
                implements,
                methods: Vec::new(),
                attribute_types: field_types_in_range(text, start_line, end_line),
                docstring: block_doc_above(&lines, start_line as usize - 1),
            });
        }

        for caps in METHOD_RE.captures_iter(text) {
            let (ret_match, name_match) = match (caps.get(2), caps.get(3)) {
                (Some(r), Some(n)) => (r, n),
                _ => continue,
            };
            let ret = ret_match.as_str();
            let name = name_match.as_str();
            if NON_TYPE_WORDS.contains(&ret) || NON_TYPE_WORDS.contains(&name) {
                continue;
            }

            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let open_idx = whole.end() - 1;
            let (raw_params, after_idx) = match read_balanced(text, open_idx, '(', ')') {
                Some(v) => v,
                None => continue,
            };
            // Declarations end in a body or (abstract) semicolon, never in an
            // expression continuation.
            if !is_declaration_tail(text, after_idx) {
                continue;
            }

            let start_line = line_of(text, name_match.start());
            let mut modifiers: Vec<String> = caps
                .get(1)
                .map(|m| m.as_str().split_whitespace().map(String::from).collect())
                .unwrap_or_default();
            modifiers.extend(annotations_above(&lines, start_line as usize));

            let func = FunctionDef {
                name: name.to_string(),
                start_line,
                end_line: estimate_end_line(&lines, start_line as usize) as u32,
                raw_params: raw_params.trim().to_string(),
                params: parse_params(&raw_params),
                return_type: Some(ret.to_string()),
                modifiers,
                docstring: block_doc_above(&lines, start_line as usize - 1),
                is_async: false,
                receiver: None,
            };
            attach_method(&mut module, func, start_line);
        }

        for caps in CTOR_RE.captures_iter(text) {
            let name_match = match caps.get(2) {
                Some(m) => m,
                None => continue,
            };
            let start_line = line_of(text, name_match.start());
            let owner_name = module
                .classes
                .iter()
                .filter(|c| c.start_line < start_line && start_line <= c.end_line)
                .min_by_key(|c| c.end_line - c.start_line)
                .map(|c| c.name.clone());
            // Only `Name(` where Name is the enclosing class is a constructor
            if owner_name.as_deref() != Some(name_match.as_str()) {
                continue;
            }

            let whole = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            let open_idx = whole.end() - 1;
            let (raw_params, after_idx) = match read_balanced(text, open_idx, '(', ')') {
                Some(v) => v,
                None => continue,
            };
            if !is_declaration_tail(text, after_idx) {
                continue;
            }

            let func = FunctionDef {
                name: name_match.as_str().to_string(),
                start_line,
                end_line: estimate_end_line(&lines, start_line as usize) as u32,
                raw_params: raw_params.trim().to_string(),
                params: parse_params(&raw_params),
                return_type: None,
                modifiers: caps
                    .get(1)
                    .map(|m| m.as_str().split_whitespace().map(String::from).collect())
                    .unwrap_or_default(),
                docstring: block_doc_above(&lines, start_line as usize - 1),
                is_async: false,
                receiver: None,
            };
            attach_method(&mut module, func, start_line);
        }

        for caps in CONST_FIELD_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                let line = line_of(text, m.start());
                module.state_objects.push(StateDef {
                    name: m.as_str().to_string(),
                    start_line: line,
                    end_line: line,
                    is_exported: true,
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
        for caps in IMPORT_RE.captures_iter(text) {
            let path_match = match caps.get(2) {
                Some(m) => m,
                None => continue,
            };
            let path = path_match.as_str();
            let line = line_of(text, path_match.start());

            let record = if caps.get(3).is_some() {
                ImportRecord {
                    module: path.to_string(),
                    names: Vec::new(),
                    kind: ImportKind::Namespace,
                    dynamic: false,
                    line,
                }
            } else if caps.get(1).is_some() {
                // `import static a.b.C.member` binds the member name
                let (module, member) = match path.rfind('.') {
                    Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
                    None => (path.to_string(), String::new()),
                };
                ImportRecord {
                    module,
                    names: if member.is_empty() {
                        Vec::new()
                    } else {
                        vec![member]
                    },
                    kind: ImportKind::Named,
                    dynamic: false,
                    line,
                }
            } else {
                let simple = path.rsplit('.').next().unwrap_or(path).to_string();
                ImportRecord {
                    module: path.to_string(),
                    names: vec![simple],
                    kind: ImportKind::Module,
                    dynamic: false,
                    line,
                }
            };
            imports.push(record);
        }
        imports
    }

    fn find_exports(&self, text: &str) -> Vec<ExportRecord> {
        let module = self.parse(text);
        let mut exports = Vec::new();

        for class in &module.classes {
            let header_public = class_is_public(text, class.start_line);
            if header_public {
                exports.push(ExportRecord {
                    name: class.name.clone(),
                    kind: class.kind,
                    line: class.start_line,
                    is_variable: false,
                    decl_kind: Some(class.kind.as_str().to_string()),
                    type_annotation: None,
                });
            }
            for method in &class.methods {
                if method.modifiers.iter().any(|m| m == "public") {
                    exports.push(ExportRecord {
                        name: method.name.clone(),
                        kind: if method.return_type.is_none() {
                            SymbolKind::Constructor
                        } else {
                            SymbolKind::Method
                        },
                        line: method.start_line,
                        is_variable: false,
                        decl_kind: None,
                        type_annotation: method.return_type.clone(),
                    });
                }
            }
        }
        for state in &module.state_objects {
            exports.push(ExportRecord {
                name: state.name.clone(),
                kind: SymbolKind::State,
                line: state.start_line,
                is_variable: true,
                decl_kind: None,
                type_annotation: None,
            });
        }

        exports
    }

    fn find_usages(&self, text: &str, name: &str) -> Vec<UsageRecord> {
        let def_re = match Regex::new(&format!(
            r"\b(?:class|interface|enum)\s+{}\b|(?:public|protected|private|static|final)[^=;{{]*\b{}\s*\(",
            regex::escape(name),
            regex::escape(name)
        )) {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        };

        scan_usages(
            text,
            name,
            &|line| line.trim_start().starts_with("import "),
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

/// Attach a method to the innermost class containing its line, or keep it as
/// a free function when no class encloses it.
fn attach_method(module: &mut ParsedModule, func: FunctionDef, start_line: u32) {
    let owner = module
        .classes
        .iter_mut()
        .filter(|c| c.start_line < start_line && start_line <= c.end_line)
        .min_by_key(|c| c.end_line - c.start_line);
    match owner {
        Some(class) => {
            // A constructor scan can duplicate a method already captured
            if !class
                .methods
                .iter()
                .any(|m| m.name == func.name && m.start_line == func.start_line)
            {
                class.methods.push(func);
            }
        }
        None => module.functions.push(func),
    }
}

/// Whether the text after a parameter list reads as a declaration: a body
/// brace, a throws clause, or an abstract-method semicolon.
fn is_declaration_tail(text: &str, after_idx: usize) -> bool {
    let tail = text[after_idx..].trim_start();
    tail.starts_with('{') || tail.starts_with(';') || tail.starts_with("throws ")
}

/// `Type name` parameters, with `final` stripped and `Type...` varargs
fn parse_params(raw: &str) -> Vec<ParamInfo> {
    let mut params = Vec::new();
    for part in split_top_level(raw) {
        let part = part.trim();
        let part = part.strip_prefix("final ").unwrap_or(part).trim();
        let rest = part.contains("...");

        let (ty, name) = match part.rsplit_once(char::is_whitespace) {
            Some((head, tail)) => (head.trim(), tail.trim()),
            None => continue,
        };
        if name.is_empty() {
            continue;
        }
        params.push(ParamInfo {
            name: name.to_string(),
            type_annotation: Some(ty.trim_end_matches("...").trim().to_string()),
            optional: rest,
            default: None,
            rest,
        });
    }
    params
}

/// Last dotted segment of a type reference, generics stripped
fn base_type(ty: &str) -> String {
    let ty = ty.trim();
    let ty = match ty.find('<') {
        Some(idx) => &ty[..idx],
        None => ty,
    };
    ty.rsplit('.').next().unwrap_or(ty).trim().to_string()
}

/// Annotation names (`@Override`) directly above a declaration
fn annotations_above(lines: &[&str], def_line: usize) -> Vec<String> {
    let mut annotations = Vec::new();
    let mut i = def_line - 1; // 0-indexed line above the declaration
    while i > 0 {
        i -= 1;
        let trimmed = lines[i].trim();
        if let Some(rest) = trimmed.strip_prefix('@') {
            let name = rest
                .split(|c: char| c == '(' || c == ' ')
                .next()
                .unwrap_or("");
            if !name.is_empty() {
                annotations.push(format!("@{}", name));
            }
        } else {
            break;
        }
    }
    annotations.reverse();
    annotations
}

/// Field name -> declared type within a class range, for `this.field` calls
fn field_types_in_range(text: &str, start_line: u32, end_line: u32) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for caps in FIELD_RE.captures_iter(text) {
        let (ty, name) = match (caps.get(1), caps.get(2)) {
            (Some(t), Some(n)) => (t, n),
            _ => continue,
        };
        let line = line_of(text, name.start());
        if line <= start_line || line > end_line {
            continue;
        }
        fields.push((name.as_str().to_string(), base_type(ty.as_str())));
    }
    fields
}

/// Whether the type header at `start_line` carries the `public` modifier
fn class_is_public(text: &str, start_line: u32) -> bool {
    text.lines()
        .nth(start_line as usize - 1)
        .map(|l| l.contains("public "))
        .unwrap_or(false)
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
            | "break"
            | "continue"
            | "return"
            | "new"
            | "throw"
            | "throws"
            | "try"
            | "catch"
            | "finally"
            | "class"
            | "interface"
            | "enum"
            | "extends"
            | "implements"
            | "this"
            | "super"
            | "instanceof"
            | "assert"
            | "synchronized"
            | "package"
            | "import"
            | "void"
            | "null"
            | "true"
            | "false"
    )
}

fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "println" | "print"
            | "printf"
            | "equals"
            | "hashCode"
            | "toString"
            | "valueOf"
            | "format"
            | "length"
            | "size"
            | "get"
            | "set"
            | "put"
            | "add"
            | "remove"
            | "contains"
            | "containsKey"
            | "isEmpty"
            | "iterator"
            | "stream"
            | "forEach"
            | "require"
            | "requireNonNull"
            | "asList"
            | "of"
            | "emptyList"
            | "singletonList"
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::UsageType;

    const SAMPLE: &str = r#"package com.example.service;

import java.util.Map;
import java.util.concurrent.ConcurrentHashMap;
import static java.util.Objects.requireNonNull;
import com.example.model.*;

/**
 * Coordinates entity storage.
 */
public class DataService extends BaseService implements Closeable, Flushable {

    public static final int MAX_RETRIES = 3;

    private final Map<String, Entity> storage = new ConcurrentHashMap<>();
    private Validator validator;

    public DataService(Validator validator) {
        this.validator = requireNonNull(validator);
    }

    /**
     * Saves one entity.
     */
    public void save(Entity entity, String... tags) {
        validator.check(entity);
        storage.put(entity.getId(), entity);
        audit(entity);
    }

    @Override
    public void close() {
        storage.clear();
    }

    private void audit(Entity entity) {
        this.validator.record(entity);
    }
}
"#;

    #[test]
    fn test_parse_class_header() {
        let module = JavaAdapter.parse(SAMPLE);
        let service = module
            .classes
            .iter()
            .find(|c| c.name == "DataService")
            .expect("DataService");
        assert_eq!(service.kind, SymbolKind::Class);
        assert_eq!(service.extends.as_deref(), Some("BaseService"));
        assert_eq!(service.implements, vec!["Closeable", "Flushable"]);
        assert_eq!(
            service.docstring.as_deref(),
            Some("Coordinates entity storage.")
        );
    }

    #[test]
    fn test_parse_methods_and_constructor() {
        let module = JavaAdapter.parse(SAMPLE);
        let service = &module.classes[0];

        let ctor = service
            .methods
            .iter()
            .find(|m| m.name == "DataService")
            .expect("constructor");
        assert!(ctor.return_type.is_none());
        assert_eq!(ctor.params.len(), 1);
        assert_eq!(ctor.params[0].type_annotation.as_deref(), Some("Validator"));

        let save = service.methods.iter().find(|m| m.name == "save").expect("save");
        assert_eq!(save.return_type.as_deref(), Some("void"));
        assert!(save.modifiers.iter().any(|m| m == "public"));
        assert!(save.params.iter().any(|p| p.name == "tags" && p.rest));

        let close = service.methods.iter().find(|m| m.name == "close").expect("close");
        assert!(close.modifiers.iter().any(|m| m == "@Override"));

        // `validator.check(entity);` is a statement, not a declaration
        assert!(!service.methods.iter().any(|m| m.name == "check"));
    }

    #[test]
    fn test_field_types() {
        let module = JavaAdapter.parse(SAMPLE);
        let service = &module.classes[0];
        assert!(service
            .attribute_types
            .iter()
            .any(|(f, t)| f == "validator" && t == "Validator"));
        assert!(service
            .attribute_types
            .iter()
            .any(|(f, t)| f == "storage" && t == "Map"));
    }

    #[test]
    fn test_find_imports() {
        let imports = JavaAdapter.find_imports(SAMPLE);

        let map = imports
            .iter()
            .find(|i| i.module == "java.util.Map")
            .expect("java.util.Map");
        assert_eq!(map.kind, ImportKind::Module);
        assert_eq!(map.names, vec!["Map"]);

        let stat = imports
            .iter()
            .find(|i| i.kind == ImportKind::Named)
            .expect("static import");
        assert_eq!(stat.module, "java.util.Objects");
        assert_eq!(stat.names, vec!["requireNonNull"]);

        assert!(imports
            .iter()
            .any(|i| i.module == "com.example.model" && i.kind == ImportKind::Namespace));
    }

    #[test]
    fn test_find_exports() {
        let exports = JavaAdapter.find_exports(SAMPLE);
        let names: Vec<_> = exports.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"DataService"));
        assert!(names.contains(&"save"));
        assert!(names.contains(&"MAX_RETRIES"));
        assert!(!names.contains(&"audit"));
    }

    #[test]
    fn test_find_calls() {
        let calls = JavaAdapter.find_calls(SAMPLE);

        let check = calls.iter().find(|c| c.name == "check").expect("check");
        assert!(check.is_method);
        assert_eq!(check.receiver.as_deref(), Some("validator"));
        assert_eq!(check.enclosing.as_ref().unwrap().name, "save");

        let audit = calls.iter().find(|c| c.name == "audit").expect("audit");
        assert!(!audit.is_method);

        let record = calls.iter().find(|c| c.name == "record").expect("record");
        assert_eq!(record.self_attribute.as_deref(), Some("validator"));
    }

    #[test]
    fn test_find_usages() {
        let usages = JavaAdapter.find_usages(SAMPLE, "save");
        assert!(usages.iter().any(|u| u.usage_type == UsageType::Definition));

        let imported = JavaAdapter.find_usages(SAMPLE, "Map");
        assert!(imported.iter().any(|u| u.usage_type == UsageType::Import));
    }

    #[test]
    fn test_count_dynamic_reflection() {
        let src = "Class<?> c = Class.forName(name);\nMethod m = c.getMethod(\"run\");\nm.invoke(obj);\n";
        assert_eq!(JavaAdapter.count_dynamic(src), 3);
    }
}
