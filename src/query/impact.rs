//! Refactor impact analysis
//!
//! Inspects every call site of a symbol at the source level: arguments are
//! recovered with a depth-aware splitter, never a naive comma split, so
//! nested calls, collections, and quoted strings stay intact. `verify`
//! checks call arity against the declared parameters and `plan` simulates a
//! signature change, emitting suggested edits without applying them.
//!
//! @module query/impact

use super::{signature_of, Lookup, QueryEngine};
use crate::adapters::{read_balanced, split_top_level, ParamInfo};
use crate::calls::policy::implicit_receivers;
use crate::index::Symbol;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// Shape of one call argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    Literal,
    Variable,
    /// `*args` / `...args`; defeats arity checking
    Spread,
}

/// One call site with its recovered argument list
#[derive(Debug, Clone, Serialize)]
pub struct CallSite {
    pub file: PathBuf,
    pub line: u32,
    pub args: Vec<String>,
    pub arg_kinds: Vec<ArgKind>,
    pub awaited: bool,
    /// The call's result is immediately dereferenced (`f(x).g`)
    pub chained: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactResult {
    pub name: String,
    pub total: usize,
    pub sites: Vec<CallSite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MismatchedSite {
    pub file: PathBuf,
    pub line: u32,
    pub arg_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub name: String,
    /// Required-parameter count, implicit receivers excluded
    pub min: usize,
    /// None with a rest/variadic parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
    pub total: usize,
    pub valid: usize,
    /// Sites with spread arguments or unrecoverable argument lists
    pub uncertain: usize,
    pub mismatched: Vec<MismatchedSite>,
}

/// One simulated signature change
#[derive(Debug, Clone, Serialize)]
pub enum PlanOperation {
    AddParam {
        name: String,
        default: Option<String>,
    },
    RemoveParam {
        name: String,
    },
    RenameParam {
        from: String,
        to: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanEdit {
    pub file: PathBuf,
    pub line: u32,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResult {
    pub name: String,
    pub signature_before: String,
    pub signature_after: String,
    pub edits: Vec<PlanEdit>,
}

// =============================================================================
// ENGINE OPERATIONS
// =============================================================================

impl<'a> QueryEngine<'a> {
    /// Argument-level view of every call site of `name`.
    pub fn impact(&self, name: &str) -> Lookup<ImpactResult> {
        let resolution = match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => resolution,
            Lookup::NotFound { name, suggestions } => {
                return Lookup::NotFound { name, suggestions }
            }
        };
        let sites = self.collect_sites(&resolution.symbol);
        self.source.clear();
        Lookup::Found(ImpactResult {
            name: name.to_string(),
            total: sites.len(),
            sites,
        })
    }

    /// Check every call site's arity against the declared parameters.
    pub fn verify(&self, name: &str) -> Lookup<VerifyResult> {
        let resolution = match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => resolution,
            Lookup::NotFound { name, suggestions } => {
                return Lookup::NotFound { name, suggestions }
            }
        };
        let symbol = &resolution.symbol;
        let language = self
            .index
            .files
            .get(&symbol.file)
            .map(|e| e.language.clone())
            .unwrap_or_default();
        let (min, max) = expected_arity(symbol, &language);

        let mut result = VerifyResult {
            name: name.to_string(),
            min,
            max,
            total: 0,
            valid: 0,
            uncertain: 0,
            mismatched: Vec::new(),
        };

        for hit in self.resolver.callers_of(symbol).hits {
            result.total += 1;
            let site = match self.extract_site(&hit.file, hit.line, symbol.name.as_str()) {
                Some(site) => site,
                None => {
                    result.uncertain += 1;
                    continue;
                }
            };
            if site.arg_kinds.contains(&ArgKind::Spread) {
                result.uncertain += 1;
                continue;
            }
            let count = site.args.len();
            let fits = count >= min && max.map_or(true, |m| count <= m);
            if fits {
                result.valid += 1;
            } else {
                result.mismatched.push(MismatchedSite {
                    file: site.file,
                    line: site.line,
                    arg_count: count,
                });
            }
        }

        self.source.clear();
        Lookup::Found(result)
    }

    /// Simulate a parameter change and suggest the per-site edits it would
    /// require. Nothing is written.
    pub fn plan(&self, name: &str, ops: &[PlanOperation]) -> Lookup<PlanResult> {
        let resolution = match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => resolution,
            Lookup::NotFound { name, suggestions } => {
                return Lookup::NotFound { name, suggestions }
            }
        };
        let symbol = &resolution.symbol;
        let language = self
            .index
            .files
            .get(&symbol.file)
            .map(|e| e.language.clone())
            .unwrap_or_default();

        let receivers = implicit_receivers(&language);
        let before_params: Vec<ParamInfo> = symbol
            .params
            .iter()
            .filter(|p| !receivers.contains(&p.name.as_str()))
            .cloned()
            .collect();
        let after_params = apply_ops(&before_params, ops);

        let mut edits = Vec::new();
        for site in self.collect_sites(symbol) {
            let new_args = rewrite_args(&site.args, &before_params, ops);
            if new_args != site.args {
                edits.push(PlanEdit {
                    before: format!("{}({})", symbol.name, site.args.join(", ")),
                    after: format!("{}({})", symbol.name, new_args.join(", ")),
                    file: site.file,
                    line: site.line,
                });
            }
        }

        self.source.clear();
        Lookup::Found(PlanResult {
            name: name.to_string(),
            signature_before: signature_of(symbol),
            signature_after: format!(
                "{}({})",
                symbol.name,
                render_params(&after_params, &language)
            ),
            edits,
        })
    }

    fn collect_sites(&self, symbol: &Symbol) -> Vec<CallSite> {
        self.resolver
            .callers_of(symbol)
            .hits
            .iter()
            .filter_map(|hit| self.extract_site(&hit.file, hit.line, symbol.name.as_str()))
            .collect()
    }

    /// Recover the argument list of a call to `name` at `file:line`. The
    /// balanced read continues past the line, so multi-line argument lists
    /// come back whole.
    fn extract_site(&self, file: &std::path::Path, line: u32, name: &str) -> Option<CallSite> {
        let content = self.source.content(file)?;
        let line_start = byte_offset_of_line(&content, line)?;
        let line_end = content[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(content.len());

        let pattern = Regex::new(&format!(r"\b{}\s*\(", regex::escape(name))).ok()?;
        let mat = pattern.find_at(&content, line_start)?;
        if mat.start() >= line_end {
            return None;
        }

        let open_idx = mat.end() - 1;
        let (inner, close_idx) = read_balanced(&content, open_idx, '(', ')')?;
        let args = split_top_level(&inner);
        let arg_kinds = args.iter().map(|a| classify_arg(a)).collect();

        let prefix = content[line_start..mat.start()].trim_end();
        let awaited = prefix.ends_with("await");
        let chained = content[close_idx..].trim_start().starts_with('.');

        Some(CallSite {
            file: file.to_path_buf(),
            line,
            args,
            arg_kinds,
            awaited,
            chained,
        })
    }
}

// =============================================================================
// ARITY AND ARGUMENT HELPERS
// =============================================================================

/// (min, max) expected argument count; `None` max means unbounded.
fn expected_arity(symbol: &Symbol, language: &str) -> (usize, Option<usize>) {
    let receivers = implicit_receivers(language);
    let params: Vec<&ParamInfo> = symbol
        .params
        .iter()
        .filter(|p| !receivers.contains(&p.name.as_str()))
        .collect();

    let min = params
        .iter()
        .filter(|p| !p.optional && p.default.is_none() && !p.rest)
        .count();
    let max = if params.iter().any(|p| p.rest) {
        None
    } else {
        Some(params.len())
    };
    (min, max)
}

static KWARG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*([^=].*)$").unwrap()
});

fn classify_arg(arg: &str) -> ArgKind {
    let value = KWARG_RE
        .captures(arg)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim())
        .unwrap_or(arg);

    if value.starts_with("...") || value.starts_with('*') {
        return ArgKind::Spread;
    }
    let first = match value.chars().next() {
        Some(c) => c,
        None => return ArgKind::Variable,
    };
    const LITERAL_WORDS: [&str; 8] = [
        "true", "false", "True", "False", "None", "null", "undefined", "nil",
    ];
    if first.is_ascii_digit()
        || first == '"'
        || first == '\''
        || first == '`'
        || first == '['
        || first == '{'
        || (first == '-' && value[1..].chars().next().map_or(false, |c| c.is_ascii_digit()))
        || LITERAL_WORDS.contains(&value)
    {
        ArgKind::Literal
    } else {
        ArgKind::Variable
    }
}

fn apply_ops(params: &[ParamInfo], ops: &[PlanOperation]) -> Vec<ParamInfo> {
    let mut result = params.to_vec();
    for op in ops {
        match op {
            PlanOperation::AddParam { name, default } => result.push(ParamInfo {
                name: name.clone(),
                optional: default.is_some(),
                default: default.clone(),
                ..Default::default()
            }),
            PlanOperation::RemoveParam { name } => result.retain(|p| p.name != *name),
            PlanOperation::RenameParam { from, to } => {
                for p in result.iter_mut().filter(|p| p.name == *from) {
                    p.name = to.clone();
                }
            }
        }
    }
    result
}

/// Project a signature change onto one recovered argument list
fn rewrite_args(args: &[String], params: &[ParamInfo], ops: &[PlanOperation]) -> Vec<String> {
    let mut result = args.to_vec();
    for op in ops {
        match op {
            PlanOperation::AddParam { name, default } => {
                result.push(default.clone().unwrap_or_else(|| name.clone()));
            }
            PlanOperation::RemoveParam { name } => {
                if let Some(idx) = result
                    .iter()
                    .position(|a| keyword_of(a) == Some(name.as_str()))
                {
                    result.remove(idx);
                } else if let Some(pos) = params.iter().position(|p| p.name == *name) {
                    if pos < result.len() && keyword_of(&result[pos]).is_none() {
                        result.remove(pos);
                    }
                }
            }
            PlanOperation::RenameParam { from, to } => {
                for arg in result.iter_mut() {
                    if keyword_of(arg) == Some(from.as_str()) {
                        if let Some(caps) = KWARG_RE.captures(arg) {
                            *arg = format!("{}={}", to, &caps[2]);
                        }
                    }
                }
            }
        }
    }
    result
}

fn keyword_of(arg: &str) -> Option<&str> {
    KWARG_RE
        .captures(arg)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn render_params(params: &[ParamInfo], language: &str) -> String {
    let rest_prefix = match language {
        "python" => "*",
        "go" => "...",
        _ => "...",
    };
    params
        .iter()
        .map(|p| {
            let mut rendered = String::new();
            if p.rest {
                rendered.push_str(rest_prefix);
            }
            rendered.push_str(&p.name);
            if let Some(default) = &p.default {
                rendered.push('=');
                rendered.push_str(default);
            }
            rendered
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Byte offset of the start of a 1-indexed line
fn byte_offset_of_line(content: &str, line: u32) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    for (idx, text) in content.split_inclusive('\n').enumerate() {
        if idx as u32 + 1 == line {
            return Some(offset);
        }
        offset += text.len();
    }
    None
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

    fn two_file_project(temp: &TempDir, call: &str) {
        std::fs::write(
            temp.path().join("lib.py"),
            "def foo(x, y=1):\n    pass\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("main.py"),
            format!("from lib import foo\n\n{}\n", call),
        )
        .unwrap();
    }

    #[test]
    fn test_impact_recovers_args() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(1)");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.impact("foo").found().unwrap();

        assert_eq!(result.total, 1);
        assert!(result.sites[0].file.ends_with("main.py"));
        assert_eq!(result.sites[0].args, vec!["1"]);
        assert_eq!(result.sites[0].arg_kinds, vec![ArgKind::Literal]);
    }

    #[test]
    fn test_impact_nested_args_stay_intact() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(bar(1, 2), [3, 4])");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.impact("foo").found().unwrap();

        assert_eq!(result.sites[0].args, vec!["bar(1, 2)", "[3, 4]"]);
        assert_eq!(
            result.sites[0].arg_kinds,
            vec![ArgKind::Variable, ArgKind::Literal]
        );
    }

    #[test]
    fn test_impact_chained_call() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "value = foo(raw).bit_length()");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.impact("foo").found().unwrap();

        assert!(result.sites[0].chained);
        assert_eq!(result.sites[0].arg_kinds, vec![ArgKind::Variable]);
    }

    #[test]
    fn test_verify_scenario_bounds() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(1)");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.verify("foo").found().unwrap();

        assert_eq!(result.min, 1);
        assert_eq!(result.max, Some(2));
        assert_eq!(result.total, 1);
        assert_eq!(result.valid, 1);
        assert!(result.mismatched.is_empty());
    }

    #[test]
    fn test_verify_flags_arity_mismatch() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(1, 2, 3)");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.verify("foo").found().unwrap();

        assert_eq!(result.valid, 0);
        assert_eq!(result.mismatched.len(), 1);
        assert_eq!(result.mismatched[0].arg_count, 3);
    }

    #[test]
    fn test_verify_spread_is_uncertain() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(*values)");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.verify("foo").found().unwrap();

        assert_eq!(result.uncertain, 1);
        assert_eq!(result.valid, 0);
        assert!(result.mismatched.is_empty());
    }

    #[test]
    fn test_verify_excludes_receiver_param() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("svc.py"),
            "class Service:\n    def run(self, x):\n        pass\n\n    def go(self):\n        self.run(1)\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.verify("run").found().unwrap();

        assert_eq!(result.min, 1);
        assert_eq!(result.max, Some(1));
        assert_eq!(result.valid, 1);
    }

    #[test]
    fn test_plan_add_param_suggests_edits() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(1)");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let ops = vec![PlanOperation::AddParam {
            name: "z".to_string(),
            default: Some("2".to_string()),
        }];
        let result = engine.plan("foo", &ops).found().unwrap();

        assert_eq!(result.signature_after, "foo(x, y=1, z=2)");
        assert_eq!(result.edits.len(), 1);
        assert_eq!(result.edits[0].before, "foo(1)");
        assert_eq!(result.edits[0].after, "foo(1, 2)");
    }

    #[test]
    fn test_plan_rename_rewrites_keyword_args() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(1, y=5)");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let ops = vec![PlanOperation::RenameParam {
            from: "y".to_string(),
            to: "why".to_string(),
        }];
        let result = engine.plan("foo", &ops).found().unwrap();

        assert_eq!(result.signature_after, "foo(x, why=1)");
        assert_eq!(result.edits.len(), 1);
        assert_eq!(result.edits[0].after, "foo(1, why=5)");
    }

    #[test]
    fn test_plan_remove_positional() {
        let temp = TempDir::new().unwrap();
        two_file_project(&temp, "foo(1, 2)");

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let ops = vec![PlanOperation::RemoveParam {
            name: "y".to_string(),
        }];
        let result = engine.plan("foo", &ops).found().unwrap();

        assert_eq!(result.signature_after, "foo(x)");
        assert_eq!(result.edits[0].after, "foo(1)");
    }

    #[test]
    fn test_classify_arg_kinds() {
        assert_eq!(classify_arg("42"), ArgKind::Literal);
        assert_eq!(classify_arg("-3"), ArgKind::Literal);
        assert_eq!(classify_arg("\"text\""), ArgKind::Literal);
        assert_eq!(classify_arg("None"), ArgKind::Literal);
        assert_eq!(classify_arg("[1, 2]"), ArgKind::Literal);
        assert_eq!(classify_arg("user"), ArgKind::Variable);
        assert_eq!(classify_arg("user.name"), ArgKind::Variable);
        assert_eq!(classify_arg("*args"), ArgKind::Spread);
        assert_eq!(classify_arg("...rest"), ArgKind::Spread);
        assert_eq!(classify_arg("timeout=30"), ArgKind::Literal);
        assert_eq!(classify_arg("timeout=limit"), ArgKind::Variable);
    }
}
