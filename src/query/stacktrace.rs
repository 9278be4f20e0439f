//! Stack-trace resolution
//!
//! Maps heterogeneous runtime trace text back onto indexed source. Each
//! line is tried against an ordered list of format patterns and the first
//! match wins. Reported paths rarely match the index verbatim (absolute
//! prefixes, build dirs), so candidate files are ranked by trailing-path
//! agreement; a frame whose function name and line land inside an indexed
//! symbol's range beats any path-only match.
//!
//! @module query/stacktrace

use super::QueryEngine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;

/// One parsed frame, with its resolution against the index when found
#[derive(Debug, Clone, Serialize)]
pub struct StackFrame {
    /// Trace format that matched the line
    pub format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub reported_file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedLocation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedLocation {
    pub file: PathBuf,
    pub line: u32,
    /// Indexed symbol whose range contains the frame line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// 0-100; 100 means function name and line agree with the index
    pub confidence: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StackTraceResult {
    pub frames: Vec<StackFrame>,
    pub resolved: usize,
}

static PYTHON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"File "([^"]+)", line (\d+)(?:, in (\S+))?"#).unwrap()
});
static NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at\s+(?:([^()\s][^()]*)\s+\()?([^():\s]+):(\d+):\d+\)?").unwrap()
});
static RUST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"panicked at (?:'[^']*',\s*)?([^:\s]+):(\d+)").unwrap()
});
static GO_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\S+\.go):(\d+)(?:\s+\+0x[0-9a-f]+)?\s*$").unwrap());
static GO_FUNC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([\w./*()]+)\(.*\)\s*$").unwrap());
static JAVA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"at\s+([\w.$<>]+)\(([^:)]+):(\d+)\)").unwrap()
});

impl<'a> QueryEngine<'a> {
    /// Parse trace text and resolve each frame against the index.
    pub fn parse_stack_trace(&self, text: &str) -> StackTraceResult {
        let mut frames = Vec::new();
        // A Go frame spans two lines: function call, then file:line
        let mut pending_go_func: Option<String> = None;

        for raw in text.lines() {
            let parsed = parse_line(raw, &mut pending_go_func);
            let (format, function, reported_file, line) = match parsed {
                Some(parts) => parts,
                None => continue,
            };
            let resolved = self.resolve_frame(&reported_file, line, function.as_deref());
            frames.push(StackFrame {
                format,
                function,
                reported_file,
                line,
                resolved,
            });
        }

        let resolved = frames.iter().filter(|f| f.resolved.is_some()).count();
        StackTraceResult { frames, resolved }
    }

    fn resolve_frame(
        &self,
        reported: &str,
        line: u32,
        function: Option<&str>,
    ) -> Option<ResolvedLocation> {
        let reported_parts = path_components(reported);
        let reported_name = reported_parts.last()?;

        let mut best: Option<(usize, &PathBuf)> = None;
        let mut paths: Vec<&PathBuf> = self.index.files.keys().collect();
        paths.sort();
        for path in paths {
            let candidate_parts = path_components(&path.to_string_lossy());
            if candidate_parts.last() != Some(reported_name) {
                continue;
            }
            let depth = suffix_overlap(&reported_parts, &candidate_parts);
            if best.map_or(true, |(d, _)| depth > d) {
                best = Some((depth, path));
            }
        }
        let (depth, path) = best?;

        let entry = &self.index.files[path.as_path()];
        let enclosing = entry
            .symbols
            .iter()
            .filter(|s| s.start_line <= line && line <= s.end_line)
            .min_by_key(|s| s.end_line - s.start_line);

        let exact = function
            .zip(enclosing)
            .map(|(f, s)| s.name.as_str() == f)
            .unwrap_or(false);
        let confidence = if exact {
            100
        } else {
            (40 + 15 * depth.saturating_sub(1) as u32).min(85)
        };

        Some(ResolvedLocation {
            file: path.clone(),
            line,
            symbol: enclosing.map(|s| s.name.to_string()),
            confidence,
        })
    }
}

type ParsedLine = (&'static str, Option<String>, String, u32);

/// Try each trace format in order; first match wins.
fn parse_line(raw: &str, pending_go_func: &mut Option<String>) -> Option<ParsedLine> {
    if let Some(caps) = PYTHON_RE.captures(raw) {
        return Some((
            "python",
            caps.get(3).map(|m| m.as_str().to_string()),
            caps[1].to_string(),
            caps[2].parse().ok()?,
        ));
    }
    if let Some(caps) = NODE_RE.captures(raw) {
        return Some((
            "node",
            caps.get(1).map(|m| m.as_str().trim().to_string()),
            caps[2].to_string(),
            caps[3].parse().ok()?,
        ));
    }
    if let Some(caps) = RUST_RE.captures(raw) {
        return Some(("rust", None, caps[1].to_string(), caps[2].parse().ok()?));
    }
    if let Some(caps) = GO_FILE_RE.captures(raw) {
        let function = pending_go_func.take().map(|qual| go_function_name(&qual));
        return Some(("go", function, caps[1].to_string(), caps[2].parse().ok()?));
    }
    if let Some(caps) = JAVA_RE.captures(raw) {
        let function = caps[1].rsplit('.').next().map(|s| s.to_string());
        return Some(("java", function, caps[2].to_string(), caps[3].parse().ok()?));
    }

    if let Some(caps) = GO_FUNC_RE.captures(raw) {
        *pending_go_func = Some(caps[1].to_string());
    }
    None
}

/// `main.(*Server).Handle` -> `Handle`
fn go_function_name(qualified: &str) -> String {
    qualified
        .rsplit('.')
        .next()
        .unwrap_or(qualified)
        .trim_matches(|c| c == '(' || c == ')' || c == '*')
        .to_string()
}

fn path_components(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

/// Number of trailing components the two paths share
fn suffix_overlap(a: &[String], b: &[String]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
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

    #[test]
    fn test_python_frame_symbol_match_max_confidence() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("app.py"),
            "def main():\n    raise ValueError(\"boom\")\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.parse_stack_trace(
            "Traceback (most recent call last):\n  File \"app.py\", line 2, in main\n    raise ValueError(\"boom\")\nValueError: boom\n",
        );

        assert_eq!(result.frames.len(), 1);
        let frame = &result.frames[0];
        assert_eq!(frame.format, "python");
        assert_eq!(frame.function.as_deref(), Some("main"));
        let resolved = frame.resolved.as_ref().unwrap();
        assert_eq!(resolved.confidence, 100);
        assert_eq!(resolved.symbol.as_deref(), Some("main"));
    }

    #[test]
    fn test_suffix_depth_disambiguates_same_filename() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("alpha")).unwrap();
        std::fs::create_dir_all(temp.path().join("beta")).unwrap();
        std::fs::write(temp.path().join("alpha/util.py"), "def a():\n    pass\n").unwrap();
        std::fs::write(temp.path().join("beta/util.py"), "def b():\n    pass\n").unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result =
            engine.parse_stack_trace("  File \"/srv/app/beta/util.py\", line 1, in b\n");

        let resolved = result.frames[0].resolved.as_ref().unwrap();
        assert!(resolved.file.ends_with("beta/util.py"));
    }

    #[test]
    fn test_node_frame_with_function() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("src/server.ts"),
            "export function handle(req: Request) {\n    throw new Error(\"bad\");\n}\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.parse_stack_trace(
            "Error: bad\n    at handle (/srv/app/src/server.ts:2:11)\n    at processTicksAndRejections (node:internal/process/task_queues:95:5)\n",
        );

        let frame = &result.frames[0];
        assert_eq!(frame.format, "node");
        assert_eq!(frame.function.as_deref(), Some("handle"));
        assert_eq!(frame.resolved.as_ref().unwrap().confidence, 100);
    }

    #[test]
    fn test_go_two_line_frame() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("job.go"),
            "package main\n\nfunc work() {\n\tpanic(\"boom\")\n}\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine.parse_stack_trace(
            "goroutine 1 [running]:\nmain.work()\n\t/srv/app/job.go:4 +0x19\n",
        );

        let frame = &result.frames[0];
        assert_eq!(frame.format, "go");
        assert_eq!(frame.function.as_deref(), Some("work"));
        assert_eq!(frame.resolved.as_ref().unwrap().confidence, 100);
    }

    #[test]
    fn test_java_frame() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("Main.java"),
            "public class Main {\n    void run() {\n        throw new RuntimeException();\n    }\n}\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result = engine
            .parse_stack_trace("Exception in thread \"main\"\n\tat com.app.Main.run(Main.java:3)\n");

        let frame = &result.frames[0];
        assert_eq!(frame.format, "java");
        assert_eq!(frame.function.as_deref(), Some("run"));
        assert_eq!(frame.resolved.as_ref().unwrap().confidence, 100);
    }

    #[test]
    fn test_rust_panic_line() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("src/main.rs"),
            "fn main() {\n    panic!(\"boom\");\n}\n",
        )
        .unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result =
            engine.parse_stack_trace("thread 'main' panicked at src/main.rs:2:5:\nboom\n");

        let frame = &result.frames[0];
        assert_eq!(frame.format, "rust");
        assert_eq!(frame.reported_file, "src/main.rs");
        let resolved = frame.resolved.as_ref().unwrap();
        assert!(resolved.file.ends_with("src/main.rs"));
        assert_eq!(resolved.symbol.as_deref(), Some("main"));
    }

    #[test]
    fn test_unknown_file_unresolved() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("app.py"), "def main():\n    pass\n").unwrap();

        let index = build(&temp);
        let engine = QueryEngine::new(&index);
        let result =
            engine.parse_stack_trace("  File \"vendor/lib.py\", line 3, in helper\n");

        assert_eq!(result.frames.len(), 1);
        assert!(result.frames[0].resolved.is_none());
        assert_eq!(result.resolved, 0);
    }
}
