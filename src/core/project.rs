//! Project detection and management
//!
//! Finds the project root by walking upward toward the filesystem root, and
//! classifies project layout from the marker files found there.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Project root markers in priority order
const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "setup.py",
    "go.mod",
    "pom.xml",
    "build.gradle",
];

/// Project layout detected from root markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectPattern {
    NodeJs,
    Rust,
    Python,
    Go,
    Java,
    Mixed,
    Unknown,
}

impl ProjectPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectPattern::NodeJs => "nodejs",
            ProjectPattern::Rust => "rust",
            ProjectPattern::Python => "python",
            ProjectPattern::Go => "go",
            ProjectPattern::Java => "java",
            ProjectPattern::Mixed => "mixed",
            ProjectPattern::Unknown => "unknown",
        }
    }
}

/// Find project root by searching upward for markers
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    let dir = if start.is_file() {
        start.parent().unwrap_or(start)
    } else {
        start
    };
    let dir = dir.canonicalize().map_err(|_| Error::NoProjectRoot)?;

    dir.ancestors()
        .find(|candidate| PROJECT_MARKERS.iter().any(|m| candidate.join(m).exists()))
        .map(Path::to_path_buf)
        .ok_or(Error::NoProjectRoot)
}

/// Detect the project pattern from manifests at the root.
///
/// More than one language manifest at the same root yields `Mixed`; a bare
/// `.git` directory with no manifest yields `Unknown`.
pub fn detect_project_pattern(root: &Path) -> ProjectPattern {
    let candidates = [
        ("package.json", ProjectPattern::NodeJs),
        ("Cargo.toml", ProjectPattern::Rust),
        ("pyproject.toml", ProjectPattern::Python),
        ("setup.py", ProjectPattern::Python),
        ("go.mod", ProjectPattern::Go),
        ("pom.xml", ProjectPattern::Java),
        ("build.gradle", ProjectPattern::Java),
    ];

    let mut found = None;
    for (marker, pattern) in candidates {
        if root.join(marker).exists() {
            match found {
                None => found = Some(pattern),
                Some(existing) if existing != pattern => return ProjectPattern::Mixed,
                Some(_) => {}
            }
        }
    }

    found.unwrap_or(ProjectPattern::Unknown)
}

/// Whether a path follows the test-file conventions of its language.
///
/// Used to down-rank test symbols in lookups and to exempt test files from
/// dead-code reporting.
pub fn is_test_file(path: &Path, language: &str) -> bool {
    let path_str = path.to_string_lossy().replace('\\', "/");
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    // Directory conventions shared across languages
    if path_str.contains("/tests/")
        || path_str.contains("/test/")
        || path_str.contains("/__tests__/")
        || path_str.starts_with("tests/")
        || path_str.starts_with("test/")
    {
        return true;
    }

    match language {
        "typescript" | "javascript" => {
            file_name.ends_with(".test.ts")
                || file_name.ends_with(".test.tsx")
                || file_name.ends_with(".test.js")
                || file_name.ends_with(".test.jsx")
                || file_name.ends_with(".spec.ts")
                || file_name.ends_with(".spec.tsx")
                || file_name.ends_with(".spec.js")
                || file_name.ends_with(".spec.jsx")
        }
        "python" => {
            file_name.starts_with("test_") && file_name.ends_with(".py")
                || file_name.ends_with("_test.py")
                || file_name == "conftest.py"
        }
        "rust" => file_name == "tests.rs",
        "go" => file_name.ends_with("_test.go"),
        "java" => {
            file_name.ends_with("Test.java")
                || file_name.ends_with("Tests.java")
                || file_name.starts_with("Test") && file_name.ends_with(".java")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_project_root_git() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join(".git");
        std::fs::create_dir(&git_dir).unwrap();

        let nested = temp.path().join("src").join("deep").join("nested");
        std::fs::create_dir_all(&nested).unwrap();

        let root = find_project_root(&nested).unwrap();
        assert_eq!(root, temp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_find_project_root_cargo() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Cargo.toml"), "[package]").unwrap();

        let root = find_project_root(temp.path()).unwrap();
        assert_eq!(root, temp.path().canonicalize().unwrap());
        assert_eq!(detect_project_pattern(&root), ProjectPattern::Rust);
    }

    #[test]
    fn test_no_project_root() {
        let temp = TempDir::new().unwrap();
        let result = find_project_root(temp.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_mixed_pattern() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), "{}").unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example").unwrap();

        assert_eq!(detect_project_pattern(temp.path()), ProjectPattern::Mixed);
    }

    #[test]
    fn test_is_test_file_conventions() {
        assert!(is_test_file(Path::new("src/app.test.ts"), "typescript"));
        assert!(is_test_file(Path::new("pkg/server_test.go"), "go"));
        assert!(is_test_file(Path::new("tests/test_util.py"), "python"));
        assert!(is_test_file(Path::new("src/FooTest.java"), "java"));
        assert!(!is_test_file(Path::new("src/app.ts"), "typescript"));
        assert!(!is_test_file(Path::new("pkg/server.go"), "go"));
    }
}
