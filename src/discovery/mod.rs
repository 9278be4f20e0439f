//! File discovery
//!
//! Expands a glob pattern into the sorted set of indexable files under a
//! project root. Walks with gitignore semantics, applies the configured
//! ignore patterns, and enforces the depth/count/size bounds so a runaway
//! tree cannot stall a build.
//!
//! @module discovery

use crate::core::config::DiscoveryConfig;
use crate::core::error::{Error, Result};
use glob::Pattern;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Bounds and filters for one discovery pass
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub root: PathBuf,
    pub ignore: Vec<String>,
    pub max_depth: usize,
    pub max_files: usize,
    pub max_file_size: u64,
    pub follow_symlinks: bool,
}

impl DiscoveryOptions {
    pub fn from_config(root: &Path, config: &DiscoveryConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore: config.ignore.clone(),
            max_depth: config.max_depth,
            max_files: config.max_files,
            max_file_size: config.max_file_size,
            follow_symlinks: config.follow_symlinks,
        }
    }
}

/// Walks project files respecting .gitignore
pub struct FileDiscovery {
    opts: DiscoveryOptions,
}

impl FileDiscovery {
    pub fn new(opts: DiscoveryOptions) -> Self {
        Self { opts }
    }

    /// Expand a glob pattern into sorted absolute file paths under the root.
    ///
    /// `**/*` matches everything; patterns are matched against the
    /// root-relative path with `/` separators.
    pub fn expand_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let matcher = Pattern::new(pattern).map_err(|_| Error::InvalidPattern {
            pattern: pattern.to_string(),
        })?;
        let root = self
            .opts
            .root
            .canonicalize()
            .map_err(|_| Error::ProjectNotFound {
                path: self.opts.root.display().to_string(),
            })?;

        let ignore_globs: Vec<Pattern> = self
            .opts
            .ignore
            .iter()
            .filter(|p| p.contains('*') || p.contains('?') || p.contains('['))
            .filter_map(|p| Pattern::new(p).ok())
            .collect();
        let ignore_names: Vec<&str> = self
            .opts
            .ignore
            .iter()
            .map(String::as_str)
            .filter(|p| !p.contains('*') && !p.contains('?') && !p.contains('['))
            .collect();

        let walker = WalkBuilder::new(&root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .follow_links(self.opts.follow_symlinks)
            .max_depth(Some(self.opts.max_depth))
            .build();

        let mut files = Vec::new();
        let mut truncated = false;

        for entry in walker.flatten() {
            let path = entry.path();
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let relative = match path.strip_prefix(&root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if is_ignored(path, &relative, &ignore_names, &ignore_globs) {
                continue;
            }
            if !matcher.matches(&relative) {
                continue;
            }

            if let Ok(meta) = entry.metadata() {
                if meta.len() > self.opts.max_file_size {
                    tracing::debug!("Skipping oversized file: {}", path.display());
                    continue;
                }
            }

            if files.len() >= self.opts.max_files {
                truncated = true;
                break;
            }
            files.push(path.to_path_buf());
        }

        if truncated {
            tracing::warn!(
                "Discovery stopped at {} files (max_files); results are partial",
                self.opts.max_files
            );
        }

        files.sort();
        Ok(files)
    }

    /// Raw file count under the root, gitignore NOT applied. Used to report
    /// how much of the tree a build actually covered.
    pub fn count_files(&self) -> usize {
        walkdir::WalkDir::new(&self.opts.root)
            .max_depth(self.opts.max_depth)
            .follow_links(self.opts.follow_symlinks)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count()
    }
}

/// A path is ignored when any component equals a literal ignore entry, or
/// when its file name or relative path matches an ignore glob.
fn is_ignored(path: &Path, relative: &str, names: &[&str], globs: &[Pattern]) -> bool {
    for component in Path::new(relative).components() {
        if let Some(text) = component.as_os_str().to_str() {
            if names.contains(&text) {
                return true;
            }
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    globs
        .iter()
        .any(|g| g.matches(&file_name) || g.matches(relative))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options(root: &Path) -> DiscoveryOptions {
        DiscoveryOptions::from_config(root, &DiscoveryConfig::default())
    }

    #[test]
    fn test_expand_glob_sorted_absolute() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/b.ts"), "export {}").unwrap();
        std::fs::write(temp.path().join("src/a.ts"), "export {}").unwrap();
        std::fs::write(temp.path().join("readme.md"), "# x").unwrap();

        let files = FileDiscovery::new(options(temp.path()))
            .expand_glob("**/*.ts")
            .unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].is_absolute());
        assert!(files[0].ends_with("src/a.ts"));
        assert!(files[1].ends_with("src/b.ts"));
    }

    #[test]
    fn test_ignore_literal_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("node_modules")).unwrap();
        std::fs::write(temp.path().join("node_modules/dep.js"), "x").unwrap();
        std::fs::write(temp.path().join("app.js"), "x").unwrap();

        let files = FileDiscovery::new(options(temp.path()))
            .expand_glob("**/*.js")
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("app.js"));
    }

    #[test]
    fn test_ignore_glob_pattern() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("bundle.min.js"), "x").unwrap();
        std::fs::write(temp.path().join("app.js"), "x").unwrap();

        let files = FileDiscovery::new(options(temp.path()))
            .expand_glob("**/*.js")
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("app.js"));
    }

    #[test]
    fn test_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let result = FileDiscovery::new(options(temp.path())).expand_glob("[");
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_max_files_truncation() {
        let temp = TempDir::new().unwrap();
        for i in 0..5 {
            std::fs::write(temp.path().join(format!("f{}.py", i)), "x = 1").unwrap();
        }

        let mut opts = options(temp.path());
        opts.max_files = 3;
        let files = FileDiscovery::new(opts).expand_glob("**/*.py").unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_max_file_size() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("big.py"), "x".repeat(64)).unwrap();
        std::fs::write(temp.path().join("small.py"), "x = 1").unwrap();

        let mut opts = options(temp.path());
        opts.max_file_size = 16;
        let files = FileDiscovery::new(opts).expand_glob("**/*.py").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("small.py"));
    }

    #[test]
    fn test_count_files_ignores_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("node_modules")).unwrap();
        std::fs::write(temp.path().join("node_modules/dep.js"), "x").unwrap();
        std::fs::write(temp.path().join("app.js"), "x").unwrap();

        let count = FileDiscovery::new(options(temp.path())).count_files();
        assert_eq!(count, 2);
    }
}
