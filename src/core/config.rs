//! Configuration management
//!
//! Loads `codescope.toml` from the project root. Every field has a default;
//! a malformed or missing config never aborts indexing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Name of the per-project configuration file
pub const CONFIG_FILE: &str = "codescope.toml";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub resolve: ResolveConfig,
    pub traversal: TraversalConfig,
    pub imports: ImportsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory/file patterns excluded from indexing
    pub ignore: Vec<String>,
    /// Maximum directory depth during discovery
    pub max_depth: usize,
    /// Maximum number of files per build
    pub max_files: usize,
    /// Maximum file size to index (bytes)
    pub max_file_size: u64,
    /// Follow symbolic links during discovery
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Include receiver-qualified method calls (`obj.method()`) for languages
    /// where the receiver type is untracked. Off by default to avoid false
    /// positives from generic method names.
    pub include_receiver_calls: bool,
    /// When a call name matches several local bindings, include all of them
    /// instead of marking the call uncertain.
    pub approximate_bindings: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Maximum depth for dependency-graph and call-tree walks
    pub max_depth: usize,
    /// Maximum children expanded per node in a call tree
    pub max_children: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportsConfig {
    /// Alias substitutions applied to import strings before resolution,
    /// e.g. "@app/" -> "src/"
    pub aliases: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            resolve: ResolveConfig::default(),
            traversal: TraversalConfig::default(),
            imports: ImportsConfig::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ignore: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
                "build".to_string(),
                "target".to_string(),
                "__pycache__".to_string(),
                "*.min.js".to_string(),
                "*.map".to_string(),
            ],
            max_depth: 25,
            max_files: 50_000,
            max_file_size: 1_048_576, // 1MB
            follow_symlinks: false,
        }
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            include_receiver_calls: false,
            approximate_bindings: false,
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_children: 25,
        }
    }
}

impl Default for ImportsConfig {
    fn default() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from `codescope.toml` under the given root.
    ///
    /// Missing file or malformed content falls back to defaults; a bad
    /// config must never block indexing.
    pub fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Malformed {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path());
        assert!(!config.resolve.include_receiver_calls);
        assert_eq!(config.traversal.max_depth, 5);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            "[traversal]\nmax_depth = 9\n",
        )
        .unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.traversal.max_depth, 9);
        assert_eq!(config.traversal.max_children, 25);
        assert!(!config.discovery.ignore.is_empty());
    }

    #[test]
    fn test_malformed_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "not [valid toml").unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.traversal.max_depth, 5);
    }

    #[test]
    fn test_alias_table() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            "[imports.aliases]\n\"@app/\" = \"src/\"\n",
        )
        .unwrap();

        let config = Config::load(temp.path());
        assert_eq!(
            config.imports.aliases.get("@app/").map(String::as_str),
            Some("src/")
        );
    }
}
