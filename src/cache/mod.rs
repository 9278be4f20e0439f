//! Index snapshot persistence
//!
//! Saves the indexed state as one JSON snapshot and restores it wholesale.
//! Validation is all-or-nothing: a format-version or tool-version mismatch,
//! or any malformed field, rejects the entire snapshot and the caller
//! rebuilds from source. Writes go through a temp file in the target
//! directory followed by a rename, so a crash mid-write never leaves a
//! truncated snapshot behind.
//!
//! @module cache

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::graph::ProjectGraphs;
use crate::index::{CachedCalls, CodeIndex, FileEntry, SymbolTable};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bumped whenever the snapshot layout changes incompatibly
pub const SNAPSHOT_VERSION: u32 = 3;

const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// On-disk form of a [`CodeIndex`].
///
/// File entries and call caches are stored as sorted pairs so snapshots of
/// the same index are byte-identical. The symbol table is not stored; it is
/// derived from the file entries on load. Source text is never persisted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Snapshot {
    version: u32,
    tool_version: String,
    root: PathBuf,
    /// RFC 3339, informational only
    timestamp: String,
    files: Vec<(PathBuf, FileEntry)>,
    graphs: ProjectGraphs,
    calls: Vec<(PathBuf, CachedCalls)>,
}

// =============================================================================
// SAVE / LOAD
// =============================================================================

/// Write `index` to `path` as a JSON snapshot, atomically.
pub fn save(index: &CodeIndex, path: &Path) -> Result<()> {
    let mut files: Vec<(PathBuf, FileEntry)> = index
        .files
        .iter()
        .map(|(p, e)| (p.clone(), e.clone()))
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut calls: Vec<(PathBuf, CachedCalls)> = index
        .calls_cache
        .read()
        .iter()
        .map(|(p, c)| (p.clone(), c.clone()))
        .collect();
    calls.sort_by(|a, b| a.0.cmp(&b.0));

    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        tool_version: TOOL_VERSION.to_string(),
        root: index.root.clone(),
        timestamp: Utc::now().to_rfc3339(),
        files,
        graphs: index.graphs.clone(),
        calls,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path(path);
    let json = serde_json::to_string(&snapshot)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;

    info!(
        path = %path.display(),
        files = snapshot.files.len(),
        "saved index snapshot"
    );
    Ok(())
}

/// Restore a [`CodeIndex`] from a snapshot at `path`.
///
/// Any validation failure returns [`Error::CacheRejected`]; the caller is
/// expected to fall back to a fresh build.
pub fn load(path: &Path, config: Config) -> Result<CodeIndex> {
    let raw = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| Error::CacheRejected {
        reason: format!("malformed snapshot: {e}"),
    })?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(Error::CacheRejected {
            reason: format!(
                "snapshot version {} does not match expected {}",
                snapshot.version, SNAPSHOT_VERSION
            ),
        });
    }
    if snapshot.tool_version != TOOL_VERSION {
        return Err(Error::CacheRejected {
            reason: format!(
                "snapshot written by version {}, running {}",
                snapshot.tool_version, TOOL_VERSION
            ),
        });
    }

    let mut symbols = SymbolTable::new();
    let mut files = HashMap::with_capacity(snapshot.files.len());
    for (file_path, entry) in snapshot.files {
        for symbol in &entry.symbols {
            symbols.insert(symbol.clone());
        }
        files.insert(file_path, entry);
    }

    let calls: HashMap<PathBuf, CachedCalls> = snapshot.calls.into_iter().collect();
    debug!(
        files = files.len(),
        symbols = symbols.symbol_count(),
        "restored index snapshot"
    );

    Ok(CodeIndex {
        root: snapshot.root,
        config,
        files,
        symbols,
        graphs: snapshot.graphs,
        calls_cache: RwLock::new(calls),
    })
}

/// Default snapshot location for a project root
pub fn default_path(root: &Path) -> PathBuf {
    root.join(".codescope").join("index.json")
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build(temp: &TempDir) -> CodeIndex {
        std::fs::write(temp.path().join("a.py"), "import b\n\ndef top():\n    pass\n").unwrap();
        std::fs::write(temp.path().join("b.py"), "def leaf():\n    pass\n").unwrap();
        let mut index = CodeIndex::new(temp.path(), Config::default());
        index.build("**/*", true).unwrap();
        index
    }

    #[test]
    fn test_round_trip_restores_state() {
        let temp = TempDir::new().unwrap();
        let index = build(&temp);
        let snapshot_path = temp.path().join("cache").join("index.json");

        save(&index, &snapshot_path).unwrap();
        let restored = load(&snapshot_path, Config::default()).unwrap();

        assert_eq!(restored.root, index.root);
        assert_eq!(restored.files.len(), index.files.len());
        assert!(!restored.symbols.get("top").is_empty());
        assert!(!restored.symbols.get("leaf").is_empty());

        let a = index.root.join("a.py");
        assert_eq!(restored.graphs.imports_of(&a), index.graphs.imports_of(&a));
    }

    #[test]
    fn test_round_trip_keeps_call_cache() {
        let temp = TempDir::new().unwrap();
        let index = build(&temp);
        let a = index.root.join("a.py");
        index.calls_cache.write().insert(
            a.clone(),
            CachedCalls {
                mtime: 1,
                hash: 2,
                calls: Vec::new(),
            },
        );
        let snapshot_path = temp.path().join("index.json");

        save(&index, &snapshot_path).unwrap();
        let restored = load(&snapshot_path, Config::default()).unwrap();

        let cache = restored.calls_cache.read();
        assert_eq!(cache.get(&a).map(|c| (c.mtime, c.hash)), Some((1, 2)));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let index = build(&temp);
        let snapshot_path = temp.path().join("index.json");
        save(&index, &snapshot_path).unwrap();

        let raw = std::fs::read_to_string(&snapshot_path).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["version"] = serde_json::json!(SNAPSHOT_VERSION + 1);
        std::fs::write(&snapshot_path, value.to_string()).unwrap();

        let err = load(&snapshot_path, Config::default()).unwrap_err();
        assert!(matches!(err, Error::CacheRejected { .. }));
    }

    #[test]
    fn test_tool_version_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let index = build(&temp);
        let snapshot_path = temp.path().join("index.json");
        save(&index, &snapshot_path).unwrap();

        let raw = std::fs::read_to_string(&snapshot_path).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        value["tool_version"] = serde_json::json!("0.0.0-other");
        std::fs::write(&snapshot_path, value.to_string()).unwrap();

        let err = load(&snapshot_path, Config::default()).unwrap_err();
        assert!(matches!(err, Error::CacheRejected { .. }));
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let temp = TempDir::new().unwrap();
        let snapshot_path = temp.path().join("index.json");
        std::fs::write(&snapshot_path, "{\"version\": 3, \"files\": 7}").unwrap();

        let err = load(&snapshot_path, Config::default()).unwrap_err();
        assert!(matches!(err, Error::CacheRejected { .. }));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let index = build(&temp);
        let snapshot_path = temp.path().join("index.json");
        save(&index, &snapshot_path).unwrap();

        assert!(snapshot_path.exists());
        assert!(!temp.path().join(".index.json.tmp").exists());
    }
}
