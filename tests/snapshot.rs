//! Snapshot persistence through the public API
//!
//! Covers the full lifecycle: build, save, load, query equivalence,
//! incremental rebuild on top of a restored index, and wholesale rejection
//! of a snapshot the running version cannot trust.

use codescope::{cache, CodeIndex, Config, Error, QueryEngine};
use tempfile::TempDir;

fn fixture() -> (TempDir, CodeIndex) {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("store.py"),
        "def put(key, value):\n    return (key, value)\n",
    )
    .unwrap();
    std::fs::write(
        temp.path().join("api.py"),
        "from store import put\n\ndef save(item):\n    put(\"latest\", item)\n",
    )
    .unwrap();

    let mut index = CodeIndex::new(temp.path(), Config::default());
    index.build("**/*", true).unwrap();
    (temp, index)
}

#[test]
fn test_restored_index_answers_like_the_original() {
    let (temp, index) = fixture();
    let path = temp.path().join(".codescope").join("index.json");
    cache::save(&index, &path).unwrap();

    let restored = cache::load(&path, Config::default()).unwrap();
    let before = QueryEngine::new(&index);
    let after = QueryEngine::new(&restored);

    let a = before.find("put", None).found().unwrap();
    let b = after.find("put", None).found().unwrap();
    assert_eq!(a.symbol.file, b.symbol.file);
    assert_eq!(a.symbol.start_line, b.symbol.start_line);

    assert_eq!(
        before.usages("put").total,
        after.usages("put").total
    );

    let callers = after.context("put").found().unwrap().callers;
    assert_eq!(callers.hits.len(), 1);
    assert!(callers.hits[0].file.ends_with("api.py"));
}

#[test]
fn test_snapshot_never_contains_source_text() {
    let (temp, index) = fixture();
    let path = temp.path().join("index.json");
    cache::save(&index, &path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("latest"), "call-site text leaked into snapshot");
}

#[test]
fn test_incremental_build_on_restored_index() {
    let (temp, index) = fixture();
    let path = temp.path().join("index.json");
    cache::save(&index, &path).unwrap();

    std::fs::write(
        temp.path().join("store.py"),
        "def put(key, value):\n    return (key, value)\n\ndef drop(key):\n    return key\n",
    )
    .unwrap();

    let mut restored = cache::load(&path, Config::default()).unwrap();
    let stats = restored.build("**/*", false).unwrap();
    assert_eq!(stats.indexed, 1);
    assert_eq!(stats.unchanged, 1);

    let engine = QueryEngine::new(&restored);
    assert!(engine.find("drop", None).found().is_some());
    assert!(engine.find("put", None).found().is_some());
}

#[test]
fn test_foreign_snapshot_rejected_wholesale() {
    let (temp, index) = fixture();
    let path = temp.path().join("index.json");
    cache::save(&index, &path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    value["tool_version"] = serde_json::json!("99.0.0");
    std::fs::write(&path, value.to_string()).unwrap();

    let err = cache::load(&path, Config::default()).unwrap_err();
    assert!(matches!(err, Error::CacheRejected { .. }));
}
