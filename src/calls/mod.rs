//! Call-site resolution
//!
//! Answers "who calls X" and "what does X call". Call extraction is cached
//! per file keyed by mtime and content hash: an mtime match trusts the
//! entry, an mtime mismatch rehashes, a hash match refreshes the mtime and
//! keeps the calls, and only a hash mismatch re-extracts. Method calls go
//! through the per-language attribution policy in [`policy`].
//!
//! @module calls

pub mod policy;

use crate::adapters::{adapter_for, CallRecord, EnclosingFn};
use crate::index::{mtime_millis, CachedCalls, CodeIndex, FileEntry, Symbol};
use policy::{classify_call, CallTarget};
use serde::Serialize;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

// =============================================================================
// RESULT TYPES
// =============================================================================

/// One call site referring to the queried symbol
#[derive(Debug, Clone, Serialize)]
pub struct CallerHit {
    pub file: PathBuf,
    pub line: u32,
    /// Function containing the call site; None for module-level code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing: Option<EnclosingFn>,
    #[serde(default)]
    pub uncertain: bool,
}

/// One resolved callee of the queried symbol
#[derive(Debug, Clone, Serialize)]
pub struct CalleeHit {
    pub symbol: Symbol,
    pub call_line: u32,
    #[serde(default)]
    pub uncertain: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallersResult {
    pub hits: Vec<CallerHit>,
    /// Calls ambiguous among several local bindings
    pub uncertain: usize,
    /// Receiver-qualified calls excluded by policy
    pub excluded: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CalleesResult {
    pub hits: Vec<CalleeHit>,
    pub uncertain: usize,
    pub excluded: usize,
}

/// Bucket a symbol by how often it is called
pub fn weight_label(count: usize) -> &'static str {
    if count >= 10 {
        "core"
    } else if count >= 3 {
        "regular"
    } else if count == 1 {
        "utility"
    } else {
        "normal"
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves call sites against the index, populating the call cache
pub struct CallSiteResolver<'a> {
    index: &'a CodeIndex,
}

impl<'a> CallSiteResolver<'a> {
    pub fn new(index: &'a CodeIndex) -> Self {
        Self { index }
    }

    /// Call records for one file, from cache when still valid. An
    /// unreadable file contributes nothing.
    pub fn cached_calls(&self, path: &Path) -> Vec<CallRecord> {
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(_) => return Vec::new(),
        };
        let mtime = mtime_millis(&meta);

        {
            let cache = self.index.calls_cache.read();
            if let Some(entry) = cache.get(path) {
                if entry.mtime == mtime {
                    return entry.calls.clone();
                }
            }
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        let hash = xxh3_64(content.as_bytes());

        {
            let mut cache = self.index.calls_cache.write();
            if let Some(entry) = cache.get_mut(path) {
                if entry.hash == hash {
                    entry.mtime = mtime;
                    return entry.calls.clone();
                }
            }
        }

        let calls = self.extract(path, &content);
        self.index.calls_cache.write().insert(
            path.to_path_buf(),
            CachedCalls {
                mtime,
                hash,
                calls: calls.clone(),
            },
        );
        calls
    }

    /// Extract calls and bind each against the file's local bindings:
    /// exactly one match binds, several mark the call uncertain, none
    /// leaves it external for name-level resolution.
    fn extract(&self, path: &Path, content: &str) -> Vec<CallRecord> {
        let entry = match self.index.files.get(path) {
            Some(entry) => entry,
            None => return Vec::new(),
        };
        let adapter = match adapter_for(&entry.language) {
            Some(adapter) => adapter,
            None => return Vec::new(),
        };

        let mut calls = adapter.find_calls(content);
        for call in &mut calls {
            if call.binding_id.is_some() {
                continue;
            }
            let mut matches = entry.bindings.iter().filter(|b| b.name.as_str() == call.name);
            match (matches.next(), matches.next()) {
                (Some(only), None) => call.binding_id = Some(only.id.clone()),
                (Some(_), Some(_)) => call.uncertain = true,
                _ => {}
            }
        }
        calls
    }

    /// All call sites across the project that resolve to `symbol`
    pub fn callers_of(&self, symbol: &Symbol) -> CallersResult {
        let approximate = self.index.config.resolve.approximate_bindings;
        let mut result = CallersResult::default();

        let mut paths: Vec<&PathBuf> = self.index.files.keys().collect();
        paths.sort();

        for path in paths {
            let entry = &self.index.files[path.as_path()];
            for call in self.cached_calls(path) {
                if call.name != symbol.name.as_str() {
                    continue;
                }
                // Ignore the occurrence at the definition itself
                if entry.path == symbol.file && call.line == symbol.start_line {
                    continue;
                }

                let enclosing_symbol = call
                    .enclosing
                    .as_ref()
                    .and_then(|enc| find_enclosing(entry, enc));
                let enclosing_class = enclosing_symbol.and_then(|s| s.class_name.as_deref());
                let attrs = class_attributes(entry, enclosing_class);

                let target = classify_call(
                    &entry.language,
                    &call,
                    enclosing_class,
                    attrs,
                    self.index.config.resolve.include_receiver_calls,
                );

                let matched = match target {
                    CallTarget::Excluded => {
                        result.excluded += 1;
                        continue;
                    }
                    CallTarget::EnclosingClass => {
                        if symbol.class_name.as_deref() == enclosing_class {
                            true
                        } else {
                            // An implicit call with no such method in the
                            // class falls back to plain name matching.
                            call.receiver.is_none()
                                && !class_has_method(entry, enclosing_class, &call.name)
                                && self.name_level_match(entry, &call, symbol, approximate, &mut result.uncertain)
                        }
                    }
                    CallTarget::AttributeType(ty) => symbol.class_name.as_deref() == Some(ty.as_str()),
                    CallTarget::ByName => {
                        self.name_level_match(entry, &call, symbol, approximate, &mut result.uncertain)
                    }
                };

                if matched {
                    result.hits.push(CallerHit {
                        file: entry.path.clone(),
                        line: call.line,
                        enclosing: call.enclosing.clone(),
                        uncertain: call.uncertain && !approximate,
                    });
                }
            }
        }

        result
    }

    /// Whether a name-resolved call refers to `symbol`. Bound calls must
    /// match the binding id; unbound calls match by name across files;
    /// ambiguous calls are counted and only included when approximate
    /// inclusion is on.
    fn name_level_match(
        &self,
        entry: &FileEntry,
        call: &CallRecord,
        symbol: &Symbol,
        approximate: bool,
        uncertain: &mut usize,
    ) -> bool {
        if let Some(id) = &call.binding_id {
            return entry.path == symbol.file && *id == symbol.binding_id;
        }
        if call.uncertain {
            *uncertain += 1;
            return approximate && entry.path == symbol.file;
        }
        // No local binding: external reference, resolved by name
        entry.path != symbol.file
    }

    /// Everything `symbol` calls, resolved through the attribution policy
    pub fn callees_of(&self, symbol: &Symbol) -> CalleesResult {
        let approximate = self.index.config.resolve.approximate_bindings;
        let mut result = CalleesResult::default();
        let entry = match self.index.files.get(&symbol.file) {
            Some(entry) => entry,
            None => return result,
        };

        let attrs = class_attributes(entry, symbol.class_name.as_deref());

        for call in self.cached_calls(&symbol.file) {
            if !call_belongs_to(&call, symbol) {
                continue;
            }

            // An overloaded self-call targets every same-name sibling
            // rather than an arbitrary pick.
            if call.name == symbol.name.as_str() {
                for binding in entry.bindings.iter().filter(|b| b.name.as_str() == call.name) {
                    if let Some(target) = symbol_by_binding(entry, &binding.id) {
                        result.hits.push(CalleeHit {
                            symbol: target.clone(),
                            call_line: call.line,
                            uncertain: false,
                        });
                    }
                }
                continue;
            }

            let target = classify_call(
                &entry.language,
                &call,
                symbol.class_name.as_deref(),
                attrs,
                self.index.config.resolve.include_receiver_calls,
            );

            match target {
                CallTarget::Excluded => result.excluded += 1,
                CallTarget::EnclosingClass => {
                    let class = symbol.class_name.as_deref();
                    let mut found = false;
                    for target in entry.symbols.iter().filter(|s| {
                        s.name.as_str() == call.name && s.class_name.as_deref() == class
                    }) {
                        found = true;
                        result.hits.push(CalleeHit {
                            symbol: target.clone(),
                            call_line: call.line,
                            uncertain: false,
                        });
                    }
                    if !found && call.receiver.is_none() {
                        self.push_name_level(entry, &call, approximate, &mut result);
                    }
                }
                CallTarget::AttributeType(ty) => {
                    for target in self.index.symbols.get(&call.name).iter().filter(|s| {
                        s.class_name.as_deref() == Some(ty.as_str())
                    }) {
                        result.hits.push(CalleeHit {
                            symbol: target.clone(),
                            call_line: call.line,
                            uncertain: false,
                        });
                    }
                }
                CallTarget::ByName => {
                    self.push_name_level(entry, &call, approximate, &mut result);
                }
            }
        }

        result.hits.sort_by(|a, b| {
            (a.call_line, a.symbol.name.as_str()).cmp(&(b.call_line, b.symbol.name.as_str()))
        });
        result
    }

    fn push_name_level(
        &self,
        entry: &FileEntry,
        call: &CallRecord,
        approximate: bool,
        result: &mut CalleesResult,
    ) {
        if let Some(id) = &call.binding_id {
            if let Some(target) = symbol_by_binding(entry, id) {
                result.hits.push(CalleeHit {
                    symbol: target.clone(),
                    call_line: call.line,
                    uncertain: false,
                });
            }
            return;
        }
        if call.uncertain {
            if approximate {
                for binding in entry.bindings.iter().filter(|b| b.name.as_str() == call.name) {
                    if let Some(target) = symbol_by_binding(entry, &binding.id) {
                        result.hits.push(CalleeHit {
                            symbol: target.clone(),
                            call_line: call.line,
                            uncertain: true,
                        });
                    }
                }
            } else {
                result.uncertain += 1;
            }
            return;
        }

        // External: resolve by name at the symbol-table level
        let candidates = self.index.symbols.get(&call.name);
        let ambiguous = candidates.len() > 1;
        for target in candidates {
            if target.file == entry.path {
                continue;
            }
            result.hits.push(CalleeHit {
                symbol: target.clone(),
                call_line: call.line,
                uncertain: ambiguous,
            });
        }
    }

    /// Project-wide call-site count for a name, for weighting
    pub fn call_count(&self, name: &str) -> usize {
        self.index
            .files
            .keys()
            .map(|path| {
                self.cached_calls(path)
                    .iter()
                    .filter(|c| c.name == name)
                    .count()
            })
            .sum()
    }
}

// =============================================================================
// LOOKUP HELPERS
// =============================================================================

fn find_enclosing<'b>(entry: &'b FileEntry, enc: &EnclosingFn) -> Option<&'b Symbol> {
    entry
        .symbols
        .iter()
        .find(|s| s.start_line == enc.start_line && s.name.as_str() == enc.name)
}

fn symbol_by_binding<'b>(entry: &'b FileEntry, id: &str) -> Option<&'b Symbol> {
    entry.symbols.iter().find(|s| s.binding_id == id)
}

fn class_attributes<'b>(entry: &'b FileEntry, class: Option<&str>) -> &'b [(String, String)] {
    class
        .and_then(|name| {
            entry
                .symbols
                .iter()
                .find(|s| s.kind.is_type_like() && s.name.as_str() == name)
        })
        .map(|s| s.attribute_types.as_slice())
        .unwrap_or(&[])
}

fn class_has_method(entry: &FileEntry, class: Option<&str>, name: &str) -> bool {
    entry
        .symbols
        .iter()
        .any(|s| s.name.as_str() == name && s.class_name.as_deref() == class)
}

/// A call belongs to a callable via its enclosing span; container symbols
/// own everything in their line range instead.
fn call_belongs_to(call: &CallRecord, symbol: &Symbol) -> bool {
    if symbol.kind.is_callable() {
        call.enclosing
            .as_ref()
            .map(|enc| enc.name == symbol.name.as_str() && enc.start_line == symbol.start_line)
            .unwrap_or(false)
    } else {
        call.line >= symbol.start_line && call.line <= symbol.end_line
    }
}

// =============================================================================
// TESTS
// =============================================================================
