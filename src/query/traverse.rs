//! Graph and call-tree traversal
//!
//! Bounded-depth walks over the import graph and the call graph. Repeats
//! are never silently dropped: a node already on the current path is marked
//! circular and stops the walk, a node shown elsewhere is marked as such so
//! diamond dependencies keep a single expanded subtree.
//!
//! @module query/traverse

use super::{Lookup, QueryEngine};
use crate::index::Symbol;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Which edge set a dependency walk follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphDirection {
    /// Files this file imports
    Imports,
    /// Files importing this file
    ImportedBy,
}

impl GraphDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::ImportedBy => "imported-by",
        }
    }
}

/// Why a node's subtree was or was not expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Expanded,
    /// Repeat of a node on the current path
    Circular,
    /// Expanded somewhere else in this walk
    AlreadyShown,
}

/// One file in a dependency-graph walk
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub file: String,
    pub status: NodeStatus,
    pub children: Vec<GraphNode>,
}

/// One callable in a call-tree trace
#[derive(Debug, Clone, Serialize)]
pub struct TraceNode {
    pub name: String,
    pub file: String,
    pub line: u32,
    /// Call site in the parent, absent on the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_line: Option<u32>,
    pub status: NodeStatus,
    #[serde(default)]
    pub uncertain: bool,
    /// Children beyond the per-node bound, reported rather than hidden
    pub truncated: usize,
    pub children: Vec<TraceNode>,
}

impl<'a> QueryEngine<'a> {
    /// Dependency tree for one file, `depth` levels deep. None when the
    /// file is not in the index.
    pub fn graph(
        &self,
        file: &Path,
        direction: GraphDirection,
        depth: Option<usize>,
    ) -> Option<GraphNode> {
        let path = self.resolve_file(file)?;
        let depth = depth.unwrap_or(self.index.config.traversal.max_depth);
        let mut on_path = Vec::new();
        let mut shown = HashSet::new();
        Some(self.walk_graph(&path, direction, depth, &mut on_path, &mut shown))
    }

    fn walk_graph(
        &self,
        path: &PathBuf,
        direction: GraphDirection,
        depth: usize,
        on_path: &mut Vec<PathBuf>,
        shown: &mut HashSet<PathBuf>,
    ) -> GraphNode {
        let file = self.index.relative_path(path);
        if on_path.contains(path) {
            return GraphNode {
                file,
                status: NodeStatus::Circular,
                children: Vec::new(),
            };
        }
        if !shown.insert(path.clone()) {
            return GraphNode {
                file,
                status: NodeStatus::AlreadyShown,
                children: Vec::new(),
            };
        }
        if depth == 0 {
            return GraphNode {
                file,
                status: NodeStatus::Expanded,
                children: Vec::new(),
            };
        }

        let edges = match direction {
            GraphDirection::Imports => self.index.graphs.imports_of(path),
            GraphDirection::ImportedBy => self.index.graphs.importers_of(path),
        };

        on_path.push(path.clone());
        let children = edges
            .iter()
            .map(|next| self.walk_graph(next, direction, depth - 1, on_path, shown))
            .collect();
        on_path.pop();

        GraphNode {
            file,
            status: NodeStatus::Expanded,
            children,
        }
    }

    /// Call tree rooted at `name`, expanded through the call-site resolver.
    pub fn trace(&self, name: &str, depth: Option<usize>) -> Lookup<TraceNode> {
        let resolution = match self.resolve_symbol(name, None) {
            Lookup::Found(resolution) => resolution,
            Lookup::NotFound { name, suggestions } => {
                return Lookup::NotFound { name, suggestions }
            }
        };
        let depth = depth.unwrap_or(self.index.config.traversal.max_depth);
        let mut visited = HashSet::new();
        Lookup::Found(self.expand_trace(&resolution.symbol, None, false, depth, &mut visited))
    }

    fn expand_trace(
        &self,
        symbol: &Symbol,
        call_line: Option<u32>,
        uncertain: bool,
        depth: usize,
        visited: &mut HashSet<(PathBuf, u32)>,
    ) -> TraceNode {
        let mut node = TraceNode {
            name: symbol.name.to_string(),
            file: self.index.relative_path(&symbol.file),
            line: symbol.start_line,
            call_line,
            status: NodeStatus::Expanded,
            uncertain,
            truncated: 0,
            children: Vec::new(),
        };

        if !visited.insert((symbol.file.clone(), symbol.start_line)) {
            node.status = NodeStatus::AlreadyShown;
            return node;
        }
        if depth == 0 {
            return node;
        }

        let callees = self.resolver.callees_of(symbol);
        let bound = self.index.config.traversal.max_children;
        node.truncated = callees.hits.len().saturating_sub(bound);
        node.children = callees
            .hits
            .iter()
            .take(bound)
            .map(|hit| {
                self.expand_trace(
                    &hit.symbol,
                    Some(hit.call_line),
                    hit.uncertain,
                    depth - 1,
                    visited,
                )
            })
            .collect();
        node
    }

    /// Map a user-supplied path onto an indexed file: exact, root-relative,
    /// then unique suffix match.
    pub(crate) fn resolve_file(&self, file: &Path) -> Option<PathBuf> {
        if self.index.files.contains_key(file) {
            return Some(file.to_path_buf());
        }
        let joined = self.index.root.join(file);
        if self.index.files.contains_key(&joined) {
            return Some(joined);
        }
        let needle = file.to_string_lossy();
        let mut matches: Vec<&PathBuf> = self
            .index
            .files
            .keys()
            .filter(|p| self.index.relative_path(p).ends_with(needle.as_ref()))
            .collect();
        matches.sort();
        matches.first().map(|p| (*p).clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================
