//! Query command handlers
//!
//! Opens the index (snapshot first, fresh in-memory build as fallback),
//! runs one engine operation, and prints the result object as pretty JSON.
//!
//! @module cli/query

use super::{Commands, PlanArgs, StacktraceArgs};
use crate::cache;
use crate::core::config::Config;
use crate::core::project::find_project_root;
use crate::index::CodeIndex;
use crate::query::{DeadcodeOptions, GraphDirection, PlanOperation, QueryEngine};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub fn run(command: Commands, project: Option<&Path>) -> anyhow::Result<()> {
    let index = open_index(project)?;
    let engine = QueryEngine::new(&index);

    match command {
        Commands::Find(args) => emit(&engine.find(&args.name, args.file.as_deref())),
        Commands::Usages(args) => emit(&engine.usages(&args.name)),
        Commands::Context(args) => emit(&engine.context(&args.name)),
        Commands::About(args) => emit(&engine.about(&args.name)),
        Commands::Related(args) => emit(&engine.related(&args.name)),
        Commands::Smart(args) => emit(&engine.smart(&args.name)),
        Commands::Graph(args) => {
            let direction = if args.reverse {
                GraphDirection::ImportedBy
            } else {
                GraphDirection::Imports
            };
            match engine.graph(&args.file, direction, args.depth) {
                Some(node) => emit(&node),
                None => anyhow::bail!("file not in index: {}", args.file.display()),
            }
        }
        Commands::Trace(args) => emit(&engine.trace(&args.name, args.depth)),
        Commands::Deadcode(args) => emit(&engine.deadcode(&DeadcodeOptions {
            include_exported: args.include_exported,
            include_tests: args.include_tests,
        })),
        Commands::Impact(args) => emit(&engine.impact(&args.name)),
        Commands::Verify(args) => emit(&engine.verify(&args.name)),
        Commands::Plan(args) => {
            let ops = parse_plan_ops(&args)?;
            emit(&engine.plan(&args.name, &ops))
        }
        Commands::Stacktrace(args) => emit(&engine.parse_stack_trace(&trace_text(&args)?)),
        Commands::Completeness => emit(engine.completeness()),
        Commands::Index(_) => unreachable!("index is dispatched in cli::run"),
    }
}

/// Resolve the project root from `--project` or the current directory.
pub(crate) fn project_root(project: Option<&Path>) -> anyhow::Result<PathBuf> {
    let start = match project {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    Ok(find_project_root(&start)?)
}

/// Snapshot if present and valid for this root, otherwise a fresh
/// in-memory build. Query commands never write the snapshot back.
fn open_index(project: Option<&Path>) -> anyhow::Result<CodeIndex> {
    let root = project_root(project)?;
    let root = root.canonicalize().unwrap_or(root);
    let config = Config::load(&root);
    let snapshot = cache::default_path(&root);

    if snapshot.exists() {
        match cache::load(&snapshot, config.clone()) {
            Ok(index) if index.root == root => return Ok(index),
            Ok(_) => warn!("snapshot was written for a different root, rebuilding"),
            Err(e) => warn!(error = %e, "snapshot rejected, rebuilding"),
        }
    }

    let mut index = CodeIndex::new(&root, config);
    index.build("**/*", true)?;
    Ok(index)
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_plan_ops(args: &PlanArgs) -> anyhow::Result<Vec<PlanOperation>> {
    let mut ops = Vec::new();
    for spec in &args.add {
        let (name, default) = match spec.split_once('=') {
            Some((name, default)) => (name.trim().to_string(), Some(default.trim().to_string())),
            None => (spec.trim().to_string(), None),
        };
        ops.push(PlanOperation::AddParam { name, default });
    }
    for name in &args.remove {
        ops.push(PlanOperation::RemoveParam {
            name: name.trim().to_string(),
        });
    }
    for spec in &args.rename {
        let (from, to) = spec
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--rename expects FROM=TO, got {spec:?}"))?;
        ops.push(PlanOperation::RenameParam {
            from: from.trim().to_string(),
            to: to.trim().to_string(),
        });
    }
    Ok(ops)
}

fn trace_text(args: &StacktraceArgs) -> anyhow::Result<String> {
    match &args.file {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => Ok(std::io::read_to_string(std::io::stdin())?),
    }
}
