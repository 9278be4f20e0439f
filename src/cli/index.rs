//! Index command
//!
//! @module cli/index

use crate::cache;
use crate::core::config::Config;
use crate::core::project::find_project_root;
use crate::index::CodeIndex;
use clap::Args;
use std::path::Path;
use tracing::info;

#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:
    codescope index                 Index the detected project root
    codescope index -p ~/code/app   Index a specific directory
    codescope index \"src/**/*.py\"   Restrict to a glob
    codescope index --force         Discard the snapshot and rebuild")]
pub struct IndexArgs {
    /// Glob restricting which files are indexed
    #[arg(default_value = "**/*")]
    pub pattern: String,

    /// Discard any existing snapshot and rebuild from scratch
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: &IndexArgs, project: Option<&Path>) -> anyhow::Result<()> {
    let root = super::query::project_root(project)?;
    let config = Config::load(&root);
    let snapshot = cache::default_path(&root);

    let mut index = if args.force {
        CodeIndex::new(&root, config)
    } else {
        match cache::load(&snapshot, config.clone()) {
            Ok(index) => index,
            Err(_) => CodeIndex::new(&root, config),
        }
    };

    let stats = index.build(&args.pattern, args.force)?;
    cache::save(&index, &snapshot)?;
    info!(indexed = stats.indexed, unchanged = stats.unchanged, "index built");

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
