//! CLI command definitions and dispatch
//!
//! One subcommand per query operation. Every command prints its result
//! object as pretty JSON on stdout; logs go to stderr so output stays
//! pipeable.
//!
//! @module cli

pub mod index;
pub mod query;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const LONG_ABOUT: &str = r#"
Multi-language code intelligence: cross-reference index, call tracing,
dead code and refactor impact analysis. No compilers required.

QUICK START:
    1. codescope index              Index the project (one-time, cached)
    2. codescope find <symbol>      Locate a definition
    3. codescope usages <symbol>    Every reference, grouped by file

CALL ANALYSIS:
    codescope trace <symbol>        Call tree from a function downward
    codescope impact <symbol>       Every call site with recovered arguments
    codescope verify <symbol>       Check call arity against the signature
    codescope plan <symbol> ...     Simulate a signature change

PROJECT ANALYSIS:
    codescope graph <file>          Import dependency tree
    codescope deadcode              Callables nothing references
    codescope stacktrace -f err.txt Map a runtime trace onto the index

EXAMPLES:
    codescope find createUser
    codescope usages handle_request
    codescope graph src/app.py --reverse
    codescope plan foo --add "retries=3" --rename "cb=callback"
    cat panic.txt | codescope stacktrace

All commands read the snapshot written by `codescope index` and fall back
to a fresh in-memory build when it is missing or stale."#;

/// Multi-language code intelligence
#[derive(Parser, Debug)]
#[command(name = "codescope")]
#[command(author, version)]
#[command(about = "Cross-reference index, call tracing, and refactor impact analysis")]
#[command(long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project root (default: detected upward from the current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the index and write the snapshot
    #[command(visible_alias = "i")]
    Index(index::IndexArgs),

    /// Locate a symbol definition
    #[command(visible_alias = "f")]
    Find(SymbolArgs),

    /// Every reference to a symbol, grouped by file
    #[command(visible_alias = "u")]
    Usages(NameArg),

    /// Definition, callers, and callees in one answer
    Context(NameArg),

    /// Summary of a symbol: signature, relations, usage weight
    About(NameArg),

    /// Symbols structurally related to one symbol
    Related(NameArg),

    /// Best-effort combined lookup for an unfamiliar name
    Smart(NameArg),

    /// Import dependency tree for a file
    #[command(visible_alias = "g")]
    Graph(GraphArgs),

    /// Call tree from a symbol downward
    #[command(visible_alias = "t")]
    Trace(TraceArgs),

    /// Callables with no reference anywhere in the project
    #[command(visible_alias = "dead")]
    Deadcode(DeadcodeArgs),

    /// Every call site of a symbol with recovered arguments
    Impact(NameArg),

    /// Check call-site arity against the declared signature
    Verify(NameArg),

    /// Simulate a signature change and suggest call-site edits
    Plan(PlanArgs),

    /// Map a pasted stack trace onto indexed files and symbols
    #[command(visible_alias = "st")]
    Stacktrace(StacktraceArgs),

    /// How much of the project static analysis can see
    Completeness,
}

#[derive(Args, Debug)]
pub struct NameArg {
    /// Symbol name (fuzzy suggestions on miss)
    pub name: String,
}

#[derive(Args, Debug)]
pub struct SymbolArgs {
    /// Symbol name
    pub name: String,

    /// Restrict candidates to files whose path contains this substring
    #[arg(short, long)]
    pub file: Option<String>,
}

#[derive(Args, Debug)]
pub struct GraphArgs {
    /// File path, absolute, root-relative, or unique suffix
    pub file: PathBuf,

    /// Walk importers instead of imports
    #[arg(short, long)]
    pub reverse: bool,

    /// Traversal depth (default from config)
    #[arg(short, long)]
    pub depth: Option<usize>,
}

#[derive(Args, Debug)]
pub struct TraceArgs {
    /// Root symbol name
    pub name: String,

    /// Traversal depth (default from config)
    #[arg(short, long)]
    pub depth: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DeadcodeArgs {
    /// Also report exported symbols with zero internal references
    #[arg(long)]
    pub include_exported: bool,

    /// Also consider symbols defined in test files
    #[arg(long)]
    pub include_tests: bool,
}

#[derive(Args, Debug)]
#[command(after_help = "EXAMPLES:
    codescope plan foo --add \"retries=3\"       Append a defaulted parameter
    codescope plan foo --add \"ctx\"             Append a required parameter
    codescope plan foo --remove old_flag        Drop a parameter
    codescope plan foo --rename \"cb=callback\"  Rename, rewrites keyword args")]
pub struct PlanArgs {
    /// Symbol whose signature changes
    pub name: String,

    /// Add a parameter: NAME or NAME=DEFAULT
    #[arg(long, value_name = "SPEC")]
    pub add: Vec<String>,

    /// Remove a parameter by name
    #[arg(long, value_name = "NAME")]
    pub remove: Vec<String>,

    /// Rename a parameter: FROM=TO
    #[arg(long, value_name = "FROM=TO")]
    pub rename: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StacktraceArgs {
    /// Read the trace from this file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Index(args) => index::run(&args, cli.project.as_deref()),
        command => query::run(command, cli.project.as_deref()),
    }
}
