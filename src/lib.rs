//! Codescope - Multi-language code intelligence
//!
//! Indexes a project tree into symbols, dependency graphs, and call
//! relations, and answers structural queries over them: definitions, usages,
//! call traces, dead code, and refactor impact. Regex-structural parsing,
//! no compilers required.

pub mod adapters;
pub mod cache;
pub mod calls;
pub mod cli;
pub mod core;
pub mod discovery;
pub mod graph;
pub mod index;
pub mod query;

pub use core::config::Config;
pub use core::error::{Error, Result};
pub use index::CodeIndex;
pub use query::QueryEngine;
