//! Error types for Codescope

use thiserror::Error;

/// Result type alias using Codescope's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Codescope error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Project not found: {path}")]
    ProjectNotFound { path: String },

    #[error("No project root found (looked for .git, package.json, Cargo.toml, etc.)")]
    NoProjectRoot,

    #[error("Invalid glob pattern: {pattern}")]
    InvalidPattern { pattern: String },

    #[error("Cache rejected: {reason}")]
    CacheRejected { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
