//! Termshell — startup error types.

use termshell_core::error::ShellError;
use thiserror::Error;

/// Errors that stop the shell from starting (or shutting down cleanly).
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading a file or the terminal failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The NPC roster is not valid YAML.
    #[error("npc roster error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The storage file is not valid JSON.
    #[error("storage file error: {0}")]
    Json(#[from] serde_json::Error),

    /// A shell component failed while being wired.
    #[error(transparent)]
    Shell(#[from] ShellError),
}
