use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("deploy descriptor not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("missing field `{field}` in {path}")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("`{field}` in {path} was not updated by the edit")]
    NotApplied { path: PathBuf, field: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
