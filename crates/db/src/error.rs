use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database configuration file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse database configuration: {0}")]
    Parse(String),

    #[error("No database configuration found for environment: {0}")]
    MissingEnvironment(String),

    #[error("No database configuration found for role: {0}")]
    MissingRole(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
