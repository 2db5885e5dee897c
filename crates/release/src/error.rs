use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Command not found: {0}")]
    ToolNotFound(String),

    #[error("Kamal setup failed: {0}")]
    SetupFailed(String),

    #[error("Kamal details failed: {0}")]
    DetailsFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReleaseError>;
