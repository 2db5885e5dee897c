use thiserror::Error;

/// Failure of a single resolver invocation. Never fatal to a run.
#[derive(Debug, Error)]
pub enum DnsQueryError {
    #[error("Command not found: {0}")]
    ToolNotFound(String),

    #[error("DNS query failed: {0}")]
    QueryFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS verification aborted by operator")]
    Aborted,

    #[error("DNS did not converge after {attempts} attempts")]
    ConvergenceTimeout { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DnsError>;
