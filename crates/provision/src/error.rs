use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Command not found: {0}")]
    ToolNotFound(String),

    #[error("Terraform init failed: {0}")]
    InitFailed(String),

    #[error("Terraform apply failed: {0}")]
    ApplyFailed(String),

    #[error("Terraform import failed: {0}")]
    ImportFailed(String),

    #[error("Terraform output failed: {0}")]
    OutputFailed(String),

    #[error("Missing {0} in Terraform output")]
    MissingOutput(String),

    #[error("Output {key} is not an IPv4 address: {value}")]
    InvalidAddress { key: String, value: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
