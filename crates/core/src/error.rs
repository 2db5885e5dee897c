use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),
}
