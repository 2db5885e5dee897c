use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Config(#[from] descriptor::ConfigError),

    #[error(transparent)]
    Provision(#[from] provision::ProvisionError),

    #[error(transparent)]
    Dns(#[from] dns::DnsError),

    #[error(transparent)]
    Release(#[from] release::ReleaseError),
}

impl DeployError {
    /// Whether the operator stopped the run rather than something failing.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Dns(dns::DnsError::Aborted))
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_messages_are_transparent() {
        let err = DeployError::from(provision::ProvisionError::MissingOutput(
            "instance_ip".to_string(),
        ));
        assert_eq!(err.to_string(), "Missing instance_ip in Terraform output");
        assert!(!err.is_aborted());
        assert!(DeployError::from(dns::DnsError::Aborted).is_aborted());
    }
}
