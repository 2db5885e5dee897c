/// Phases of a deployment run, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub enum DeployPhase {
    #[default]
    Loaded,
    Provisioned,
    ConfigUpdated,
    DnsConverged,
    Released,
    Restored,
}

impl DeployPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Provisioned => "provisioned",
            Self::ConfigUpdated => "config_updated",
            Self::DnsConverged => "dns_converged",
            Self::Released => "released",
            Self::Restored => "restored",
        }
    }
}

impl std::fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(DeployPhase::Loaded.as_str(), "loaded");
        assert_eq!(DeployPhase::ConfigUpdated.as_str(), "config_updated");
        assert_eq!(DeployPhase::DnsConverged.to_string(), "dns_converged");
    }

    #[test]
    fn test_phase_order_follows_the_run() {
        assert!(DeployPhase::Loaded < DeployPhase::Provisioned);
        assert!(DeployPhase::ConfigUpdated < DeployPhase::DnsConverged);
        assert!(DeployPhase::Released < DeployPhase::Restored);
    }
}
