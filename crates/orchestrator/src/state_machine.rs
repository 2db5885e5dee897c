use deploy_core::DeployPhase;

use crate::error::{DeployError, Result};

pub struct DeployStateMachine;

impl DeployStateMachine {
    pub fn validate_transition(from: &DeployPhase, to: &DeployPhase) -> Result<()> {
        if Self::next_phase(from).as_ref() == Some(to) {
            Ok(())
        } else {
            Err(DeployError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    pub fn next_phase(current: &DeployPhase) -> Option<DeployPhase> {
        match current {
            DeployPhase::Loaded => Some(DeployPhase::Provisioned),
            DeployPhase::Provisioned => Some(DeployPhase::ConfigUpdated),
            DeployPhase::ConfigUpdated => Some(DeployPhase::DnsConverged),
            DeployPhase::DnsConverged => Some(DeployPhase::Released),
            DeployPhase::Released => Some(DeployPhase::Restored),
            DeployPhase::Restored => None,
        }
    }
}
