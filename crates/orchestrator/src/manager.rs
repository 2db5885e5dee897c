//! Drives one deployment run from provisioning to timeout restoration.

use deploy_core::{DeployPhase, MachineAddress};
use descriptor::{apply_temporary_config, restore_timeout, sync_listed_addresses, Descriptor};
use dns::{flush_local_cache, ConvergenceGate, Platform};
use provision::Provisioner;
use release::ReleaseTool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::state_machine::DeployStateMachine;

/// In-memory facts about the current run. Discarded at exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub phase: DeployPhase,
    pub old_address: Option<String>,
    pub new_address: Option<MachineAddress>,
    pub address_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSummary {
    pub hostname: String,
    pub old_address: String,
    pub new_address: MachineAddress,
    pub address_changed: bool,
    pub restored_timeout: u64,
    pub dns_checks: u32,
}

/// Outcome of comparing the provisioned address with the descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressCheck {
    Matches(MachineAddress),
    Drift {
        deployed: MachineAddress,
        configured: String,
    },
}

impl AddressCheck {
    pub fn matches(&self) -> bool {
        matches!(self, Self::Matches(_))
    }
}

impl std::fmt::Display for AddressCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matches(address) => write!(f, "deployed address {} matches deploy.yml", address),
            Self::Drift {
                deployed,
                configured,
            } => write!(
                f,
                "deployed address {} differs from configured {}",
                deployed, configured
            ),
        }
    }
}

pub struct DeploymentManager {
    descriptor: Descriptor,
    provisioner: Provisioner,
    gate: ConvergenceGate,
    release: Arc<dyn ReleaseTool>,
    cache_flush: Option<Platform>,
    run: RunState,
}

impl DeploymentManager {
    pub fn new(
        descriptor: Descriptor,
        provisioner: Provisioner,
        gate: ConvergenceGate,
        release: Arc<dyn ReleaseTool>,
    ) -> Self {
        Self {
            descriptor,
            provisioner,
            gate,
            release,
            cache_flush: None,
            run: RunState::default(),
        }
    }

    /// Flush the local resolver cache after convergence when the address changed.
    pub fn with_cache_flush(mut self, platform: Option<Platform>) -> Self {
        self.cache_flush = platform;
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn run_state(&self) -> &RunState {
        &self.run
    }

    pub fn phase(&self) -> DeployPhase {
        self.run.phase
    }

    /// Whether `deploy_timeout` on disk is still the elevated value: the
    /// config was updated but the run never got to restore it.
    pub fn timeout_elevated(&self) -> bool {
        self.run.phase >= DeployPhase::ConfigUpdated && self.run.phase < DeployPhase::Restored
    }

    fn advance(&mut self, to: DeployPhase) -> Result<()> {
        DeployStateMachine::validate_transition(&self.run.phase, &to)?;
        info!(from = %self.run.phase, to = %to, "Deployment phase");
        self.run.phase = to;
        Ok(())
    }

    /// Runs every phase in order. Any error aborts the run as is: a failure
    /// after the config update leaves the elevated timeout in the descriptor.
    pub async fn deploy(&mut self) -> Result<DeploymentSummary> {
        DeployStateMachine::validate_transition(&self.run.phase, &DeployPhase::Provisioned)?;
        info!("=== Starting Deployment ===");

        let hostname = self.descriptor.proxy_host()?.to_string();
        let old_address = self.descriptor.primary_address()?.to_string();
        self.run.old_address = Some(old_address.clone());
        info!("Current IP in deploy.yml: {}", old_address);

        let new_address = self.provisioner.provision().await?;
        self.run.new_address = Some(new_address);
        self.advance(DeployPhase::Provisioned)?;

        let change = apply_temporary_config(&mut self.descriptor, &new_address.to_string()).await?;
        self.run.address_changed = change.address_changed;
        self.advance(DeployPhase::ConfigUpdated)?;

        let report = self.gate.await_convergence(&hostname, new_address).await?;
        self.advance(DeployPhase::DnsConverged)?;

        if self.run.address_changed {
            if let Some(platform) = self.cache_flush {
                flush_local_cache(platform).await;
            }
        }

        self.release.setup().await?;
        self.release.details().await?;
        self.advance(DeployPhase::Released)?;

        restore_timeout(&mut self.descriptor).await?;
        self.advance(DeployPhase::Restored)?;

        info!("=== Deployment Complete ===");
        Ok(DeploymentSummary {
            hostname,
            old_address,
            new_address,
            address_changed: self.run.address_changed,
            restored_timeout: self.descriptor.deploy_timeout(),
            dns_checks: report.checks,
        })
    }

    /// Compares the Terraform output address with `servers.web[0]`.
    pub async fn deployed_address_matches_configured(&self) -> Result<AddressCheck> {
        check_deployed_address(&self.descriptor, &self.provisioner).await
    }
}

/// Reads the address from tool output only; nothing is applied.
pub async fn check_deployed_address(
    descriptor: &Descriptor,
    provisioner: &Provisioner,
) -> Result<AddressCheck> {
    let deployed = provisioner.machine_address().await?;
    let configured = descriptor.primary_address()?;

    if configured == deployed.to_string() {
        Ok(AddressCheck::Matches(deployed))
    } else {
        warn!(
            deployed = %deployed,
            configured = %configured,
            "Deployed address does not match deploy.yml"
        );
        Ok(AddressCheck::Drift {
            deployed,
            configured: configured.to_string(),
        })
    }
}

/// Writes the Terraform output address into every listed server entry.
pub async fn sync_deployed_address(
    descriptor: &mut Descriptor,
    provisioner: &Provisioner,
) -> Result<(MachineAddress, usize)> {
    let address = provisioner.machine_address().await?;
    let count = sync_listed_addresses(descriptor, &address.to_string()).await?;
    Ok((address, count))
}
