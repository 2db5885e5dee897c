use async_trait::async_trait;
use deploy_core::CommandSpec;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ProvisionError, Result};
use crate::traits::{InfraTool, Outputs};

pub struct TerraformCli {
    working_dir: PathBuf,
    program: String,
}

impl TerraformCli {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            program: "terraform".to_string(),
        }
    }

    /// Use a different executable, e.g. `tofu`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new(&self.program, &self.working_dir).args(args.iter().copied())
    }

    fn ensure_available(&self) -> Result<()> {
        which::which(&self.program)
            .map(|_| ())
            .map_err(|_| ProvisionError::ToolNotFound(self.program.clone()))
    }
}

#[async_trait]
impl InfraTool for TerraformCli {
    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    async fn init(&self) -> Result<()> {
        self.ensure_available()?;

        let spec = self.command(&["init"]);
        let status = spec.run_streaming().await?;
        if !status.success() {
            return Err(ProvisionError::InitFailed(format!(
                "{} exited with {}",
                spec.display(),
                status
            )));
        }
        Ok(())
    }

    async fn has_resource(&self, address: &str) -> Result<bool> {
        let output = self
            .command(&["state", "show", address])
            .run_captured()
            .await?;
        Ok(output.status.success())
    }

    async fn import(&self, address: &str, id: &str) -> Result<()> {
        let spec = self.command(&["import", address, id]);
        let output = spec.run_captured().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} failed: {}", spec.display(), stderr.trim());
            return Err(ProvisionError::ImportFailed(format!(
                "{} exited with {}",
                spec.display(),
                output.status
            )));
        }
        Ok(())
    }

    async fn apply(&self) -> Result<()> {
        self.ensure_available()?;

        let spec = self.command(&["apply", "-auto-approve"]);
        let status = spec.run_streaming().await?;
        if !status.success() {
            return Err(ProvisionError::ApplyFailed(format!(
                "{} exited with {}",
                spec.display(),
                status
            )));
        }
        Ok(())
    }

    async fn outputs(&self) -> Result<Outputs> {
        self.ensure_available()?;

        let spec = self.command(&["output", "-json"]);
        let output = spec.run_captured().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::OutputFailed(format!(
                "{} exited with {}: {}",
                spec.display(),
                output.status,
                stderr.trim()
            )));
        }

        Outputs::from_json(&String::from_utf8_lossy(&output.stdout))
    }
}
