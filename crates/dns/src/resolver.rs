use async_trait::async_trait;
use deploy_core::{first_ipv4_line, CommandSpec, MachineAddress};
use std::path::PathBuf;

use crate::error::DnsQueryError;

/// Source of A-record lookups for the convergence gate.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// First IPv4 address `host` resolves to, `None` while unresolved
    async fn lookup(&self, host: &str) -> Result<Option<MachineAddress>, DnsQueryError>;
}

/// Queries public DNS with `dig +short`, bypassing the local resolver cache.
pub struct DigResolver {
    program: String,
    cwd: PathBuf,
}

impl DigResolver {
    pub fn new() -> Self {
        Self {
            program: "dig".to_string(),
            cwd: std::env::temp_dir(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, host: &str) -> CommandSpec {
        CommandSpec::new(&self.program, &self.cwd).args(["+short", host])
    }
}

impl Default for DigResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsResolver for DigResolver {
    async fn lookup(&self, host: &str) -> Result<Option<MachineAddress>, DnsQueryError> {
        which::which(&self.program).map_err(|_| DnsQueryError::ToolNotFound(self.program.clone()))?;

        let spec = self.command(host);
        let output = spec.run_captured().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DnsQueryError::QueryFailed(format!(
                "{} exited with {}: {}",
                spec.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(first_ipv4_line(&String::from_utf8_lossy(&output.stdout)))
    }
}
