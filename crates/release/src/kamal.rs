use async_trait::async_trait;
use deploy_core::CommandSpec;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ReleaseError, Result};

/// Tool that rolls the application out to the provisioned machine.
#[async_trait]
pub trait ReleaseTool: Send + Sync {
    /// Bootstrap the servers and deploy
    async fn setup(&self) -> Result<()>;

    /// Print what is running where
    async fn details(&self) -> Result<()>;
}

/// Kamal, run through Bundler from the project root
pub struct KamalCli {
    root_dir: PathBuf,
    program: String,
    prefix: Vec<String>,
}

impl KamalCli {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            program: "bundle".to_string(),
            prefix: vec!["exec".to_string(), "kamal".to_string()],
        }
    }

    /// Invoke as `<program> <prefix..> <verb>`, e.g. `kamal` with no prefix.
    pub fn with_command(mut self, program: impl Into<String>, prefix: Vec<String>) -> Self {
        self.program = program.into();
        self.prefix = prefix;
        self
    }

    fn command(&self, verb: &str) -> CommandSpec {
        CommandSpec::new(&self.program, &self.root_dir)
            .args(self.prefix.iter().cloned())
            .arg(verb)
    }

    async fn run(&self, verb: &str, failed: fn(String) -> ReleaseError) -> Result<()> {
        which::which(&self.program).map_err(|_| ReleaseError::ToolNotFound(self.program.clone()))?;

        let spec = self.command(verb);
        let status = spec.run_streaming().await?;
        if !status.success() {
            return Err(failed(format!("{} exited with {}", spec.display(), status)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReleaseTool for KamalCli {
    async fn setup(&self) -> Result<()> {
        info!("=== Running Kamal Setup ===");
        self.run("setup", ReleaseError::SetupFailed).await
    }

    async fn details(&self) -> Result<()> {
        info!("=== Kamal Details ===");
        self.run("details", ReleaseError::DetailsFailed).await
    }
}
