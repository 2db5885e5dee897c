use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::model::DeployConfig;

/// Timeout the release tool applies when `deploy_timeout` is not set.
pub const DEFAULT_DEPLOY_TIMEOUT: u64 = 30;

/// The deployment descriptor, held both as raw text and as a typed view.
///
/// Edits go to the raw text only. After every write the typed view is rebuilt
/// from what is on disk, so the two never drift apart.
#[derive(Debug, Clone)]
pub struct Descriptor {
    path: PathBuf,
    raw: String,
    config: DeployConfig,
    baseline_timeout: u64,
}

impl Descriptor {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = read_raw(&path).await?;
        let config = parse(&path, &raw)?;
        let baseline_timeout = config.deploy_timeout.unwrap_or(DEFAULT_DEPLOY_TIMEOUT);

        debug!(
            path = %path.display(),
            timeout = baseline_timeout,
            "Deploy descriptor loaded"
        );

        Ok(Self {
            path,
            raw,
            config,
            baseline_timeout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn proxy_host(&self) -> Result<&str> {
        self.config
            .proxy_host()
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| self.missing("proxy.host"))
    }

    pub fn web_servers(&self) -> &[String] {
        self.config.web_hosts()
    }

    /// The first web server: the only one a deployment run manages.
    pub fn primary_address(&self) -> Result<&str> {
        self.web_servers()
            .first()
            .map(String::as_str)
            .ok_or_else(|| self.missing("servers.web"))
    }

    /// Current timeout, falling back to the release tool default.
    pub fn deploy_timeout(&self) -> u64 {
        self.config.deploy_timeout.unwrap_or(DEFAULT_DEPLOY_TIMEOUT)
    }

    /// Timeout as it was when the descriptor was first loaded.
    pub fn baseline_timeout(&self) -> u64 {
        self.baseline_timeout
    }

    /// Writes `raw` over the file and re-reads it, keeping the load-time baseline.
    pub async fn write_and_reload(&mut self, raw: String) -> Result<()> {
        fs::write(&self.path, &raw).await?;
        debug!(path = %self.path.display(), bytes = raw.len(), "Deploy descriptor written");
        self.reload().await
    }

    /// Parses `raw` as if it were on disk, without writing it.
    pub fn preview(&self, raw: &str) -> Result<DeployConfig> {
        parse(&self.path, raw)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let raw = read_raw(&self.path).await?;
        self.config = parse(&self.path, &raw)?;
        self.raw = raw;
        Ok(())
    }

    fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::MissingField {
            path: self.path.clone(),
            field,
        }
    }

    pub(crate) fn not_applied(&self, field: &'static str) -> ConfigError {
        ConfigError::NotApplied {
            path: self.path.clone(),
            field,
        }
    }
}

async fn read_raw(path: &Path) -> Result<String> {
    match fs::read_to_string(path).await {
        Ok(raw) => Ok(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(ConfigError::Io(e)),
    }
}

/// Typed, data-only parse. Env tags are expanded first, and a `fetch` that
/// cannot be resolved stays as text so fields the run never reads do not
/// block it. Anchors, aliases and merge keys are resolved; nothing else in
/// the file is interpreted.
fn parse(path: &Path, raw: &str) -> Result<DeployConfig> {
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let expanded = deploy_core::expand_with_process_env_lenient(raw);

    let mut value: serde_yaml::Value =
        serde_yaml::from_str(&expanded).map_err(|e| parse_error(e.to_string()))?;
    if value.is_null() {
        return Ok(DeployConfig::default());
    }
    value
        .apply_merge()
        .map_err(|e| parse_error(e.to_string()))?;

    serde_yaml::from_value(value).map_err(|e| parse_error(e.to_string()))
}
