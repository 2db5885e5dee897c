use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "deployctl.toml";

/// Contents of `deployctl.toml`. Every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployctlConfig {
    pub paths: PathsConfig,
    pub terraform: TerraformConfig,
    pub dns: DnsConfig,
    pub release: ReleaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub descriptor: PathBuf,
    pub terraform_dir: PathBuf,
    pub database_config: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            descriptor: PathBuf::from("config/deploy.yml"),
            terraform_dir: PathBuf::from("terraform-gcloud"),
            database_config: PathBuf::from("config/database.yml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    pub program: String,
    pub address_resource: String,
    pub address_name: String,
    pub region: String,
    pub output_key: String,
    pub variables_file: PathBuf,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        let defaults = provision::ProvisionerConfig::default();
        Self {
            program: "terraform".to_string(),
            address_resource: defaults.address_resource,
            address_name: defaults.address_name,
            region: defaults.region,
            output_key: defaults.output_key,
            variables_file: defaults.variables_file,
        }
    }
}

impl TerraformConfig {
    pub fn provisioner_config(&self) -> provision::ProvisionerConfig {
        provision::ProvisionerConfig {
            address_resource: self.address_resource.clone(),
            address_name: self.address_name.clone(),
            region: self.region.clone(),
            output_key: self.output_key.clone(),
            variables_file: self.variables_file.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsMode {
    #[default]
    Interactive,
    Headless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    pub mode: DnsMode,
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
    pub flush_local_cache: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            mode: DnsMode::Interactive,
            poll_interval_secs: 10,
            max_attempts: 60,
            flush_local_cache: true,
        }
    }
}

impl DnsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    pub program: String,
    pub args_prefix: Vec<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            program: "bundle".to_string(),
            args_prefix: vec!["exec".to_string(), "kamal".to_string()],
        }
    }
}

impl DeployctlConfig {
    /// Reads `deployctl.toml` from `root`. A missing or broken file yields defaults.
    pub async fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = DeployctlConfig::load(dir.path()).await;

        assert_eq!(config, DeployctlConfig::default());
        assert_eq!(config.paths.descriptor, PathBuf::from("config/deploy.yml"));
        assert_eq!(config.dns.mode, DnsMode::Interactive);
        assert_eq!(config.release.args_prefix, vec!["exec", "kamal"]);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join(CONFIG_FILE),
            "[dns]\nmode = \"headless\"\nmax_attempts = 5\n\n[terraform]\nregion = \"europe-west1\"\n",
        )
        .await
        .unwrap();

        let config = DeployctlConfig::load(dir.path()).await;
        assert_eq!(config.dns.mode, DnsMode::Headless);
        assert_eq!(config.dns.max_attempts, 5);
        assert_eq!(config.dns.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.terraform.region, "europe-west1");
        assert_eq!(
            config.terraform.provisioner_config().address_name,
            "rails-app-ip"
        );
    }

    #[tokio::test]
    async fn test_broken_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join(CONFIG_FILE), "[dns\nmode = ")
            .await
            .unwrap();

        assert_eq!(DeployctlConfig::load(dir.path()).await, DeployctlConfig::default());
    }
}
