use deploy_core::MachineAddress;
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{ProvisionError, Result};
use crate::traits::{InfraTool, Outputs};

static PROJECT_ID_BLOCK: OnceLock<Regex> = OnceLock::new();
static DEFAULT_ATTR: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// State address of the static IP resource
    pub address_resource: String,
    /// Cloud-side name of the static IP
    pub address_name: String,
    pub region: String,
    /// Output holding the machine address
    pub output_key: String,
    /// File declaring the `project_id` variable, relative to the tool's working dir
    pub variables_file: PathBuf,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            address_resource: "google_compute_address.rails_app_ip".to_string(),
            address_name: "rails-app-ip".to_string(),
            region: "us-central1".to_string(),
            output_key: "instance_ip".to_string(),
            variables_file: PathBuf::from("variables.tf"),
        }
    }
}

/// Result of trying to reuse a static address kept from an earlier teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticAddressOutcome {
    AlreadyTracked,
    Imported,
    NotFound,
}

pub struct Provisioner {
    tool: Arc<dyn InfraTool>,
    config: ProvisionerConfig,
    address: OnceCell<MachineAddress>,
}

impl Provisioner {
    pub fn new(tool: Arc<dyn InfraTool>, config: ProvisionerConfig) -> Self {
        Self {
            tool,
            config,
            address: OnceCell::new(),
        }
    }

    /// Init, reuse a preserved static IP if possible, apply, then read the address.
    pub async fn provision(&self) -> Result<MachineAddress> {
        info!("=== Applying Terraform Infrastructure ===");
        self.tool.init().await?;
        self.import_static_address_if_exists().await;
        self.tool.apply().await?;
        self.machine_address().await
    }

    /// Never fails: a missing or unimportable address just means a fresh one.
    pub async fn import_static_address_if_exists(&self) -> StaticAddressOutcome {
        let resource = &self.config.address_resource;

        match self.tool.has_resource(resource).await {
            Ok(true) => {
                info!("✅ Static IP already in Terraform state");
                return StaticAddressOutcome::AlreadyTracked;
            }
            Ok(false) => {}
            Err(e) => debug!("State lookup for {} failed: {}", resource, e),
        }

        let Some(import_id) = self.import_id().await else {
            debug!("No project_id default found, skipping static IP import");
            return StaticAddressOutcome::NotFound;
        };

        info!("Checking for existing static IP to import...");
        match self.tool.import(resource, &import_id).await {
            Ok(()) => {
                info!("✅ Imported existing static IP, DNS and deploy.yml remain stable");
                StaticAddressOutcome::Imported
            }
            Err(e) => {
                debug!("Import of {} failed: {}", import_id, e);
                info!("ℹ️  No existing static IP found, Terraform will create a new one");
                StaticAddressOutcome::NotFound
            }
        }
    }

    /// The machine address, queried from the tool's outputs at most once.
    pub async fn machine_address(&self) -> Result<MachineAddress> {
        self.address
            .get_or_try_init(|| async {
                let outputs = self.tool.outputs().await?;
                let address = address_from_outputs(&outputs, &self.config.output_key)?;
                info!("✅ Deployed IP acquired: {}", address);
                Ok::<_, ProvisionError>(address)
            })
            .await
            .copied()
    }

    async fn import_id(&self) -> Option<String> {
        let path = self.tool.working_dir().join(&self.config.variables_file);
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        let project_id = parse_project_id(&content)?;

        Some(format!(
            "projects/{}/regions/{}/addresses/{}",
            project_id, self.config.region, self.config.address_name
        ))
    }
}

fn address_from_outputs(outputs: &Outputs, key: &str) -> Result<MachineAddress> {
    let value = outputs
        .value(key)
        .ok_or_else(|| ProvisionError::MissingOutput(key.to_string()))?;

    let Value::String(text) = value else {
        return Err(ProvisionError::InvalidAddress {
            key: key.to_string(),
            value: value.to_string(),
        });
    };

    text.parse().map_err(|_| ProvisionError::InvalidAddress {
        key: key.to_string(),
        value: text.clone(),
    })
}

/// Default value of `variable "project_id"` in a Terraform variables file.
///
/// The search is bounded by the variable's own block, so nested blocks such
/// as `validation { ... }` before the default do not hide it.
pub fn parse_project_id(content: &str) -> Option<String> {
    let block = PROJECT_ID_BLOCK.get_or_init(|| {
        Regex::new(r#"variable\s+"project_id"\s*\{"#).expect("Invalid project_id regex pattern")
    });
    let default = DEFAULT_ATTR.get_or_init(|| {
        Regex::new(r#"(?m)^\s*default\s*=\s*"([^"]+)""#).expect("Invalid default regex pattern")
    });

    let start = block.find(content)?.end();
    let body = &content[start..];
    let body = &body[..closing_brace(body)?];
    default.captures(body).map(|caps| caps[1].to_string())
}

/// Offset of the brace closing a block whose opening brace was just consumed.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
