use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{ProvisionError, Result};

/// Named outputs as printed by `terraform output -json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs(Map<String, Value>);

impl Outputs {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ProvisionError::Parse(e.to_string()))
    }

    /// The `<key>.value` entry.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)?.get("value")
    }
}

/// Infrastructure-as-code tool driven by the deployment run.
#[async_trait]
pub trait InfraTool: Send + Sync {
    /// Directory holding the infrastructure definitions
    fn working_dir(&self) -> &Path;

    /// Initialize local state and providers
    async fn init(&self) -> Result<()>;

    /// Check whether a resource is tracked in state
    async fn has_resource(&self, address: &str) -> Result<bool>;

    /// Adopt an existing cloud resource into state
    async fn import(&self, address: &str, id: &str) -> Result<()>;

    /// Converge infrastructure to the definitions
    async fn apply(&self) -> Result<()>;

    /// Read all outputs
    async fn outputs(&self) -> Result<Outputs>;
}
