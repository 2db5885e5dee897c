use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DbError, Result};

/// Database roles every environment must configure.
pub const ROLES: [&str; 4] = ["primary", "cache", "queue", "cable"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoleSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "port_from_number_or_string")]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl RoleSettings {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    pub fn database_name(&self) -> &str {
        self.database.as_deref().unwrap_or("")
    }
}

// Env expansion turns ports into strings.
fn port_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// The per-role settings of one environment of `database.yml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub roles: BTreeMap<String, RoleSettings>,
}

impl EnvironmentConfig {
    pub async fn load(path: &Path, environment: &str) -> Result<Self> {
        if !path.exists() {
            return Err(DbError::ConfigNotFound(path.to_path_buf()));
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content, environment)
    }

    pub fn parse(content: &str, environment: &str) -> Result<Self> {
        let expanded = deploy_core::expand_with_process_env(content)
            .map_err(|e| DbError::Parse(e.to_string()))?;

        let mut value: serde_yaml::Value =
            serde_yaml::from_str(&expanded).map_err(|e| DbError::Parse(e.to_string()))?;
        value
            .apply_merge()
            .map_err(|e| DbError::Parse(e.to_string()))?;

        let section = value
            .get(environment)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| DbError::MissingEnvironment(environment.to_string()))?;

        let mut section: BTreeMap<String, serde_yaml::Value> =
            serde_yaml::from_value(section).map_err(|e| DbError::Parse(e.to_string()))?;

        let mut roles = BTreeMap::new();
        for role in ROLES {
            let settings = section
                .remove(role)
                .filter(|v| v.is_mapping())
                .ok_or_else(|| DbError::MissingRole(role.to_string()))?;
            let mut settings = settings;
            settings
                .apply_merge()
                .map_err(|e| DbError::Parse(e.to_string()))?;
            let settings: RoleSettings =
                serde_yaml::from_value(settings).map_err(|e| DbError::Parse(e.to_string()))?;
            roles.insert(role.to_string(), settings);
        }

        Ok(Self {
            environment: environment.to_string(),
            roles,
        })
    }
}
