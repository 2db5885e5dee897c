//! Typed view of the fields of `deploy.yml` the deployment run reads.
//!
//! Unknown keys are ignored; the file carries plenty of release-tool settings
//! that are none of our business.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployConfig {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub servers: Option<ServersConfig>,
    #[serde(default)]
    pub deploy_timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServersConfig {
    #[serde(default)]
    pub web: Option<WebServers>,
}

/// `servers.web` is either a bare host list or a role with `hosts:`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WebServers {
    Hosts(Vec<String>),
    Role { hosts: Vec<String> },
}

impl WebServers {
    pub fn hosts(&self) -> &[String] {
        match self {
            WebServers::Hosts(hosts) => hosts,
            WebServers::Role { hosts } => hosts,
        }
    }
}

impl DeployConfig {
    pub fn proxy_host(&self) -> Option<&str> {
        self.proxy.as_ref()?.host.as_deref()
    }

    pub fn web_hosts(&self) -> &[String] {
        self.servers
            .as_ref()
            .and_then(|s| s.web.as_ref())
            .map(WebServers::hosts)
            .unwrap_or(&[])
    }
}
