pub mod descriptor;
pub mod edit;
pub mod error;
pub mod model;
pub mod mutator;

pub use descriptor::{Descriptor, DEFAULT_DEPLOY_TIMEOUT};
pub use error::{ConfigError, Result};
pub use model::{DeployConfig, ProxyConfig, ServersConfig, WebServers};
pub use mutator::{
    apply_temporary_config, restore_timeout, sync_listed_addresses, TemporaryChange,
    ELEVATED_DEPLOY_TIMEOUT,
};
