pub mod error;
pub mod provisioner;
pub mod terraform;
pub mod traits;

pub use error::{ProvisionError, Result};
pub use provisioner::{parse_project_id, Provisioner, ProvisionerConfig, StaticAddressOutcome};
pub use terraform::TerraformCli;
pub use traits::{InfraTool, Outputs};
