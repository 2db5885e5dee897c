pub mod error;
pub mod manager;
pub mod state_machine;

pub use error::{DeployError, Result};
pub use manager::{
    check_deployed_address, sync_deployed_address, AddressCheck, DeploymentManager,
    DeploymentSummary, RunState,
};
pub use state_machine::DeployStateMachine;
