pub mod domain;
pub mod error;
pub mod process;
pub mod template;

pub use domain::address::{first_ipv4_line, MachineAddress};
pub use domain::build_info::{distance_of_time_in_words, BuildInfo, Revision};
pub use domain::phase::DeployPhase;
pub use error::CoreError;
pub use process::{format_duration, CommandSpec};
pub use template::{
    expand_env_tags, expand_env_tags_lenient, expand_with_process_env,
    expand_with_process_env_lenient,
};
