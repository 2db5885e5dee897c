mod checker;
mod config;
mod error;

pub use checker::*;
pub use config::*;
pub use error::*;
