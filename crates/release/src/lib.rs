pub mod error;
pub mod kamal;

pub use error::{ReleaseError, Result};
pub use kamal::{KamalCli, ReleaseTool};
