pub mod cache;
pub mod error;
pub mod gate;
pub mod resolver;
pub mod signal;

pub use cache::{flush_local_cache, FlushOutcome, Platform};
pub use error::{DnsError, DnsQueryError, Result};
pub use gate::{split_hostname, ConvergenceGate, ConvergenceReport, GateState};
pub use resolver::{DigResolver, DnsResolver};
pub use signal::{ConvergenceSignal, InteractiveSignal, Signal, TimedPoll};
