//! Blocks a deployment until public DNS points the service host at the new machine.

use deploy_core::MachineAddress;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{DnsError, Result};
use crate::resolver::DnsResolver;
use crate::signal::{ConvergenceSignal, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Checking,
    AwaitingOperator,
    Converged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceReport {
    pub hostname: String,
    pub address: MachineAddress,
    /// Number of DNS lookups performed, including the first one
    pub checks: u32,
}

pub struct ConvergenceGate {
    resolver: Arc<dyn DnsResolver>,
    signal: Box<dyn ConvergenceSignal>,
    state: GateState,
}

impl ConvergenceGate {
    pub fn new(resolver: Arc<dyn DnsResolver>, signal: Box<dyn ConvergenceSignal>) -> Self {
        Self {
            resolver,
            signal,
            state: GateState::Checking,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Current resolution of `hostname`; query failures count as unresolved.
    pub async fn resolve(&self, hostname: &str) -> Option<MachineAddress> {
        match self.resolver.lookup(hostname).await {
            Ok(address) => address,
            Err(e) => {
                warn!("❌ Error during DNS verification: {}", e);
                None
            }
        }
    }

    /// Returns once `hostname` resolves to `expected`.
    ///
    /// There is no timeout of its own: the loop ends on convergence, on
    /// operator cancellation, or when the signal source gives up.
    pub async fn await_convergence(
        &mut self,
        hostname: &str,
        expected: MachineAddress,
    ) -> Result<ConvergenceReport> {
        info!("=== Verifying DNS Configuration ===");
        self.state = GateState::Checking;
        let mut checks = 0;

        loop {
            match self.state {
                GateState::Checking => {
                    checks += 1;
                    let current = self.resolve(hostname).await;
                    debug!(check = checks, ?current, "DNS lookup");

                    if current == Some(expected) {
                        self.state = GateState::Converged;
                        continue;
                    }

                    if checks == 1 {
                        print_instructions(hostname, expected);
                    } else {
                        println!(
                            "\n⏳ Current DNS: {} (Expected: {})",
                            current
                                .map(|a| a.to_string())
                                .unwrap_or_else(|| "not resolved".to_string()),
                            expected
                        );
                    }
                    self.state = GateState::AwaitingOperator;
                }
                GateState::AwaitingOperator => match self.signal.wait().await? {
                    Signal::Retry => {
                        if self.signal.is_interactive() {
                            print!("\rChecking DNS...");
                        }
                        self.state = GateState::Checking;
                    }
                    Signal::Cancel => return Err(DnsError::Aborted),
                },
                GateState::Converged => {
                    println!(
                        "\n✅ DNS verification successful! {} → deployed IP {}",
                        hostname, expected
                    );
                    return Ok(ConvergenceReport {
                        hostname: hostname.to_string(),
                        address: expected,
                        checks,
                    });
                }
            }
        }
    }
}

fn print_instructions(hostname: &str, expected: MachineAddress) {
    let (label, domain) = split_hostname(hostname);
    println!(
        "Edit DNS for `{}`: Update or add a DNS Type `A` record, Name: `{}`, Value: `{}`",
        domain, label, expected
    );
}

/// Splits `app.example.com` into (`app`, `example.com`).
pub fn split_hostname(hostname: &str) -> (&str, &str) {
    let hostname = hostname.trim_end_matches('.');
    hostname.split_once('.').unwrap_or((hostname, ""))
}
