//! Local resolver cache flushing.
//!
//! `dig` talks to DNS servers directly, but browsers and most other programs
//! go through the OS cache, which may still hold the previous address.

use deploy_core::CommandSpec;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux {
        resolvectl: bool,
        systemd_resolve: bool,
    },
    Other,
}

impl Platform {
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux {
                resolvectl: Path::new("/usr/bin/resolvectl").exists(),
                systemd_resolve: Path::new("/usr/bin/systemd-resolve").exists(),
            }
        } else {
            Platform::Other
        }
    }

    /// Commands that flush the cache, run in order. Empty when unsupported.
    pub fn flush_commands(&self) -> Vec<CommandSpec> {
        let cwd = std::env::temp_dir();
        match self {
            Platform::MacOs => vec![
                CommandSpec::new("sudo", &cwd).args(["dscacheutil", "-flushcache"]),
                CommandSpec::new("sudo", &cwd).args(["killall", "-HUP", "mDNSResponder"]),
            ],
            Platform::Linux {
                resolvectl: true, ..
            } => vec![CommandSpec::new("sudo", &cwd).args(["resolvectl", "flush-caches"])],
            Platform::Linux {
                systemd_resolve: true,
                ..
            } => vec![CommandSpec::new("sudo", &cwd).args(["systemd-resolve", "--flush-caches"])],
            Platform::Linux { .. } | Platform::Other => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Flushed,
    Failed,
    Unsupported,
}

/// Best effort; failures are reported and otherwise ignored.
pub async fn flush_local_cache(platform: Platform) -> FlushOutcome {
    info!("=== Flushing local DNS cache ===");

    let commands = platform.flush_commands();
    if commands.is_empty() {
        println!("IP address changed, you may need to flush your local DNS cache manually.");
        return FlushOutcome::Unsupported;
    }

    println!("IP address changed, flushing local DNS cache...");
    for spec in commands {
        match spec.run_streaming().await {
            Ok(status) if status.success() => {}
            Ok(status) => {
                warn!("{} exited with {}", spec.display(), status);
                return FlushOutcome::Failed;
            }
            Err(e) => {
                warn!("Failed to run {}: {}", spec.display(), e);
                return FlushOutcome::Failed;
            }
        }
    }

    FlushOutcome::Flushed
}
