//! Child process invocation shared by the tool wrappers.
//!
//! Commands are always built from an argument vector; nothing goes through a
//! shell, so addresses and hostnames can never be reinterpreted.

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Human readable command line, for logs and error messages only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        cmd
    }

    /// Runs with the operator's terminal attached and reports how long it took.
    pub async fn run_streaming(&self) -> std::io::Result<ExitStatus> {
        println!("🛠️ Executing: {}\n", self.display().green());

        let started = Instant::now();
        let status = self
            .command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;

        info!(
            "⏱️ Command '{}' took {} to execute.",
            self.display(),
            format_duration(started.elapsed())
        );
        Ok(status)
    }

    /// Runs detached from the terminal and collects stdout and stderr.
    pub async fn run_captured(&self) -> std::io::Result<Output> {
        debug!("Running {} in {:?}", self.display(), self.cwd);

        self.command().stdin(Stdio::null()).output().await
    }
}

/// "2 minutes and 3.25 seconds".
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs_f64();
    let minutes = (total / 60.0).floor() as u64;
    let seconds = total - (minutes as f64 * 60.0);
    format!("{} minutes and {:.2} seconds", minutes, seconds)
}
