//! What the convergence gate waits on between two DNS checks.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{DnsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Check DNS again
    Retry,
    /// Give up on the whole run
    Cancel,
}

#[async_trait]
pub trait ConvergenceSignal: Send {
    /// Whether a human is answering the prompts
    fn is_interactive(&self) -> bool;

    /// Block until the next check should run
    async fn wait(&mut self) -> Result<Signal>;
}

/// Waits for the operator to press return. End of input or Ctrl-C cancels.
///
/// Lines are read on a plain OS thread, one per request, so a read still
/// blocked when the run is cancelled never holds up runtime shutdown.
pub struct InteractiveSignal {
    requests: std_mpsc::Sender<()>,
    lines: mpsc::UnboundedReceiver<String>,
    pending: bool,
}

impl InteractiveSignal {
    pub fn stdin() -> Self {
        let stdin = io::stdin();
        Self::spawn(move |buf| stdin.read_line(buf))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(mut reader: R) -> Self {
        Self::spawn(move |buf| reader.read_line(buf))
    }

    fn spawn<F>(mut read_line: F) -> Self
    where
        F: FnMut(&mut String) -> io::Result<usize> + Send + 'static,
    {
        let (requests, request_rx) = std_mpsc::channel::<()>();
        let (line_tx, lines) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            while request_rx.recv().is_ok() {
                let mut line = String::new();
                match read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read from stdin: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            requests,
            lines,
            pending: false,
        }
    }
}

#[async_trait]
impl ConvergenceSignal for InteractiveSignal {
    fn is_interactive(&self) -> bool {
        true
    }

    async fn wait(&mut self) -> Result<Signal> {
        print!("Press return to check DNS (or Ctrl-C to exit): ");
        io::stdout().flush()?;

        // A read left over from a cancelled wait still answers this one.
        if !self.pending {
            if self.requests.send(()).is_err() {
                return Ok(Signal::Cancel);
            }
            self.pending = true;
        }

        tokio::select! {
            line = self.lines.recv() => {
                self.pending = false;
                match line {
                    Some(_) => Ok(Signal::Retry),
                    None => Ok(Signal::Cancel),
                }
            }
            _ = tokio::signal::ctrl_c() => Ok(Signal::Cancel),
        }
    }
}

/// Unattended replacement for the operator: fixed interval, bounded attempts.
pub struct TimedPoll {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl TimedPoll {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[async_trait]
impl ConvergenceSignal for TimedPoll {
    fn is_interactive(&self) -> bool {
        false
    }

    async fn wait(&mut self) -> Result<Signal> {
        if self.attempts >= self.max_attempts {
            return Err(DnsError::ConvergenceTimeout {
                attempts: self.attempts,
            });
        }
        self.attempts += 1;

        info!(
            "Waiting {}s before DNS check {}/{}",
            self.interval.as_secs(),
            self.attempts,
            self.max_attempts
        );

        tokio::select! {
            _ = tokio::time::sleep(self.interval) => Ok(Signal::Retry),
            _ = tokio::signal::ctrl_c() => Ok(Signal::Cancel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Instant;

    /// A reader whose first read never returns while the sender is alive.
    struct Stalled(std_mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_interactive_retry_then_cancel_on_eof() {
        let mut signal = InteractiveSignal::from_reader(Cursor::new(b"\nanything\n".to_vec()));

        assert!(signal.is_interactive());
        assert_eq!(signal.wait().await.unwrap(), Signal::Retry);
        assert_eq!(signal.wait().await.unwrap(), Signal::Retry);
        assert_eq!(signal.wait().await.unwrap(), Signal::Cancel);
    }

    #[test]
    fn test_blocked_read_does_not_delay_runtime_shutdown() {
        let (_keep_open, stalled) = std_mpsc::channel::<()>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let mut signal = InteractiveSignal::from_reader(BufReader::new(Stalled(stalled)));

        let waited = runtime.block_on(async {
            tokio::time::timeout(Duration::from_millis(50), signal.wait()).await
        });
        assert!(waited.is_err());

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_poll_is_bounded() {
        let mut poll = TimedPoll::new(Duration::from_secs(10), 2);

        assert!(!poll.is_interactive());
        assert_eq!(poll.wait().await.unwrap(), Signal::Retry);
        assert_eq!(poll.wait().await.unwrap(), Signal::Retry);
        assert!(matches!(
            poll.wait().await,
            Err(DnsError::ConvergenceTimeout { attempts: 2 })
        ));
        assert_eq!(poll.attempts(), 2);
    }
}
