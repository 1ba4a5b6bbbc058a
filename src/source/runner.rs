//! Child-process execution with a wall-clock timeout.
//!
//! The pool and dataset collectors never hold a long-lived connection; every
//! scrape spawns `zpool`/`zfs` through the [`Runner`] abstraction. Tests
//! inject their own implementation instead of spawning real binaries.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ExporterError, Result};

/// Default wall-clock budget for `zpool list`, `zfs list` and `zfs stats`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for `zfs get` on live-sync reads; liveness probes must stay cheap.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs a command under a deadline, returning combined stdout+stderr.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// [`Runner`] backed by real child processes. The child is spawned with
/// `kill_on_drop` so the timeout path cannot leak a descendant.
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for CommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| {
                ExporterError::Command(format!(
                    "{} timed out after {:?}",
                    program, self.timeout
                ))
            })?
            .map_err(|err| ExporterError::Command(format!("failed to run {}: {}", program, err)))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ExporterError::Command(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                combined.trim()
            )));
        }
        Ok(combined)
    }
}
