//! Bounded external command runner
//!
//! Commands are spawned without a shell (argv only) and killed when their
//! timeout elapses.

use crate::errors::{Result, TuneError};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

/// Outcome of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `program args...` and wait at most `limit`
///
/// Spawn failures surface as `IoError`, an elapsed limit as `Timeout`.
/// A non-zero exit is not an error here; callers decide.
pub async fn run_command(program: &str, args: &[String], limit: Duration) -> Result<CommandOutput> {
    let start = Instant::now();

    if program.is_empty() {
        return Err(TuneError::Generic("Command cannot be empty".to_string()));
    }

    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);

    match timeout(limit, cmd.output()).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        }),
        Ok(Err(e)) => Err(TuneError::IoError(e)),
        Err(_) => Err(TuneError::Timeout {
            duration_ms: limit.as_millis() as u64,
        }),
    }
}
