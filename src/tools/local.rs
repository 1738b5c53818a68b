//! Local command fallback - runs rendered command templates
//!
//! Commands are spawned directly (no shell) and killed on timeout or
//! cancellation rather than left running.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::ToolFailure;

/// Output of a finished local command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run `argv` with a timeout, returning stdout on success
pub async fn run_command(
    argv: &[String],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<CommandOutput, ToolFailure> {
    let Some((program, args)) = argv.split_first() else {
        return Err(ToolFailure::Template("empty command".to_string()));
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program = %program, ?timeout, "spawning local command");

    let child = cmd.spawn().map_err(|e| ToolFailure::CommandFailed {
        exit_code: -1,
        stderr: format!("failed to spawn {}: {}", program, e),
    })?;

    // Waiting and draining both pipes race together; dropping the losing
    // future kills the child through kill_on_drop
    let output = tokio::select! {
        output = child.wait_with_output() => output.map_err(|e| ToolFailure::CommandFailed {
            exit_code: -1,
            stderr: format!("wait failed: {}", e),
        })?,
        () = tokio::time::sleep(timeout) => {
            warn!(program = %program, ?timeout, "local command timed out");
            return Err(ToolFailure::Timeout);
        }
        () = cancel.cancelled() => {
            debug!(program = %program, "local command cancelled");
            return Err(ToolFailure::Cancelled);
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let exit_code = output.status.code().unwrap_or(-1);

    debug!(program = %program, exit_code, "local command finished");

    if output.status.success() {
        Ok(CommandOutput { stdout, stderr, exit_code })
    } else {
        Err(ToolFailure::CommandFailed { exit_code, stderr })
    }
}
