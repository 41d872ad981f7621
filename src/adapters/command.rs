//! Shell command execution shared by the exec controller and the
//! status-command health checker.

use crate::config::ServiceDefinition;
use crate::error::{JunbanError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Result of a finished command.
#[derive(Debug, Clone)]
pub(crate) struct CommandOutput {
    /// Exit status was zero.
    pub success: bool,
    /// Combined stdout and stderr.
    pub output: String,
}

/// Runs `command` for `service` with the definition's working directory and
/// environment, bounded by `limit`.
///
/// Spawn failures and timeouts are returned as errors; a non-zero exit is a
/// successful run with `success == false`.
pub(crate) async fn run(
    service: &str,
    command: &str,
    definition: &ServiceDefinition,
    limit: Duration,
) -> Result<CommandOutput> {
    debug!(service = service, command = command, "Executing command");

    // Parse command into program and arguments using shell-style parsing
    let parts = shell_words::split(command).map_err(|e| {
        JunbanError::config(format!("Failed to parse command '{}': {}", command, e))
    })?;
    let Some((program, args)) = parts.split_first() else {
        return Err(JunbanError::config(format!(
            "Empty command for service {}",
            service
        )));
    };

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(working_dir) = &definition.working_dir {
        cmd.current_dir(working_dir);
    }

    for env_var in &definition.env {
        if let Some((key, value)) = env_var.split_once('=') {
            cmd.env(key, value);
        } else {
            warn!(
                service = service,
                env_var = env_var,
                "Invalid environment variable format, expected KEY=VALUE"
            );
        }
    }

    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| JunbanError::Timeout {
            operation: format!("command execution: {}", command),
            seconds: limit.as_secs(),
        })??;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = if stderr.is_empty() {
        stdout.trim_end().to_string()
    } else {
        format!("{}\n{}", stdout.trim_end(), stderr.trim_end())
    };

    debug!(
        service = service,
        exit_code = output.status.code(),
        stdout = %stdout,
        stderr = %stderr,
        "Command completed"
    );

    Ok(CommandOutput {
        success: output.status.success(),
        output: combined,
    })
}
