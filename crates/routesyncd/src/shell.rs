//! Host command execution for route mutations.
//!
//! Commands run through `/bin/sh -c`, so every untrusted argument must go
//! through [`shellquote`] first. Published CIDR and node strings come from
//! the store and are untrusted.

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Result, RouteSyncError};

/// Default path to the `ip` command.
pub const IP_CMD: &str = "/sbin/ip";

/// Shell used to run commands.
pub const SH_CMD: &str = "/bin/sh";

/// Characters with special meaning inside double quotes: $ ` " \ and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// Wraps the string in double quotes and escapes `$`, `` ` ``, `"`, `\`
/// and newline.
///
/// # Arguments
///
/// * `s` - The string to quote
///
/// # Returns
///
/// A quoted string that the shell passes through as one literal argument.
///
/// # Example
///
/// ```
/// use calico_routesyncd::shell::shellquote;
///
/// assert_eq!(shellquote("10.0.0.0/24"), "\"10.0.0.0/24\"");
/// assert_eq!(shellquote("$(reboot)"), "\"\\$(reboot)\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Outcome of one command run.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code, -1 if killed by a signal
    pub exit_code: i32,
    /// Trimmed stdout
    pub stdout: String,
    /// Trimmed stderr
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command exited with 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr joined, for error messages.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs a command line through `/bin/sh -c` and captures its output.
///
/// # Arguments
///
/// * `cmd` - The command line, with untrusted arguments already quoted
///
/// # Returns
///
/// * `Ok(ExecResult)` - The command ran; check [`ExecResult::success`]
/// * `Err(RouteSyncError::ShellExec)` - The shell could not be spawned
pub async fn exec(cmd: &str) -> Result<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new(SH_CMD)
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| RouteSyncError::ShellExec {
            command: cmd.to_string(),
            source,
        })?;

    let result = ExecResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    if result.success() {
        tracing::trace!(command = %cmd, exit_code = result.exit_code, "Command succeeded");
    } else {
        tracing::warn!(
            command = %cmd,
            exit_code = result.exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Runs a command line and turns a non-zero exit into an error.
///
/// # Arguments
///
/// * `cmd` - The command line to run
///
/// # Returns
///
/// * `Ok(String)` - Trimmed stdout on exit code 0
/// * `Err(RouteSyncError::ShellCommandFailed)` - Non-zero exit, with the combined output
/// * `Err(RouteSyncError::ShellExec)` - The shell could not be spawned
pub async fn exec_checked(cmd: &str) -> Result<String> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(RouteSyncError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
