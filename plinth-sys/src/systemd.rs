// SPDX-License-Identifier: GPL-3.0-only

//! systemd unit control through `systemctl`.

use std::path::PathBuf;
use std::process::{Command, Output};

use which::which;

use crate::error::{Result, SysError};

/// Query/command interface of the OS service manager.
///
/// Implementations are expected to already run with the privileges needed
/// to change unit state.
pub trait UnitControl: Send + Sync {
    /// Whether `unit` is enabled. With `strict`, only a plain `enabled`
    /// state counts; otherwise any state the service manager reports as
    /// enabled-like (static, alias, indirect, runtime) does.
    fn is_enabled(&self, unit: &str, strict: bool) -> bool;

    /// Whether `unit` is currently active.
    fn is_active(&self, unit: &str) -> bool;

    fn enable(&self, unit: &str) -> Result<()>;

    fn disable(&self, unit: &str) -> Result<()>;
}

/// [`UnitControl`] backed by the `systemctl` binary.
#[derive(Debug, Clone)]
pub struct Systemctl {
    program: PathBuf,
}

impl Default for Systemctl {
    fn default() -> Self {
        Self::new()
    }
}

impl Systemctl {
    pub fn new() -> Self {
        let program = which("systemctl").unwrap_or_else(|_| PathBuf::from("systemctl"));
        Self { program }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| SysError::OperationFailed(format!("Failed to run systemctl: {}", e)))
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(SysError::CommandFailed {
                command: format!("systemctl {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

impl UnitControl for Systemctl {
    fn is_enabled(&self, unit: &str, strict: bool) -> bool {
        match self.output(&["is-enabled", unit]) {
            Ok(output) => enablement_satisfies(
                output.status.success(),
                &String::from_utf8_lossy(&output.stdout),
                strict,
            ),
            Err(e) => {
                tracing::warn!(unit, "Unable to query unit enablement: {}", e);
                false
            }
        }
    }

    fn is_active(&self, unit: &str) -> bool {
        match self.output(&["is-active", "--quiet", unit]) {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::warn!(unit, "Unable to query unit state: {}", e);
                false
            }
        }
    }

    fn enable(&self, unit: &str) -> Result<()> {
        self.run(&["enable", "--now", unit])
    }

    fn disable(&self, unit: &str) -> Result<()> {
        self.run(&["disable", "--now", unit])
    }
}

/// Interpret the result of `systemctl is-enabled`.
pub(crate) fn enablement_satisfies(success: bool, stdout: &str, strict: bool) -> bool {
    if !success {
        return false;
    }

    !strict || stdout.trim() == "enabled"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_check_accepts_any_successful_state() {
        assert!(enablement_satisfies(true, "static\n", false));
        assert!(enablement_satisfies(true, "enabled-runtime\n", false));
        assert!(!enablement_satisfies(false, "disabled\n", false));
    }

    #[test]
    fn strict_check_requires_plain_enabled() {
        assert!(enablement_satisfies(true, "enabled\n", true));
        assert!(!enablement_satisfies(true, "static\n", true));
        assert!(!enablement_satisfies(true, "alias\n", true));
        assert!(!enablement_satisfies(false, "enabled\n", true));
    }

    #[test]
    fn missing_binary_reads_as_not_enabled() {
        let systemctl = Systemctl::with_program("/nonexistent/systemctl");
        assert!(!systemctl.is_enabled("ssh.service", false));
        assert!(!systemctl.is_active("ssh.service"));
        assert!(matches!(
            systemctl.enable("ssh.service"),
            Err(SysError::OperationFailed(_))
        ));
    }
}
