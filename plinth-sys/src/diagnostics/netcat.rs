// SPDX-License-Identifier: GPL-3.0-only

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use which::which;

use super::{CheckResult, DiagnosticCheck};

/// External connection probe, invoked as `program host port` with the
/// payload on stdin. Exit status 0 means the connection worked.
#[derive(Debug, Clone)]
pub struct NetcatProbe {
    program: PathBuf,
}

impl Default for NetcatProbe {
    fn default() -> Self {
        let program = which("nc").unwrap_or_else(|_| PathBuf::from("nc"));
        Self { program }
    }
}

impl NetcatProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn probe(&self, host: &str, port: u16, input: &str) -> std::io::Result<bool> {
        let mut child = Command::new(&self.program)
            .arg(host)
            .arg(port.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // The probe may exit before reading its input.
        if let Some(mut stdin) = child.stdin.take()
            && let Err(e) = stdin.write_all(input.as_bytes())
            && e.kind() != ErrorKind::BrokenPipe
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        Ok(child.wait()?.success())
    }

    /// Connect to `host:port` and send `input`. With `negate`, the check
    /// passes when the connection does not succeed.
    pub fn diagnose(&self, host: &str, port: u16, input: &str, negate: bool) -> DiagnosticCheck {
        let description = if negate {
            format!("Cannot connect to {host}:{port}")
        } else {
            format!("Connect to {host}:{port}")
        };

        // A probe that cannot run fails the check in both modes.
        let result = match self.probe(host, port, input) {
            Ok(connected) => CheckResult::from_bool(connected != negate),
            Err(e) => {
                tracing::debug!(
                    program = %self.program.display(),
                    host,
                    port,
                    "Connection probe failed to run: {}",
                    e
                );
                CheckResult::Failed
            }
        };

        DiagnosticCheck::new(description, result)
    }
}

/// Run [`NetcatProbe::diagnose`] with the default `nc` binary.
pub fn diagnose_netcat(host: &str, port: u16, input: &str, negate: bool) -> DiagnosticCheck {
    NetcatProbe::default().diagnose(host, port, input, negate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_from(program: &str) -> Option<NetcatProbe> {
        which(program).ok().map(NetcatProbe::new)
    }

    #[test]
    fn successful_probe_passes_unless_negated() {
        let Some(probe) = probe_from("true") else {
            return;
        };

        let check = probe.diagnose("localhost", 5222, "ping\n", false);
        assert_eq!(check.description, "Connect to localhost:5222");
        assert_eq!(check.result, CheckResult::Passed);

        let check = probe.diagnose("localhost", 5222, "ping\n", true);
        assert_eq!(check.description, "Cannot connect to localhost:5222");
        assert_eq!(check.result, CheckResult::Failed);
    }

    #[test]
    fn unreachable_endpoint_fails_unless_negated() {
        let Some(probe) = probe_from("false") else {
            return;
        };

        assert_eq!(
            probe.diagnose("192.0.2.1", 9, "", false).result,
            CheckResult::Failed
        );
        assert_eq!(
            probe.diagnose("192.0.2.1", 9, "", true).result,
            CheckResult::Passed
        );
    }

    #[test]
    fn spawn_errors_are_reported_as_results() {
        let probe = NetcatProbe::new("/nonexistent/nc");

        assert_eq!(
            probe.diagnose("localhost", 80, "GET /\n", false).result,
            CheckResult::Failed
        );
        assert_eq!(
            probe.diagnose("localhost", 80, "GET /\n", true).result,
            CheckResult::Failed
        );
    }
}
