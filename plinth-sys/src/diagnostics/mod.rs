// SPDX-License-Identifier: GPL-3.0-only

//! Diagnostic checks run against live system state.
//!
//! Checks never fail with an error: anything that goes wrong while probing
//! is reported as [`CheckResult::Failed`].

mod netcat;
pub(crate) mod port;

use serde::{Deserialize, Serialize};

pub use netcat::{NetcatProbe, diagnose_netcat};
pub use port::{
    AddressFamily, ListenPort, ProcNet, Protocol, SocketEntry, SocketSource, SocketState,
    Transport, diagnose_port_listening, is_port_listening,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckResult {
    Passed,
    Failed,
}

impl CheckResult {
    pub fn from_bool(passed: bool) -> Self {
        if passed { Self::Passed } else { Self::Failed }
    }

    pub fn is_passed(self) -> bool {
        self == Self::Passed
    }
}

/// Outcome of a single diagnostic test, with a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCheck {
    pub description: String,
    pub result: CheckResult,
}

impl DiagnosticCheck {
    pub fn new(description: impl Into<String>, result: CheckResult) -> Self {
        Self {
            description: description.into(),
            result,
        }
    }
}
