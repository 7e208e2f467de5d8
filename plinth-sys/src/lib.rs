// SPDX-License-Identifier: GPL-3.0-only

//! Service lifecycle and diagnostics for FreedomBox apps
//!
//! This crate wraps the pieces of the host an app depends on:
//! - systemd units, as [`Daemon`] components
//! - listening sockets and remote endpoints, as diagnostic checks
//!
//! Unit control assumes it is already running with the privileges needed
//! to change unit state.

pub mod component;
pub mod daemon;
pub mod diagnostics;
pub mod error;
pub mod systemd;

pub use component::{Component, ComponentRegistry, Runnable, app_is_running};
pub use daemon::Daemon;
pub use diagnostics::{
    CheckResult, DiagnosticCheck, ListenPort, NetcatProbe, ProcNet, Protocol, SocketSource,
    diagnose_netcat, diagnose_port_listening,
};
pub use error::{Result, SysError};
pub use systemd::{Systemctl, UnitControl};
