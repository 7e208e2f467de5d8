// SPDX-License-Identifier: GPL-3.0-only

//! Component for managing a background daemon or any systemd unit.

use std::fmt;
use std::sync::Arc;

use crate::component::{Component, Runnable};
use crate::diagnostics::{
    CheckResult, DiagnosticCheck, ListenPort, ProcNet, SocketSource, diagnose_port_listening,
};
use crate::error::{Result, SysError};
use crate::systemd::{Systemctl, UnitControl};

/// A systemd unit owned by an app.
///
/// `component_id` must be unique across all apps and conventionally starts
/// with `daemon-`. `listen_ports` is only used for diagnostics.
#[derive(Clone)]
pub struct Daemon {
    component_id: String,
    unit: String,
    alias: Option<String>,
    strict_check: bool,
    listen_ports: Vec<ListenPort>,
    units: Arc<dyn UnitControl>,
    sockets: Arc<dyn SocketSource>,
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("component_id", &self.component_id)
            .field("unit", &self.unit)
            .field("alias", &self.alias)
            .field("strict_check", &self.strict_check)
            .field("listen_ports", &self.listen_ports)
            .finish()
    }
}

impl Daemon {
    pub fn new(component_id: impl Into<String>, unit: impl Into<String>) -> Result<Self> {
        let component_id = component_id.into();
        let unit = unit.into();
        if unit.trim().is_empty() {
            return Err(SysError::InvalidUnit(component_id));
        }

        Ok(Self {
            component_id,
            unit,
            alias: None,
            strict_check: false,
            listen_ports: Vec::new(),
            units: Arc::new(Systemctl::new()),
            sockets: Arc::new(ProcNet),
        })
    }

    /// Alternate unit name, also enabled alongside the unit.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into()).filter(|a: &String| !a.trim().is_empty());
        self
    }

    pub fn with_strict_check(mut self, strict_check: bool) -> Self {
        self.strict_check = strict_check;
        self
    }

    pub fn with_listen_ports(mut self, listen_ports: Vec<ListenPort>) -> Self {
        self.listen_ports = listen_ports;
        self
    }

    pub fn with_unit_control(mut self, units: Arc<dyn UnitControl>) -> Self {
        self.units = units;
        self
    }

    pub fn with_socket_source(mut self, sockets: Arc<dyn SocketSource>) -> Self {
        self.sockets = sockets;
        self
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn strict_check(&self) -> bool {
        self.strict_check
    }

    pub fn listen_ports(&self) -> &[ListenPort] {
        &self.listen_ports
    }

    pub fn is_enabled(&self) -> bool {
        self.units.is_enabled(&self.unit, self.strict_check)
    }

    /// Enable the unit and, when set, its alias.
    ///
    /// Enabling through an alias symlink does not always enable the unit
    /// itself, so both are issued. A failure on the alias is only logged.
    pub fn enable(&self) -> Result<()> {
        self.units.enable(&self.unit)?;
        tracing::info!(component = %self.component_id, unit = %self.unit, "Enabled unit");

        if let Some(alias) = &self.alias
            && let Err(e) = self.units.enable(alias)
        {
            tracing::warn!(
                component = %self.component_id,
                alias = %alias,
                "Failed to enable unit alias: {}",
                e
            );
        }

        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        self.units.disable(&self.unit)?;
        tracing::info!(component = %self.component_id, unit = %self.unit, "Disabled unit");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.units.is_active(&self.unit)
    }

    /// Running check followed by one check per listen port.
    pub fn diagnose(&self) -> Vec<DiagnosticCheck> {
        let mut results = Vec::with_capacity(self.listen_ports.len() + 1);
        results.push(DiagnosticCheck::new(
            format!("Service {} is running", self.unit),
            CheckResult::from_bool(self.is_running()),
        ));

        for listen in &self.listen_ports {
            results.push(diagnose_port_listening(
                self.sockets.as_ref(),
                listen.port,
                listen.protocol,
                None,
            ));
        }

        results
    }
}

impl Runnable for Daemon {
    fn is_running(&self) -> bool {
        Daemon::is_running(self)
    }
}

impl Component for Daemon {
    fn component_id(&self) -> &str {
        &self.component_id
    }

    fn as_runnable(&self) -> Option<&dyn Runnable> {
        Some(self)
    }

    fn diagnose(&self) -> Vec<DiagnosticCheck> {
        Daemon::diagnose(self)
    }
}
