// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use anyhow::{Context, Result};
use plinth_sys::{Component, ComponentRegistry, Daemon, DiagnosticCheck, NetcatProbe};
use plinth_udisks::{
    ActionMountExecutor, AutoMountEngine, DriveHealthReporter, MountExecutor, NotificationSink,
    UdisksBus, UdisksMountExecutor,
};
use serde::Serialize;

use crate::config::{Config, MountBackend};
use crate::notify::{DirectoryNotificationSink, LogNotificationSink};

pub(crate) fn daemons(config: &Config) -> Result<Vec<Daemon>> {
    config
        .daemons
        .iter()
        .map(|d| d.to_daemon().with_context(|| format!("daemon '{}'", d.id)))
        .collect()
}

pub(crate) fn registry(daemons: &[Daemon]) -> Result<ComponentRegistry> {
    let mut registry = ComponentRegistry::new();
    for daemon in daemons {
        registry.register(Box::new(daemon.clone()))?;
    }
    Ok(registry)
}

#[derive(Debug, Serialize)]
pub(crate) struct ComponentReport {
    pub id: String,
    pub results: Vec<DiagnosticCheck>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DiagnosticsReport {
    pub components: Vec<ComponentReport>,
    pub connectivity: Vec<DiagnosticCheck>,
}

pub(crate) fn diagnose(config: &Config, registry: &ComponentRegistry) -> DiagnosticsReport {
    let components = registry
        .diagnose()
        .into_iter()
        .map(|(id, results)| ComponentReport { id, results })
        .collect();

    let probe = config
        .diagnostics
        .netcat
        .clone()
        .map(NetcatProbe::new)
        .unwrap_or_default();
    let connectivity = config
        .diagnostics
        .connect
        .iter()
        .map(|check| probe.diagnose(&check.host, check.port, &check.input, check.negate))
        .collect();

    DiagnosticsReport {
        components,
        connectivity,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DaemonStatus {
    pub id: String,
    pub unit: String,
    pub enabled: bool,
    pub running: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    pub running: bool,
    pub daemons: Vec<DaemonStatus>,
}

pub(crate) fn status(daemons: &[Daemon], registry: &ComponentRegistry) -> StatusReport {
    StatusReport {
        running: registry.is_running(),
        daemons: daemons
            .iter()
            .map(|daemon| DaemonStatus {
                id: daemon.component_id().to_string(),
                unit: daemon.unit().to_string(),
                enabled: daemon.is_enabled(),
                running: daemon.is_running(),
            })
            .collect(),
    }
}

fn notification_sink(config: &Config) -> Arc<dyn NotificationSink> {
    match &config.notifications.directory {
        Some(directory) => Arc::new(DirectoryNotificationSink::new(directory)),
        None => Arc::new(LogNotificationSink),
    }
}

fn mount_executor(config: &Config, bus: &UdisksBus) -> Arc<dyn MountExecutor> {
    match config.automount.backend {
        MountBackend::Udisks => Arc::new(UdisksMountExecutor::new(bus.connection().clone())),
        MountBackend::Action => Arc::new(ActionMountExecutor::new(&config.automount.actions_dir)),
    }
}

/// Run the auto-mount engine until interrupted.
pub(crate) async fn run(config: &Config) -> Result<()> {
    if !config.automount.enabled {
        tracing::info!("Auto-mounting disabled, waiting for shutdown");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let bus = UdisksBus::new()
        .await
        .context("connecting to the system bus")?;
    let events = bus
        .event_stream()
        .await
        .context("subscribing to UDisks2 signals")?;
    tracing::info!(backend = ?config.automount.backend, "Subscribed to UDisks2 signals");

    let engine = AutoMountEngine::new(
        Arc::new(bus.clone()),
        mount_executor(config, &bus),
        DriveHealthReporter::new(notification_sink(config)),
    );

    tokio::select! {
        _ = engine.run(events) => {
            tracing::warn!("UDisks2 event stream ended");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Received shutdown signal");
        }
    }

    Ok(())
}
