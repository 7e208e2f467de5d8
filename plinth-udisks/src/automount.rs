// SPDX-License-Identifier: GPL-3.0-only

//! Reacting to UDisks2 events: mounting new filesystems, following mount
//! jobs and reporting drive health.
//!
//! Events are handled synchronously on the event loop. Anything that talks
//! to the bus or mounts runs in its own spawned task.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{DeviceBus, load};
use crate::dbus::names::interface;
use crate::error::{Result, UdisksError};
use crate::events::BusEvent;
use crate::health::DriveHealthReporter;
use crate::jobs::{Job, JobRegistry, is_job_path};
use crate::mount::{MountError, MountExecutor};
use crate::policy::{self, MountDecision, MountFacts, NO_BACKING_DEVICE, SkipReason, decide};
use crate::proxy::{BlockDevice, DeviceView, Drive, DriveAta, Filesystem, Partition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Skipped(SkipReason),
    Mounted,
    /// Someone else mounted the device first.
    AlreadyMounted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Started(Job),
    Completed(Job),
}

/// What handling one event set in motion.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub job: Option<JobEvent>,
    pub tasks: Vec<JoinHandle<()>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub drives_checked: usize,
    pub mounted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Check a filesystem object against the auto-mount rules and mount it if
/// it passes. Device state is read fresh from the bus.
///
/// Benign mount failures are logged and reported in the outcome. Property
/// decode errors and unclassified mount errors are returned.
pub async fn consider_for_mounting(
    bus: &dyn DeviceBus,
    mounter: &dyn MountExecutor,
    object_path: &str,
) -> Result<MountOutcome> {
    let (facts, decision) = read_facts(bus, object_path).await?;

    let (id, device) = (&facts.id, &facts.preferred_device);
    match decision {
        MountDecision::Skip(SkipReason::NonBlock) => {
            info!("Ignoring non-block device, not auto-mounting {}", object_path);
            return Ok(MountOutcome::Skipped(SkipReason::NonBlock));
        }
        MountDecision::Skip(reason) => {
            info!("New filesystem found: {} {}", id, device);
            match reason {
                SkipReason::AlreadyMounted => {
                    info!("Ignoring auto-mount on already mounted device: {} {}", id, device)
                }
                SkipReason::Ignored => info!(
                    "Ignoring auto-mount of device due to udev ignore hint: {} {}",
                    id, device
                ),
                _ => info!("Ignoring auto-mount of {}: {} {}", reason, id, device),
            }
            return Ok(MountOutcome::Skipped(reason));
        }
        MountDecision::Mount => info!("New filesystem found: {} {}", id, device),
    }

    info!("Auto-mounting device: {} {}", id, device);
    match mounter.mount(device).await {
        Ok(()) => Ok(MountOutcome::Mounted),
        Err(MountError::AlreadyMounted(_)) => {
            warn!("Device is already mounted: {} {}", id, device);
            Ok(MountOutcome::AlreadyMounted)
        }
        Err(MountError::Failed(message)) => {
            warn!("Mount operation failed: {} {}: {}", id, device, message);
            Ok(MountOutcome::Failed(message))
        }
        Err(MountError::Other(message)) => Err(UdisksError::Mount {
            device: device.clone(),
            message,
        }),
    }
}

/// Read device properties one rule at a time, stopping at the first rule
/// that skips the device.
async fn read_facts(
    bus: &dyn DeviceBus,
    object_path: &str,
) -> Result<(MountFacts, MountDecision)> {
    let block: BlockDevice = load(bus, object_path).await?;
    let mut facts = MountFacts {
        object_path: object_path.to_string(),
        device: block.device()?.unwrap_or_default(),
        ..Default::default()
    };
    if let Some(reason) = policy::skip_non_block(&facts) {
        return Ok((facts, MountDecision::Skip(reason)));
    }

    facts.id = block.id()?.unwrap_or_default();
    facts.preferred_device = block
        .preferred_device()?
        .filter(|device| !device.is_empty())
        .unwrap_or_else(|| facts.device.clone());
    facts.hint_ignore = block.hint_ignore()?.unwrap_or(false);
    if let Some(reason) = policy::skip_ignored(&facts) {
        return Ok((facts, MountDecision::Skip(reason)));
    }

    facts.symlinks = block.symlinks()?.unwrap_or_default();
    if let Some(reason) = policy::skip_docker(&facts) {
        return Ok((facts, MountDecision::Skip(reason)));
    }

    facts.hint_system = block.hint_system()?.unwrap_or(false);
    if facts.hint_system {
        let partition: Partition = load(bus, object_path).await?;
        facts.partition_number = partition.number()?;
        facts.crypto_backing_device = block
            .crypto_backing_device()?
            .unwrap_or_else(|| NO_BACKING_DEVICE.to_string());
    }
    if let Some(reason) = policy::skip_top_level_internal(&facts) {
        return Ok((facts, MountDecision::Skip(reason)));
    }

    let filesystem: Filesystem = load(bus, object_path).await?;
    facts.mount_points = filesystem.mount_points()?.unwrap_or_default();
    let decision = decide(&facts);
    Ok((facts, decision))
}

async fn report_drive_health(
    bus: &dyn DeviceBus,
    reporter: &DriveHealthReporter,
    object_path: &str,
    is_failing: bool,
) -> Result<()> {
    let drive: Drive = load(bus, object_path).await?;
    let Some(id) = drive.id()? else {
        return Err(UdisksError::DeviceNotFound(object_path.to_string()));
    };
    reporter.report(&id, is_failing);
    Ok(())
}

/// Mount eligible filesystems and report drive health for everything
/// already present on the bus.
pub async fn reconcile(
    bus: &dyn DeviceBus,
    mounter: &dyn MountExecutor,
    reporter: &DriveHealthReporter,
) -> Result<ReconcileSummary> {
    let objects = bus.managed_objects().await?;
    let mut paths: Vec<&String> = objects.keys().collect();
    paths.sort();

    let mut summary = ReconcileSummary::default();

    for path in &paths {
        let interfaces = &objects[*path];
        let (Some(drive), Some(ata)) = (
            interfaces.get(interface::DRIVE),
            interfaces.get(interface::ATA),
        ) else {
            continue;
        };

        let drive = Drive::from_properties(path, drive.clone());
        let ata = DriveAta::from_properties(path, ata.clone());
        match (drive.id(), ata.smart_failing()) {
            (Ok(Some(id)), Ok(failing)) => {
                reporter.report(&id, failing.unwrap_or(false));
                summary.drives_checked += 1;
            }
            (Ok(None), _) => warn!(object_path = %path, "Drive without an id"),
            (Err(e), _) | (_, Err(e)) => error!(object_path = %path, "Failed to read drive health: {}", e),
        }
    }

    for path in paths
        .iter()
        .filter(|path| objects[**path].contains_key(interface::FILESYSTEM))
    {
        match consider_for_mounting(bus, mounter, path).await {
            Ok(MountOutcome::Mounted) => summary.mounted += 1,
            Ok(MountOutcome::Skipped(_) | MountOutcome::AlreadyMounted) => summary.skipped += 1,
            Ok(MountOutcome::Failed(_)) => summary.failed += 1,
            Err(e) => {
                error!(object_path = %path, "Auto-mount failed: {}", e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

pub struct AutoMountEngine {
    bus: Arc<dyn DeviceBus>,
    mounter: Arc<dyn MountExecutor>,
    reporter: DriveHealthReporter,
    jobs: JobRegistry,
}

impl AutoMountEngine {
    pub fn new(
        bus: Arc<dyn DeviceBus>,
        mounter: Arc<dyn MountExecutor>,
        reporter: DriveHealthReporter,
    ) -> Self {
        Self {
            bus,
            mounter,
            reporter,
            jobs: JobRegistry::new(),
        }
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Route one bus event. Never blocks on the bus.
    pub fn handle_event(&mut self, event: BusEvent) -> Dispatch {
        let mut dispatch = Dispatch::default();

        match event {
            BusEvent::InterfacesAdded {
                object_path,
                interfaces,
            } => {
                if is_job_path(&object_path) {
                    dispatch.job = self
                        .jobs
                        .job_created(&object_path, &interfaces)
                        .cloned()
                        .map(JobEvent::Started);
                }

                if interfaces.contains_key(interface::FILESYSTEM) {
                    debug!(object_path = %object_path, "Filesystem added");
                    dispatch.tasks.push(self.spawn_mount(object_path));
                }
            }
            BusEvent::InterfacesRemoved { object_path, .. } => {
                if is_job_path(&object_path) {
                    dispatch.job = self.jobs.job_removed(&object_path).map(JobEvent::Completed);
                }
            }
            BusEvent::PropertiesChanged {
                object_path,
                interface: changed_interface,
                changed,
                ..
            } => {
                if changed_interface == interface::ATA && changed.contains_key("SmartFailing") {
                    let ata = DriveAta::from_properties(&object_path, changed);
                    match ata.smart_failing() {
                        Ok(Some(is_failing)) => {
                            dispatch.tasks.push(self.spawn_health(object_path, is_failing))
                        }
                        Ok(None) => {}
                        Err(e) => error!(object_path = %object_path, "Invalid SmartFailing value: {}", e),
                    }
                }
            }
        }

        dispatch
    }

    fn spawn_mount(&self, object_path: String) -> JoinHandle<()> {
        let bus = self.bus.clone();
        let mounter = self.mounter.clone();

        tokio::spawn(async move {
            if let Err(e) = consider_for_mounting(bus.as_ref(), mounter.as_ref(), &object_path).await
            {
                error!(object_path = %object_path, "Auto-mount failed: {}", e);
            }
        })
    }

    fn spawn_health(&self, object_path: String, is_failing: bool) -> JoinHandle<()> {
        let bus = self.bus.clone();
        let reporter = self.reporter.clone();

        tokio::spawn(async move {
            if let Err(e) =
                report_drive_health(bus.as_ref(), &reporter, &object_path, is_failing).await
            {
                error!(object_path = %object_path, "Failed to report drive health: {}", e);
            }
        })
    }

    fn spawn_reconcile(&self) -> JoinHandle<()> {
        let bus = self.bus.clone();
        let mounter = self.mounter.clone();
        let reporter = self.reporter.clone();

        tokio::spawn(async move {
            match reconcile(bus.as_ref(), mounter.as_ref(), &reporter).await {
                Ok(summary) => info!(
                    drives = summary.drives_checked,
                    mounted = summary.mounted,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "Initial device scan complete"
                ),
                Err(e) => error!("Initial device scan failed: {}", e),
            }
        })
    }

    /// Handle events until the stream ends.
    ///
    /// Pass a stream that is already subscribed: the initial scan starts
    /// here, and anything that changes during it arrives as an event.
    pub async fn run<S>(mut self, events: S)
    where
        S: Stream<Item = BusEvent>,
    {
        info!("Starting UDisks2 auto-mount engine");
        let initial_scan = self.spawn_reconcile();

        let mut events = std::pin::pin!(events);
        while let Some(event) = events.next().await {
            self.handle_event(event);
        }

        info!("UDisks2 event stream closed");
        if let Err(e) = initial_scan.await {
            error!("Initial device scan task failed: {}", e);
        }
    }
}
