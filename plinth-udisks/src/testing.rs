// SPDX-License-Identifier: GPL-3.0-only

//! In-memory stand-ins for the bus, the mounter and the notification sink.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use zbus::zvariant::{ObjectPath, OwnedValue, Value};

use crate::bus::{DeviceBus, InterfaceProperties, ManagedObjects};
use crate::dbus::bytestring::encode_bytestring;
use crate::dbus::names::interface;
use crate::error::Result;
use crate::health::{Notification, NotificationSink};
use crate::mount::{MountError, MountExecutor};
use crate::proxy::{BlockDevice, DeviceView, Filesystem};

pub(crate) fn bytes(value: &str) -> OwnedValue {
    Value::from(encode_bytestring(value)).try_into().unwrap()
}

pub(crate) fn bytes_array(values: &[&str]) -> OwnedValue {
    let encoded: Vec<Vec<u8>> = values.iter().map(|v| encode_bytestring(v)).collect();
    Value::from(encoded).try_into().unwrap()
}

pub(crate) fn text(value: &str) -> OwnedValue {
    Value::from(value).try_into().unwrap()
}

pub(crate) fn object_path(value: &str) -> OwnedValue {
    Value::from(ObjectPath::try_from(value).unwrap())
        .try_into()
        .unwrap()
}

pub(crate) fn props(entries: Vec<(&str, OwnedValue)>) -> HashMap<String, OwnedValue> {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

pub(crate) fn job_interfaces(operation: &str, objects: &[&str]) -> InterfaceProperties {
    let paths: Vec<ObjectPath<'_>> = objects
        .iter()
        .map(|p| ObjectPath::try_from(*p).unwrap())
        .collect();
    HashMap::from([(
        interface::JOB.to_string(),
        props(vec![
            ("Operation", text(operation)),
            ("Objects", Value::from(paths).try_into().unwrap()),
        ]),
    )])
}

/// Unmounted partition on a removable disk, eligible for auto-mounting.
pub(crate) fn partition_object(device: &str) -> InterfaceProperties {
    let name = device.trim_start_matches("/dev/");
    HashMap::from([
        (
            interface::BLOCK.to_string(),
            props(vec![
                ("Device", bytes(device)),
                ("PreferredDevice", bytes(device)),
                ("Id", text(&format!("by-uuid-{name}"))),
                ("HintIgnore", OwnedValue::from(false)),
                ("HintSystem", OwnedValue::from(false)),
                ("Symlinks", bytes_array(&[format!("/dev/disk/by-uuid/{name}").as_str()])),
                ("CryptoBackingDevice", object_path("/")),
            ]),
        ),
        (
            interface::PARTITION.to_string(),
            props(vec![("Number", OwnedValue::from(1u32))]),
        ),
        (
            interface::FILESYSTEM.to_string(),
            props(vec![("MountPoints", bytes_array(&[]))]),
        ),
    ])
}

pub(crate) fn ata_drive_object(id: &str, failing: bool) -> InterfaceProperties {
    HashMap::from([
        (interface::DRIVE.to_string(), props(vec![("Id", text(id))])),
        (
            interface::ATA.to_string(),
            props(vec![("SmartFailing", OwnedValue::from(failing))]),
        ),
    ])
}

#[derive(Default)]
pub(crate) struct FakeBus {
    objects: Mutex<ManagedObjects>,
}

impl FakeBus {
    pub(crate) fn insert(&self, object_path: &str, interfaces: InterfaceProperties) {
        self.objects
            .lock()
            .unwrap()
            .insert(object_path.to_string(), interfaces);
    }

    pub(crate) fn set_property(
        &self,
        object_path: &str,
        interface: &str,
        name: &str,
        value: OwnedValue,
    ) {
        self.objects
            .lock()
            .unwrap()
            .entry(object_path.to_string())
            .or_default()
            .entry(interface.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Mount points currently recorded for the object whose preferred
    /// device (or device node when it has none) is `device`.
    fn object_for_device(&self, device: &str) -> Option<(String, Vec<String>)> {
        let objects = self.objects.lock().unwrap();
        objects.iter().find_map(|(path, interfaces)| {
            let block = BlockDevice::from_properties(path, interfaces.get(interface::BLOCK)?.clone());
            let node = block
                .preferred_device()
                .ok()?
                .or_else(|| block.device().ok().flatten())?;
            if node != device {
                return None;
            }
            let filesystem = Filesystem::from_properties(
                path,
                interfaces.get(interface::FILESYSTEM).cloned().unwrap_or_default(),
            );
            Some((path.clone(), filesystem.mount_points().ok()?.unwrap_or_default()))
        })
    }
}

#[async_trait]
impl DeviceBus for FakeBus {
    async fn managed_objects(&self) -> Result<ManagedObjects> {
        Ok(self.objects.lock().unwrap().clone())
    }

    async fn properties(
        &self,
        object_path: &str,
        interface: &'static str,
    ) -> Result<HashMap<String, OwnedValue>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(object_path)
            .and_then(|interfaces| interfaces.get(interface))
            .cloned()
            .unwrap_or_default())
    }
}

/// Behaves like UDisks2: mounting records a mount point on the device's
/// filesystem, and mounting a mounted device fails with `AlreadyMounted`.
pub(crate) struct FakeMounter {
    bus: Arc<FakeBus>,
    calls: Mutex<Vec<String>>,
    error: Mutex<Option<MountError>>,
}

impl FakeMounter {
    pub(crate) fn new(bus: Arc<FakeBus>) -> Self {
        Self {
            bus,
            calls: Mutex::new(Vec::new()),
            error: Mutex::new(None),
        }
    }

    pub(crate) fn fail_with(&self, error: MountError) {
        *self.error.lock().unwrap() = Some(error);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MountExecutor for FakeMounter {
    async fn mount(&self, device: &str) -> std::result::Result<(), MountError> {
        self.calls.lock().unwrap().push(device.to_string());

        if let Some(error) = self.error.lock().unwrap().clone() {
            return Err(error);
        }

        let Some((path, mount_points)) = self.bus.object_for_device(device) else {
            return Err(MountError::Other(format!("no such device {device}")));
        };
        if !mount_points.is_empty() {
            return Err(MountError::AlreadyMounted(device.to_string()));
        }

        let name = device.trim_start_matches("/dev/");
        self.bus.set_property(
            &path,
            interface::FILESYSTEM,
            "MountPoints",
            bytes_array(&[format!("/media/root/{name}").as_str()]),
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkCall {
    Show(Notification),
    Dismiss(String),
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) calls: Mutex<Vec<SinkCall>>,
    pub(crate) fail: bool,
}

impl RecordingSink {
    pub(crate) fn take_calls(&self) -> Vec<SinkCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn result(&self) -> io::Result<()> {
        if self.fail {
            Err(io::Error::other("sink unavailable"))
        } else {
            Ok(())
        }
    }
}

impl NotificationSink for RecordingSink {
    fn show(&self, notification: Notification) -> io::Result<()> {
        self.calls.lock().unwrap().push(SinkCall::Show(notification));
        self.result()
    }

    fn dismiss(&self, id: &str) -> io::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Dismiss(id.to_string()));
        self.result()
    }
}
