// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2 integration for FreedomBox storage: typed device views, the
//! auto-mount event engine and drive health reporting.

pub mod automount;
pub mod bus;
pub mod dbus;
pub mod error;
pub mod events;
pub mod health;
pub mod jobs;
pub mod mount;
pub mod policy;
pub mod proxy;

#[cfg(test)]
pub(crate) mod testing;

pub use automount::{
    AutoMountEngine, Dispatch, JobEvent, MountOutcome, ReconcileSummary, consider_for_mounting,
    reconcile,
};
pub use bus::{DeviceBus, InterfaceProperties, ManagedObjects, ObjectHandle, UdisksBus, load};
pub use error::{Result, UdisksError};
pub use events::{BusEvent, BusEventStream};
pub use health::{DriveHealthReporter, Notification, NotificationSink, Severity};
pub use jobs::{Job, JobRegistry};
pub use mount::{ActionMountExecutor, MountError, MountExecutor, UdisksMountExecutor};
pub use policy::{MountDecision, MountFacts, SkipReason, decide};
pub use proxy::{
    BlockDevice, DecodeError, DeviceView, Drive, DriveAta, Filesystem, Partition, PropertyValue,
    ProxyView,
};
