// SPDX-License-Identifier: GPL-3.0-only

//! Well-known UDisks2 bus, interface, object and error names.

pub const UDISKS2_SERVICE: &str = "org.freedesktop.UDisks2";

pub mod interface {
    pub const ATA: &str = "org.freedesktop.UDisks2.Drive.Ata";
    pub const BLOCK: &str = "org.freedesktop.UDisks2.Block";
    pub const DRIVE: &str = "org.freedesktop.UDisks2.Drive";
    pub const FILESYSTEM: &str = "org.freedesktop.UDisks2.Filesystem";
    pub const JOB: &str = "org.freedesktop.UDisks2.Job";
    pub const MANAGER: &str = "org.freedesktop.UDisks2.Manager";
    pub const OBJECT_MANAGER: &str = "org.freedesktop.DBus.ObjectManager";
    pub const PARTITION: &str = "org.freedesktop.UDisks2.Partition";
    pub const PROPERTIES: &str = "org.freedesktop.DBus.Properties";
}

pub mod object {
    pub const ROOT: &str = "/org/freedesktop/UDisks2";
    pub const MANAGER: &str = "/org/freedesktop/UDisks2/Manager";
    pub const DRIVES: &str = "/org/freedesktop/UDisks2/drives/";
    pub const JOBS: &str = "/org/freedesktop/UDisks2/jobs/";
}

pub mod error {
    pub const ALREADY_MOUNTED: &str = "org.freedesktop.UDisks2.Error.AlreadyMounted";
    pub const FAILED: &str = "org.freedesktop.UDisks2.Error.Failed";
}

/// D-Bus errors meaning the object or interface is not there (any more).
pub(crate) fn is_absent_error(name: &str) -> bool {
    matches!(
        name,
        "org.freedesktop.DBus.Error.UnknownObject"
            | "org.freedesktop.DBus.Error.UnknownInterface"
            | "org.freedesktop.DBus.Error.UnknownProperty"
            | "org.freedesktop.DBus.Error.InvalidArgs"
    )
}
