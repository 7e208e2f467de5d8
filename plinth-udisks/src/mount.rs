// SPDX-License-Identifier: GPL-3.0-only

//! Ways of asking for a filesystem to be mounted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use udisks2::filesystem::FilesystemProxy;
use zbus::Connection;
use zbus::zvariant::Value;

use crate::bus::UDisks2ManagerProxy;
use crate::dbus::names::error;

const DBUS_ERROR_MARKER: &str = "GDBus.Error:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MountError {
    #[error("device is already mounted: {0}")]
    AlreadyMounted(String),

    #[error("mount operation failed: {0}")]
    Failed(String),

    #[error("{0}")]
    Other(String),
}

impl MountError {
    /// Classify a D-Bus error reply from UDisks2.
    pub fn from_dbus_error(name: &str, message: &str) -> Self {
        match name {
            error::ALREADY_MOUNTED => Self::AlreadyMounted(message.to_string()),
            error::FAILED => Self::Failed(message.to_string()),
            _ => Self::Other(format!("{name}: {message}")),
        }
    }

    /// Classify the error output of a helper that reports D-Bus errors as
    /// `GDBus.Error:<name>: <message>`.
    pub fn from_stderr(stderr: &str) -> Self {
        let Some(start) = stderr.find(DBUS_ERROR_MARKER) else {
            return Self::Other(stderr.trim().to_string());
        };

        let rest = &stderr[start + DBUS_ERROR_MARKER.len()..];
        let (name, message) = rest.split_once(':').unwrap_or((rest, ""));
        Self::from_dbus_error(name.trim(), message.trim())
    }
}

impl From<zbus::Error> for MountError {
    fn from(err: zbus::Error) -> Self {
        match &err {
            zbus::Error::MethodError(name, msg, _info) => {
                Self::from_dbus_error(name.as_str(), msg.as_deref().unwrap_or(""))
            }
            _ => Self::Other(err.to_string()),
        }
    }
}

/// Classified by variant. `udisks2` drops the reply's message.
impl From<udisks2::Error> for MountError {
    fn from(err: udisks2::Error) -> Self {
        match err {
            udisks2::Error::AlreadyMounted => Self::AlreadyMounted(err.to_string()),
            udisks2::Error::Failed => Self::Failed(err.to_string()),
            udisks2::Error::Zbus(err) => Self::from(err),
            _ => Self::Other(err.to_string()),
        }
    }
}

/// Mounts a block device by its device node path.
#[async_trait]
pub trait MountExecutor: Send + Sync {
    async fn mount(&self, device: &str) -> Result<(), MountError>;
}

/// Mounts through the UDisks2 daemon directly.
#[derive(Debug, Clone)]
pub struct UdisksMountExecutor {
    connection: Connection,
}

impl UdisksMountExecutor {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl MountExecutor for UdisksMountExecutor {
    async fn mount(&self, device: &str) -> Result<(), MountError> {
        let manager = UDisks2ManagerProxy::new(&self.connection).await?;
        let devspec = HashMap::from([("path".to_string(), Value::from(device))]);
        let resolved = manager.resolve_device(devspec, HashMap::new()).await?;
        let Some(object_path) = resolved.into_iter().next() else {
            return Err(MountError::Other(format!("no UDisks2 object for {device}")));
        };

        let filesystem = FilesystemProxy::builder(&self.connection)
            .path(object_path)?
            .build()
            .await?;

        let mut options: HashMap<&str, Value<'_>> = HashMap::new();
        options.insert("auth.no_user_interaction", Value::from(true));

        let mount_point = filesystem.mount(options).await?;
        tracing::debug!(device, mount_point = %mount_point, "Mounted filesystem");
        Ok(())
    }
}

/// Mounts by running the privileged `storage` action helper.
#[derive(Debug, Clone)]
pub struct ActionMountExecutor {
    program: PathBuf,
}

impl ActionMountExecutor {
    pub fn new(actions_dir: impl AsRef<Path>) -> Self {
        Self {
            program: actions_dir.as_ref().join("storage"),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl MountExecutor for ActionMountExecutor {
    async fn mount(&self, device: &str) -> Result<(), MountError> {
        let output = tokio::process::Command::new(&self.program)
            .args(["mount", "--block-device", device])
            .output()
            .await
            .map_err(|e| {
                MountError::Other(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if output.status.success() {
            return Ok(());
        }

        Err(MountError::from_stderr(&String::from_utf8_lossy(
            &output.stderr,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbus_error_names_are_classified() {
        assert_eq!(
            MountError::from_dbus_error(error::ALREADY_MOUNTED, "busy"),
            MountError::AlreadyMounted("busy".to_string())
        );
        assert_eq!(
            MountError::from_dbus_error(error::FAILED, "bad superblock"),
            MountError::Failed("bad superblock".to_string())
        );
        assert!(matches!(
            MountError::from_dbus_error("org.freedesktop.UDisks2.Error.NotAuthorized", "no"),
            MountError::Other(_)
        ));
    }

    fn method_error(name: &str, message: &str) -> zbus::Error {
        let reply = zbus::Message::method_call("/org/freedesktop/UDisks2", "Mount")
            .unwrap()
            .build(&())
            .unwrap();
        zbus::Error::MethodError(
            zbus::names::OwnedErrorName::try_from(name).unwrap(),
            Some(message.to_string()),
            reply,
        )
    }

    #[test]
    fn zbus_method_errors_are_classified() {
        assert_eq!(
            MountError::from(method_error(error::ALREADY_MOUNTED, "Device is already mounted")),
            MountError::AlreadyMounted("Device is already mounted".to_string())
        );
        assert_eq!(
            MountError::from(method_error(error::FAILED, "wrong fs type")),
            MountError::Failed("wrong fs type".to_string())
        );
        assert!(matches!(
            MountError::from(method_error("org.freedesktop.UDisks2.Error.NotAuthorized", "no")),
            MountError::Other(msg) if msg.contains("NotAuthorized")
        ));
        assert!(matches!(
            MountError::from(zbus::Error::InterfaceNotFound),
            MountError::Other(_)
        ));
    }

    #[test]
    fn udisks_errors_are_classified() {
        assert!(matches!(
            MountError::from(udisks2::Error::AlreadyMounted),
            MountError::AlreadyMounted(_)
        ));
        assert!(matches!(
            MountError::from(udisks2::Error::Failed),
            MountError::Failed(_)
        ));
        assert!(matches!(
            MountError::from(udisks2::Error::NotAuthorized),
            MountError::Other(_)
        ));
        assert_eq!(
            MountError::from(udisks2::Error::Zbus(method_error(error::ALREADY_MOUNTED, "busy"))),
            MountError::AlreadyMounted("busy".to_string())
        );
    }

    #[test]
    fn helper_stderr_is_classified() {
        let stderr = "Error: GDBus.Error:org.freedesktop.UDisks2.Error.AlreadyMounted: \
                      Device /dev/sdb1 is already mounted at `/media/root/DATA'.\n";
        assert!(matches!(
            MountError::from_stderr(stderr),
            MountError::AlreadyMounted(msg) if msg.starts_with("Device /dev/sdb1")
        ));

        let stderr = "Error: GDBus.Error:org.freedesktop.UDisks2.Error.Failed: Error mounting";
        assert!(matches!(
            MountError::from_stderr(stderr),
            MountError::Failed(_)
        ));

        assert_eq!(
            MountError::from_stderr("Traceback: permission denied\n"),
            MountError::Other("Traceback: permission denied".to_string())
        );
    }

    #[test]
    fn action_executor_runs_storage_helper() {
        let executor = ActionMountExecutor::new("/usr/share/plinth/actions");
        assert_eq!(
            executor.program(),
            Path::new("/usr/share/plinth/actions/storage")
        );
    }

    #[tokio::test]
    async fn missing_helper_is_an_unclassified_error() {
        let executor = ActionMountExecutor::new("/nonexistent/actions");
        assert!(matches!(
            executor.mount("/dev/sdb1").await,
            Err(MountError::Other(_))
        ));
    }
}
