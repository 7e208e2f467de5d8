// SPDX-License-Identifier: GPL-3.0-only

//! Notification sinks for drive health notices.

use std::fs;
use std::io;
use std::path::PathBuf;

use plinth_udisks::{Notification, NotificationSink};

/// Keeps each shown notification as `<directory>/<id>.json` for the web
/// interface to pick up.
#[derive(Debug, Clone)]
pub struct DirectoryNotificationSink {
    directory: PathBuf,
}

impl DirectoryNotificationSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }
}

impl NotificationSink for DirectoryNotificationSink {
    fn show(&self, notification: Notification) -> io::Result<()> {
        fs::create_dir_all(&self.directory)?;

        let contents = serde_json::to_vec_pretty(&notification).map_err(io::Error::other)?;
        let path = self.path_for(&notification.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(path = %path.display(), "Notification written");
        Ok(())
    }

    fn dismiss(&self, id: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => {
                tracing::debug!(id, "Notification dismissed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Only logs. Used when no notification directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn show(&self, notification: Notification) -> io::Result<()> {
        tracing::warn!(id = %notification.id, "{}: {}", notification.title, notification.message);
        Ok(())
    }

    fn dismiss(&self, id: &str) -> io::Result<()> {
        tracing::info!(id, "Notification withdrawn");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use plinth_udisks::Severity;

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "plinth-storaged-{}-{name}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn failure(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            app_id: "storage".to_string(),
            severity: Severity::Error,
            title: "Disk failure imminent".to_string(),
            message: "Replace the drive.".to_string(),
        }
    }

    #[test]
    fn show_writes_and_dismiss_removes() {
        let dir = scratch_dir("show-dismiss");
        let sink = DirectoryNotificationSink::new(&dir);

        sink.show(failure("storage-disk-failure-sda")).unwrap();

        let path = dir.join("storage-disk-failure-sda.json");
        let stored: Notification =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored, failure("storage-disk-failure-sda"));

        sink.dismiss("storage-disk-failure-sda").unwrap();
        assert!(!path.exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn show_replaces_existing_notification() {
        let dir = scratch_dir("replace");
        let sink = DirectoryNotificationSink::new(&dir);

        sink.show(failure("storage-disk-failure-sdb")).unwrap();
        let mut updated = failure("storage-disk-failure-sdb");
        updated.message = "Still failing.".to_string();
        sink.show(updated.clone()).unwrap();

        let stored: Notification = serde_json::from_slice(
            &fs::read(dir.join("storage-disk-failure-sdb.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(stored, updated);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn dismissing_unknown_notification_is_ok() {
        let sink = DirectoryNotificationSink::new(scratch_dir("missing"));
        sink.dismiss("storage-disk-failure-none").unwrap();
    }
}
