// SPDX-License-Identifier: GPL-3.0-only

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub const APP_ID: &str = "storage";
const NOTIFICATION_PREFIX: &str = "storage-disk-failure-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A user-facing notice shown by the admin interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub app_id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// Where notifications are published. Showing an id that is already shown
/// replaces it; dismissing an id that is not shown does nothing.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification) -> io::Result<()>;

    fn dismiss(&self, id: &str) -> io::Result<()>;
}

/// Notification id for a drive, safe to use as a file name.
pub fn failure_notification_id(drive_id: &str) -> String {
    let sanitized: String = drive_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{NOTIFICATION_PREFIX}{sanitized}")
}

#[derive(Clone)]
pub struct DriveHealthReporter {
    sink: Arc<dyn NotificationSink>,
}

impl DriveHealthReporter {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Show or withdraw the failure notice for a drive.
    pub fn report(&self, drive_id: &str, is_failing: bool) {
        let id = failure_notification_id(drive_id);

        let result = if is_failing {
            tracing::info!("Drive {} is failing", drive_id);
            self.sink.show(Notification {
                id,
                app_id: APP_ID.to_string(),
                severity: Severity::Error,
                title: "Disk failure imminent".to_string(),
                message: format!(
                    "Disk {drive_id} is reporting that it is likely to fail in the near \
                     future. Copy any data while you still can and replace the drive."
                ),
            })
        } else {
            tracing::info!("Drive {} appears healthy", drive_id);
            self.sink.dismiss(&id)
        };

        if let Err(e) = result {
            tracing::warn!(drive = drive_id, "Failed to update drive health notification: {}", e);
        }
    }
}
