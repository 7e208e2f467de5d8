// SPDX-License-Identifier: GPL-3.0-only

//! Tracking of UDisks2 mount jobs for logging.

use std::collections::HashMap;

use zbus::zvariant::{OwnedValue, Value};

use crate::bus::InterfaceProperties;
use crate::dbus::names::{interface, object};

pub const MOUNT_OPERATION: &str = "filesystem-mount";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub object_path: String,
    pub operation: String,
    /// Object paths of the devices the job acts on.
    pub objects: Vec<String>,
}

impl Job {
    /// Build from the properties announced with a new job object.
    pub fn from_properties(object_path: &str, interfaces: &InterfaceProperties) -> Option<Self> {
        let properties = interfaces.get(interface::JOB)?;
        let operation = properties.get("Operation").and_then(as_str)?;
        let objects = properties
            .get("Objects")
            .map(as_object_paths)
            .unwrap_or_default();

        Some(Self {
            object_path: object_path.to_string(),
            operation,
            objects,
        })
    }

    pub fn is_mount(&self) -> bool {
        self.operation == MOUNT_OPERATION
    }

    fn objects_display(&self) -> String {
        self.objects.join(", ")
    }
}

fn as_str(value: &OwnedValue) -> Option<String> {
    match &**value {
        Value::Str(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

fn as_object_paths(value: &OwnedValue) -> Vec<String> {
    match &**value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::ObjectPath(path) => Some(path.as_str().to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn is_job_path(object_path: &str) -> bool {
    object_path.starts_with(object::JOBS)
}

/// Mount jobs in flight, keyed by job object path.
///
/// Only touched from the event loop.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Job>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new job if it is a mount job.
    pub fn job_created(
        &mut self,
        object_path: &str,
        interfaces: &InterfaceProperties,
    ) -> Option<&Job> {
        if !is_job_path(object_path) {
            return None;
        }

        let job = Job::from_properties(object_path, interfaces).filter(Job::is_mount)?;
        tracing::info!(
            "Mounting operation started on disk: {}",
            job.objects_display()
        );

        self.jobs.insert(object_path.to_string(), job);
        self.jobs.get(object_path)
    }

    /// Forget a finished job. Unknown paths are ignored.
    pub fn job_removed(&mut self, object_path: &str) -> Option<Job> {
        let job = self.jobs.remove(object_path)?;
        tracing::info!(
            "Mounting operation completed on disk: {}",
            job.objects_display()
        );
        Some(job)
    }

    pub fn get(&self, object_path: &str) -> Option<&Job> {
        self.jobs.get(object_path)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::job_interfaces;

    const JOB: &str = "/org/freedesktop/UDisks2/jobs/12";
    const DEVICE: &str = "/org/freedesktop/UDisks2/block_devices/sdb1";

    #[test]
    fn mount_jobs_are_recorded_until_removed() {
        let mut registry = JobRegistry::new();

        let job = registry
            .job_created(JOB, &job_interfaces(MOUNT_OPERATION, &[DEVICE]))
            .cloned()
            .unwrap();
        assert_eq!(job.objects, vec![DEVICE.to_string()]);
        assert_eq!(registry.len(), 1);

        assert_eq!(registry.job_removed(JOB), Some(job));
        assert!(registry.is_empty());
    }

    #[test]
    fn other_operations_are_not_recorded() {
        let mut registry = JobRegistry::new();

        assert!(
            registry
                .job_created(JOB, &job_interfaces("filesystem-unmount", &[DEVICE]))
                .is_none()
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn paths_outside_jobs_namespace_are_ignored() {
        let mut registry = JobRegistry::new();

        assert!(
            registry
                .job_created(DEVICE, &job_interfaces(MOUNT_OPERATION, &[DEVICE]))
                .is_none()
        );
    }

    #[test]
    fn removal_of_unknown_job_is_a_no_op() {
        let mut registry = JobRegistry::new();
        registry.job_created(JOB, &job_interfaces(MOUNT_OPERATION, &[DEVICE]));

        assert!(registry.job_removed("/org/freedesktop/UDisks2/jobs/99").is_none());
        assert_eq!(registry.len(), 1);

        assert!(registry.job_removed(JOB).is_some());
        assert!(registry.job_removed(JOB).is_none());
    }
}
