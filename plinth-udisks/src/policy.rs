// SPDX-License-Identifier: GPL-3.0-only

//! Auto-mount eligibility rules.

use std::fmt;

const DOCKER_PREFIXES: &[&str] = &["/dev/mapper/docker-", "/dev/disk/by-id/dm-name-docker-"];

/// `CryptoBackingDevice` value of devices that are not unlocked LUKS volumes.
pub const NO_BACKING_DEVICE: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NonBlock,
    Ignored,
    Docker,
    TopLevelInternal,
    AlreadyMounted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NonBlock => "non-block device",
            Self::Ignored => "udev ignore hint",
            Self::Docker => "docker device",
            Self::TopLevelInternal => "top-level internal device",
            Self::AlreadyMounted => "already mounted device",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountDecision {
    Mount,
    Skip(SkipReason),
}

/// Everything the rules look at. Fields are read in rule order, so the ones
/// behind a matching rule keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountFacts {
    pub object_path: String,
    pub id: String,
    pub device: String,
    pub preferred_device: String,
    pub hint_ignore: bool,
    pub hint_system: bool,
    pub symlinks: Vec<String>,
    pub crypto_backing_device: String,
    pub partition_number: Option<u32>,
    pub mount_points: Vec<String>,
}

impl MountFacts {
    fn is_docker(&self) -> bool {
        self.symlinks
            .iter()
            .any(|link| DOCKER_PREFIXES.iter().any(|prefix| link.starts_with(prefix)))
    }

    /// Whole internal disk rather than one of its partitions. Unlocked
    /// encrypted volumes are not top-level even when marked as system.
    fn is_top_level_internal(&self) -> bool {
        self.hint_system
            && self.partition_number.unwrap_or(0) == 0
            && self.crypto_backing_device == NO_BACKING_DEVICE
    }
}

pub fn skip_non_block(facts: &MountFacts) -> Option<SkipReason> {
    facts.device.is_empty().then_some(SkipReason::NonBlock)
}

pub fn skip_ignored(facts: &MountFacts) -> Option<SkipReason> {
    facts.hint_ignore.then_some(SkipReason::Ignored)
}

pub fn skip_docker(facts: &MountFacts) -> Option<SkipReason> {
    facts.is_docker().then_some(SkipReason::Docker)
}

pub fn skip_top_level_internal(facts: &MountFacts) -> Option<SkipReason> {
    facts
        .is_top_level_internal()
        .then_some(SkipReason::TopLevelInternal)
}

pub fn skip_mounted(facts: &MountFacts) -> Option<SkipReason> {
    (!facts.mount_points.is_empty()).then_some(SkipReason::AlreadyMounted)
}

/// Decide whether a device should be auto-mounted. Rules are checked in
/// order and the first match wins.
pub fn decide(facts: &MountFacts) -> MountDecision {
    skip_non_block(facts)
        .or_else(|| skip_ignored(facts))
        .or_else(|| skip_docker(facts))
        .or_else(|| skip_top_level_internal(facts))
        .or_else(|| skip_mounted(facts))
        .map_or(MountDecision::Mount, MountDecision::Skip)
}
