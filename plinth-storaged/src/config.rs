// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use plinth_sys::{Daemon, ListenPort};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/plinth/storaged.toml";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// How mount requests reach UDisks2.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MountBackend {
    /// Call UDisks2 over the system bus.
    #[default]
    Udisks,
    /// Run the `storage` action helper.
    Action,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct AutomountConfig {
    pub enabled: bool,
    pub backend: MountBackend,
    pub actions_dir: PathBuf,
}

impl Default for AutomountConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: MountBackend::default(),
            actions_dir: PathBuf::from("/usr/share/plinth/actions"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Without a directory, notifications are only logged.
    pub directory: Option<PathBuf>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            directory: Some(PathBuf::from("/var/lib/plinth/notifications")),
        }
    }
}

/// A reachability check run with the netcat probe.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ConnectCheck {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub input: String,
    /// Pass when the connection is refused instead.
    #[serde(default)]
    pub negate: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Netcat executable; looked up on `PATH` when unset.
    pub netcat: Option<PathBuf>,
    pub connect: Vec<ConnectCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct DaemonConfig {
    pub id: String,
    pub unit: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub strict_check: bool,
    #[serde(default)]
    pub listen_ports: Vec<ListenPort>,
}

impl DaemonConfig {
    pub fn to_daemon(&self) -> Result<Daemon> {
        let mut daemon = Daemon::new(&self.id, &self.unit)?
            .with_strict_check(self.strict_check)
            .with_listen_ports(self.listen_ports.clone());
        if let Some(alias) = &self.alias {
            daemon = daemon.with_alias(alias);
        }
        Ok(daemon)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: LoggingLevel,
    pub log_dir: Option<PathBuf>,
    pub automount: AutomountConfig,
    pub notifications: NotificationsConfig,
    pub diagnostics: DiagnosticsConfig,
    pub daemons: Vec<DaemonConfig>,
}

impl Config {
    /// Read the configuration file. `None` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        Self::parse(&contents)
            .with_context(|| format!("invalid configuration in {}", path.display()))
            .map(Some)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for daemon in &self.daemons {
            if daemon.id.trim().is_empty() {
                bail!("daemon entry for unit '{}' has an empty id", daemon.unit);
            }
            if daemon.unit.trim().is_empty() {
                bail!("daemon '{}' has an empty unit name", daemon.id);
            }
            if !seen.insert(daemon.id.as_str()) {
                bail!("daemon id '{}' is used more than once", daemon.id);
            }
        }
        Ok(())
    }
}
