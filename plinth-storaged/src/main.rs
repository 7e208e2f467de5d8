// SPDX-License-Identifier: GPL-3.0-only

//! FreedomBox storage daemon
//!
//! Auto-mounts removable filesystems through UDisks2, reports failing
//! drives, and enables, disables and diagnoses the system services
//! declared in its configuration.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use plinth_sys::{Component, Daemon};

mod config;
mod logging;
mod notify;
mod service;

use config::{Config, DEFAULT_CONFIG_PATH};

#[derive(Debug, Parser)]
#[command(name = "plinth-storaged", version)]
#[command(about = "FreedomBox storage auto-mount and service control daemon")]
struct Cli {
    /// Configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Auto-mount filesystems and watch drive health (default)
    Run,
    /// Run diagnostics for every configured service and print them as JSON
    Diagnose,
    /// Print enabled and running state of every configured service as JSON
    Status,
    /// Enable and start a configured service
    Enable { id: String },
    /// Disable and stop a configured service
    Disable { id: String },
}

impl Command {
    fn needs_root(&self) -> bool {
        matches!(self, Self::Run | Self::Enable { .. } | Self::Disable { .. })
    }
}

fn require_root() -> Result<()> {
    if unsafe { libc::geteuid() } != 0 {
        tracing::error!("plinth-storaged must run as root");
        anyhow::bail!("this command needs root privileges");
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config)?;
    let config = loaded.clone().unwrap_or_default();
    logging::init(&config);

    if loaded.is_none() {
        tracing::info!(
            "Configuration file {} not found, using defaults",
            cli.config.display()
        );
    }

    let command = cli.command.unwrap_or(Command::Run);
    if command.needs_root() {
        require_root()?;
    }

    let daemons = service::daemons(&config)?;
    let registry = service::registry(&daemons)?;

    match command {
        Command::Run => {
            tracing::info!("Starting plinth-storaged v{}", env!("CARGO_PKG_VERSION"));
            service::run(&config).await?;
            tracing::info!("plinth-storaged shutting down");
            Ok(())
        }
        Command::Diagnose => print_json(&service::diagnose(&config, &registry)),
        Command::Status => print_json(&service::status(&daemons, &registry)),
        Command::Enable { id } => {
            let daemon = find_daemon(&daemons, &id)?;
            daemon
                .enable()
                .with_context(|| format!("enabling {}", daemon.unit()))
        }
        Command::Disable { id } => {
            let daemon = find_daemon(&daemons, &id)?;
            daemon
                .disable()
                .with_context(|| format!("disabling {}", daemon.unit()))
        }
    }
}

fn find_daemon<'a>(daemons: &'a [Daemon], id: &str) -> Result<&'a Daemon> {
    daemons
        .iter()
        .find(|d| d.component_id() == id)
        .ok_or_else(|| anyhow!("no service with id '{id}' is configured"))
}
