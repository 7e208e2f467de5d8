// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use procfs::net::{TcpNetEntry, TcpState, UdpNetEntry};
use serde::{Deserialize, Serialize};

use super::{CheckResult, DiagnosticCheck};
use crate::error::SysError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

/// Protocol a daemon listens on, as written in component declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp4 => "tcp4",
            Self::Tcp6 => "tcp6",
            Self::Udp => "udp",
            Self::Udp4 => "udp4",
            Self::Udp6 => "udp6",
        }
    }

    pub fn transport(self) -> Transport {
        match self {
            Self::Tcp | Self::Tcp4 | Self::Tcp6 => Transport::Tcp,
            Self::Udp | Self::Udp4 | Self::Udp6 => Transport::Udp,
        }
    }

    /// Socket tables to inspect. The IPv4 variants also look at IPv6
    /// sockets because a socket bound to `::` accepts IPv4 traffic too.
    fn families(self) -> &'static [AddressFamily] {
        match self {
            Self::Tcp6 | Self::Udp6 => &[AddressFamily::Inet6],
            _ => &[AddressFamily::Inet, AddressFamily::Inet6],
        }
    }

    fn requires_ipv4(self) -> bool {
        matches!(self, Self::Tcp4 | Self::Udp4)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = SysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            "udp" => Ok(Self::Udp),
            "udp4" => Ok(Self::Udp4),
            "udp6" => Ok(Self::Udp6),
            other => Err(SysError::UnknownProtocol(other.to_string())),
        }
    }
}

/// A port a daemon is expected to listen on. Serialized as `[port, "proto"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(u16, Protocol)", into = "(u16, Protocol)")]
pub struct ListenPort {
    pub port: u16,
    pub protocol: Protocol,
}

impl ListenPort {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }
}

impl From<(u16, Protocol)> for ListenPort {
    fn from((port, protocol): (u16, Protocol)) -> Self {
        Self { port, protocol }
    }
}

impl From<ListenPort> for (u16, Protocol) {
    fn from(value: ListenPort) -> Self {
        (value.port, value.protocol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Listen,
    Other,
}

/// One row of the kernel socket table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub local_address: IpAddr,
    pub local_port: u16,
    /// `None` when the socket has no peer.
    pub remote_address: Option<SocketAddr>,
    pub state: SocketState,
    pub family: AddressFamily,
}

/// Source of live socket tables.
pub trait SocketSource: Send + Sync {
    fn sockets(&self, transport: Transport, family: AddressFamily) -> io::Result<Vec<SocketEntry>>;
}

/// [`SocketSource`] reading `/proc/net/{tcp,tcp6,udp,udp6}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcNet;

impl SocketSource for ProcNet {
    fn sockets(&self, transport: Transport, family: AddressFamily) -> io::Result<Vec<SocketEntry>> {
        let entries = match (transport, family) {
            (Transport::Tcp, AddressFamily::Inet) => procfs::net::tcp().map(tcp_entries(family)),
            (Transport::Tcp, AddressFamily::Inet6) => procfs::net::tcp6().map(tcp_entries(family)),
            (Transport::Udp, AddressFamily::Inet) => procfs::net::udp().map(udp_entries(family)),
            (Transport::Udp, AddressFamily::Inet6) => procfs::net::udp6().map(udp_entries(family)),
        };

        entries.map_err(|e| io::Error::other(e.to_string()))
    }
}

fn tcp_entries(family: AddressFamily) -> impl Fn(Vec<TcpNetEntry>) -> Vec<SocketEntry> {
    move |entries| {
        entries
            .into_iter()
            .map(|e| SocketEntry {
                local_address: e.local_address.ip(),
                local_port: e.local_address.port(),
                remote_address: peer(e.remote_address),
                state: if matches!(e.state, TcpState::Listen) {
                    SocketState::Listen
                } else {
                    SocketState::Other
                },
                family,
            })
            .collect()
    }
}

fn udp_entries(family: AddressFamily) -> impl Fn(Vec<UdpNetEntry>) -> Vec<SocketEntry> {
    move |entries| {
        entries
            .into_iter()
            .map(|e| SocketEntry {
                local_address: e.local_address.ip(),
                local_port: e.local_address.port(),
                remote_address: peer(e.remote_address),
                state: SocketState::Other,
                family,
            })
            .collect()
    }
}

fn peer(addr: SocketAddr) -> Option<SocketAddr> {
    if addr.ip().is_unspecified() && addr.port() == 0 {
        None
    } else {
        Some(addr)
    }
}

fn matches_entry(
    entry: &SocketEntry,
    port: u16,
    protocol: Protocol,
    listen_address: Option<IpAddr>,
) -> bool {
    let bound = match protocol.transport() {
        Transport::Tcp => entry.state == SocketState::Listen,
        Transport::Udp => entry.remote_address.is_none(),
    };
    if !bound || entry.local_port != port {
        return false;
    }

    if let Some(address) = listen_address
        && entry.local_address != address
    {
        return false;
    }

    if !protocol.requires_ipv4() {
        return true;
    }

    entry.family == AddressFamily::Inet
        || entry.local_address == IpAddr::V6(Ipv6Addr::UNSPECIFIED)
}

/// Whether something listens on `port` with `protocol`.
pub fn is_port_listening(
    source: &dyn SocketSource,
    port: u16,
    protocol: Protocol,
    listen_address: Option<IpAddr>,
) -> io::Result<bool> {
    for family in protocol.families() {
        let entries = source.sockets(protocol.transport(), *family)?;
        if entries
            .iter()
            .any(|entry| matches_entry(entry, port, protocol, listen_address))
        {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Check that a daemon is listening on the given port.
pub fn diagnose_port_listening(
    source: &dyn SocketSource,
    port: u16,
    protocol: Protocol,
    listen_address: Option<IpAddr>,
) -> DiagnosticCheck {
    let description = match listen_address {
        Some(address) => format!("Listening on {protocol} port {address}:{port}"),
        None => format!("Listening on {protocol} port {port}"),
    };

    let listening = match is_port_listening(source, port, protocol, listen_address) {
        Ok(listening) => listening,
        Err(e) => {
            tracing::warn!(port, %protocol, "Unable to read socket tables: {}", e);
            false
        }
    };

    DiagnosticCheck::new(description, CheckResult::from_bool(listening))
}
