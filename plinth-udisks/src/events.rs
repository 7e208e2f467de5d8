// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;

use futures::StreamExt;
use futures::stream::Stream;
use futures::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use zbus::zvariant::OwnedValue;
use zbus::{MatchRule, MessageStream};

use crate::bus::{InterfaceProperties, UDisks2ObjectManagerProxy, UdisksBus};
use crate::dbus::names::{UDISKS2_SERVICE, interface, object};
use crate::error::Result;

/// Change notification from the UDisks2 object tree.
#[derive(Debug, Clone)]
pub enum BusEvent {
    InterfacesAdded {
        object_path: String,
        interfaces: InterfaceProperties,
    },
    InterfacesRemoved {
        object_path: String,
        interfaces: Vec<String>,
    },
    PropertiesChanged {
        object_path: String,
        interface: String,
        changed: HashMap<String, OwnedValue>,
        invalidated: Vec<String>,
    },
}

impl BusEvent {
    pub fn object_path(&self) -> &str {
        match self {
            Self::InterfacesAdded { object_path, .. }
            | Self::InterfacesRemoved { object_path, .. }
            | Self::PropertiesChanged { object_path, .. } => object_path,
        }
    }
}

pub struct BusEventStream {
    receiver: mpsc::Receiver<BusEvent>,
}

impl BusEventStream {
    pub fn new(receiver: mpsc::Receiver<BusEvent>) -> Self {
        Self { receiver }
    }
}

impl Stream for BusEventStream {
    type Item = BusEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl UdisksBus {
    /// Subscribe to object and property changes under the UDisks2 root.
    ///
    /// Subscriptions are in place when this returns, so anything that
    /// happens afterwards is delivered on the stream.
    pub async fn event_stream(&self) -> Result<BusEventStream> {
        let (sender, receiver) = mpsc::channel(64);
        let connection = self.connection().clone();

        let object_manager = UDisks2ObjectManagerProxy::new(&connection).await?;
        let mut added_stream = object_manager.receive_interfaces_added().await?;
        let mut removed_stream = object_manager.receive_interfaces_removed().await?;

        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(UDISKS2_SERVICE)?
            .interface(interface::PROPERTIES)?
            .member("PropertiesChanged")?
            .path_namespace(object::ROOT)?
            .build();
        let mut changed_stream = MessageStream::for_match_rule(rule, &connection, None).await?;

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    maybe_added = added_stream.next() => {
                        let Some(signal) = maybe_added else {
                            break;
                        };

                        match signal.args() {
                            Ok(args) => BusEvent::InterfacesAdded {
                                object_path: args.object_path.to_string(),
                                interfaces: args.interfaces_and_properties,
                            },
                            Err(e) => {
                                warn!("Failed to parse InterfacesAdded signal args: {e}");
                                continue;
                            }
                        }
                    }
                    maybe_removed = removed_stream.next() => {
                        let Some(signal) = maybe_removed else {
                            break;
                        };

                        match signal.args() {
                            Ok(args) => BusEvent::InterfacesRemoved {
                                object_path: args.object_path.to_string(),
                                interfaces: args.interfaces,
                            },
                            Err(e) => {
                                warn!("Failed to parse InterfacesRemoved signal args: {e}");
                                continue;
                            }
                        }
                    }
                    maybe_changed = changed_stream.next() => {
                        let Some(message) = maybe_changed else {
                            break;
                        };

                        let message = match message {
                            Ok(message) => message,
                            Err(e) => {
                                warn!("Failed to receive PropertiesChanged signal: {e}");
                                continue;
                            }
                        };
                        let Some(path) = message.header().path().map(|p| p.to_string()) else {
                            continue;
                        };

                        match message.body().deserialize::<(
                            String,
                            HashMap<String, OwnedValue>,
                            Vec<String>,
                        )>() {
                            Ok((interface, changed, invalidated)) => BusEvent::PropertiesChanged {
                                object_path: path,
                                interface,
                                changed,
                                invalidated,
                            },
                            Err(e) => {
                                warn!("Failed to parse PropertiesChanged signal: {e}");
                                continue;
                            }
                        }
                    }
                };

                debug!(object_path = event.object_path(), "UDisks2 event");
                if let Err(e) = sender.send(event).await {
                    warn!("Bus event receiver dropped: {e}");
                    break;
                }
            }
        });

        Ok(BusEventStream::new(receiver))
    }
}

