// SPDX-License-Identifier: GPL-3.0-only

//! Access to UDisks2 objects on the system bus.

use std::collections::HashMap;

use async_trait::async_trait;
use zbus::Connection;
use zbus::zvariant::{self, OwnedValue, Value};
use zbus_macros::proxy;

use crate::dbus::names::{UDISKS2_SERVICE, is_absent_error};
use crate::error::Result;
use crate::proxy::{DeviceView, ProxyView};

/// Properties of each interface on one object, keyed by interface name.
pub type InterfaceProperties = HashMap<String, HashMap<String, OwnedValue>>;

/// Every UDisks2 object, keyed by object path.
pub type ManagedObjects = HashMap<String, InterfaceProperties>;

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2",
    interface = "org.freedesktop.DBus.ObjectManager"
)]
pub trait UDisks2ObjectManager {
    fn get_managed_objects(
        &self,
    ) -> zbus::Result<
        HashMap<zvariant::OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>,
    >;

    #[zbus(signal)]
    fn interfaces_added(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces_and_properties: HashMap<String, HashMap<String, OwnedValue>>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    fn interfaces_removed(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces: Vec<String>,
    ) -> zbus::Result<()>;
}

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2/Manager",
    interface = "org.freedesktop.UDisks2.Manager"
)]
pub trait UDisks2Manager {
    fn resolve_device(
        &self,
        devspec: HashMap<String, Value<'_>>,
        options: HashMap<String, Value<'_>>,
    ) -> zbus::Result<Vec<zvariant::OwnedObjectPath>>;
}

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    interface = "org.freedesktop.DBus.Properties"
)]
pub trait UDisks2Properties {
    fn get_all(&self, interface_name: &str) -> zbus::Result<HashMap<String, OwnedValue>>;
}

/// Read side of the UDisks2 object tree.
#[async_trait]
pub trait DeviceBus: Send + Sync {
    async fn managed_objects(&self) -> Result<ManagedObjects>;

    /// Current properties of `interface` on `object_path`. An object or
    /// interface that is not there yields an empty map.
    async fn properties(
        &self,
        object_path: &str,
        interface: &'static str,
    ) -> Result<HashMap<String, OwnedValue>>;

    /// Live handle for calls beyond the property snapshot.
    fn handle(&self, _object_path: &str, _interface: &'static str) -> Option<ObjectHandle> {
        None
    }
}

/// Fetch a fresh snapshot of `object_path` as view `V`.
pub async fn load<V: DeviceView>(bus: &dyn DeviceBus, object_path: &str) -> Result<V> {
    let properties = bus.properties(object_path, V::INTERFACE).await?;
    Ok(V::from_view(ProxyView::new(
        object_path,
        V::INTERFACE,
        V::PROPERTIES,
        properties,
        bus.handle(object_path, V::INTERFACE),
    )))
}

/// An interface on a live UDisks2 object.
#[derive(Debug, Clone)]
pub struct ObjectHandle {
    connection: Connection,
    object_path: String,
    interface: &'static str,
}

impl ObjectHandle {
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub async fn proxy(&self) -> zbus::Result<zbus::Proxy<'static>> {
        zbus::Proxy::new(
            &self.connection,
            UDISKS2_SERVICE,
            self.object_path.clone(),
            self.interface,
        )
        .await
    }
}

/// [`DeviceBus`] backed by the UDisks2 daemon.
#[derive(Debug, Clone)]
pub struct UdisksBus {
    connection: Connection,
}

impl UdisksBus {
    pub async fn new() -> Result<Self> {
        let connection = Connection::system().await?;
        Ok(Self { connection })
    }

    pub fn with_connection(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[async_trait]
impl DeviceBus for UdisksBus {
    async fn managed_objects(&self) -> Result<ManagedObjects> {
        let object_manager = UDisks2ObjectManagerProxy::new(&self.connection).await?;
        let objects = object_manager.get_managed_objects().await?;

        Ok(objects
            .into_iter()
            .map(|(path, interfaces)| (path.to_string(), interfaces))
            .collect())
    }

    async fn properties(
        &self,
        object_path: &str,
        interface: &'static str,
    ) -> Result<HashMap<String, OwnedValue>> {
        let proxy = UDisks2PropertiesProxy::builder(&self.connection)
            .path(object_path)?
            .build()
            .await?;

        match proxy.get_all(interface).await {
            Ok(properties) => Ok(properties),
            Err(zbus::Error::MethodError(name, _msg, _info)) if is_absent_error(name.as_str()) => {
                tracing::debug!(object_path, interface, "Object or interface is gone");
                Ok(HashMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn handle(&self, object_path: &str, interface: &'static str) -> Option<ObjectHandle> {
        Some(ObjectHandle {
            connection: self.connection.clone(),
            object_path: object_path.to_string(),
            interface,
        })
    }
}
