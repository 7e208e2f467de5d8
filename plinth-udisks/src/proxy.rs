// SPDX-License-Identifier: GPL-3.0-only

//! Typed read-only views over UDisks2 objects.
//!
//! Each view declares a table of the properties it reads: the Rust-side
//! name, the D-Bus wire signature and the D-Bus property name. A single
//! decode routine turns the raw snapshot values into [`PropertyValue`]s.
//! Anything a view does not declare stays reachable through
//! [`ProxyView::raw`] and [`ProxyView::handle`].

use std::collections::HashMap;

use thiserror::Error;
use zbus::zvariant::{OwnedValue, Value};

use crate::bus::ObjectHandle;
use crate::dbus::bytestring::decode_bytestring;
use crate::dbus::names::interface;

/// Wire signatures the decode routine knows about.
pub const SUPPORTED_SIGNATURES: &[&str] = &["ay", "aay", "s", "b", "o", "u"];

/// A property declared by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub signature: &'static str,
    pub wire_name: &'static str,
}

impl PropertyDescriptor {
    pub const fn new(name: &'static str, signature: &'static str, wire_name: &'static str) -> Self {
        Self {
            name,
            signature,
            wire_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    TextList(Vec<String>),
    Bool(bool),
    ObjectPath(String),
    U32(u32),
}

/// A view's property table disagrees with what it is asked to decode.
///
/// These are contract violations, not runtime conditions, and callers
/// are expected to propagate them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{interface}.{property}: unhandled signature '{signature}'")]
    UnhandledSignature {
        interface: &'static str,
        property: &'static str,
        signature: &'static str,
    },

    #[error("{interface}.{property}: value does not match signature '{signature}'")]
    TypeMismatch {
        interface: &'static str,
        property: String,
        signature: &'static str,
    },

    #[error("{interface}: property {property} is not declared")]
    UndeclaredProperty {
        interface: &'static str,
        property: String,
    },
}

fn unwrap_variant<'a, 'v>(value: &'a Value<'v>) -> &'a Value<'v> {
    match value {
        Value::Value(inner) => unwrap_variant(inner),
        other => other,
    }
}

fn byte_array(value: &Value<'_>) -> Option<Vec<u8>> {
    match unwrap_variant(value) {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::U8(byte) => Some(*byte),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn decode(
    interface: &'static str,
    descriptor: &PropertyDescriptor,
    value: &Value<'_>,
) -> Result<PropertyValue, DecodeError> {
    let mismatch = || DecodeError::TypeMismatch {
        interface,
        property: descriptor.name.to_string(),
        signature: descriptor.signature,
    };
    let value = unwrap_variant(value);

    match descriptor.signature {
        "ay" => byte_array(value)
            .map(|bytes| PropertyValue::Text(decode_bytestring(&bytes)))
            .ok_or_else(mismatch),
        "aay" => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| byte_array(item).map(|bytes| decode_bytestring(&bytes)))
                .collect::<Option<Vec<_>>>()
                .map(PropertyValue::TextList)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        "s" => match value {
            Value::Str(s) => Ok(PropertyValue::Text(s.as_str().to_owned())),
            _ => Err(mismatch()),
        },
        "b" => match value {
            Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            _ => Err(mismatch()),
        },
        "o" => match value {
            Value::ObjectPath(path) => Ok(PropertyValue::ObjectPath(path.as_str().to_owned())),
            _ => Err(mismatch()),
        },
        "u" => match value {
            Value::U32(n) => Ok(PropertyValue::U32(*n)),
            _ => Err(mismatch()),
        },
        signature => Err(DecodeError::UnhandledSignature {
            interface,
            property: descriptor.name,
            signature,
        }),
    }
}

/// Property snapshot of one interface on one object.
#[derive(Debug, Clone)]
pub struct ProxyView {
    object_path: String,
    interface: &'static str,
    table: &'static [PropertyDescriptor],
    properties: HashMap<String, OwnedValue>,
    handle: Option<ObjectHandle>,
}

impl ProxyView {
    pub fn new(
        object_path: impl Into<String>,
        interface: &'static str,
        table: &'static [PropertyDescriptor],
        properties: HashMap<String, OwnedValue>,
        handle: Option<ObjectHandle>,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            interface,
            table,
            properties,
            handle,
        }
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    /// Decode a declared property. Absent properties read as `None`.
    pub fn get(&self, name: &str) -> Result<Option<PropertyValue>, DecodeError> {
        let descriptor = self.descriptor(name)?;
        match self.properties.get(descriptor.wire_name) {
            Some(value) => decode(self.interface, descriptor, value).map(Some),
            None => Ok(None),
        }
    }

    /// Undecoded value of any property in the snapshot, declared or not.
    pub fn raw(&self, wire_name: &str) -> Option<&OwnedValue> {
        self.properties.get(wire_name)
    }

    /// Handle to the live bus object, for calls the view does not cover.
    /// Views built from a snapshot alone have none.
    pub fn handle(&self) -> Option<&ObjectHandle> {
        self.handle.as_ref()
    }

    fn descriptor(&self, name: &str) -> Result<&'static PropertyDescriptor, DecodeError> {
        self.table
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| DecodeError::UndeclaredProperty {
                interface: self.interface,
                property: name.to_string(),
            })
    }

    fn wrong_kind(&self, name: &str) -> DecodeError {
        DecodeError::TypeMismatch {
            interface: self.interface,
            property: name.to_string(),
            signature: self.descriptor(name).map(|d| d.signature).unwrap_or(""),
        }
    }

    fn string(&self, name: &str) -> Result<Option<String>, DecodeError> {
        match self.get(name)? {
            None => Ok(None),
            Some(PropertyValue::Text(s) | PropertyValue::ObjectPath(s)) => Ok(Some(s)),
            Some(_) => Err(self.wrong_kind(name)),
        }
    }

    fn strings(&self, name: &str) -> Result<Option<Vec<String>>, DecodeError> {
        match self.get(name)? {
            None => Ok(None),
            Some(PropertyValue::TextList(items)) => Ok(Some(items)),
            Some(_) => Err(self.wrong_kind(name)),
        }
    }

    fn boolean(&self, name: &str) -> Result<Option<bool>, DecodeError> {
        match self.get(name)? {
            None => Ok(None),
            Some(PropertyValue::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(self.wrong_kind(name)),
        }
    }

    fn uint(&self, name: &str) -> Result<Option<u32>, DecodeError> {
        match self.get(name)? {
            None => Ok(None),
            Some(PropertyValue::U32(n)) => Ok(Some(n)),
            Some(_) => Err(self.wrong_kind(name)),
        }
    }
}

/// A typed view bound to one UDisks2 interface.
pub trait DeviceView: Sized {
    const INTERFACE: &'static str;
    const PROPERTIES: &'static [PropertyDescriptor];

    fn from_view(view: ProxyView) -> Self;

    fn view(&self) -> &ProxyView;

    /// Build the view from an already fetched property map.
    fn from_properties(object_path: &str, properties: HashMap<String, OwnedValue>) -> Self {
        Self::from_view(ProxyView::new(
            object_path,
            Self::INTERFACE,
            Self::PROPERTIES,
            properties,
            None,
        ))
    }

    fn object_path(&self) -> &str {
        self.view().object_path()
    }
}

#[derive(Debug, Clone)]
pub struct Drive(ProxyView);

impl DeviceView for Drive {
    const INTERFACE: &'static str = interface::DRIVE;
    const PROPERTIES: &'static [PropertyDescriptor] = &[PropertyDescriptor::new("id", "s", "Id")];

    fn from_view(view: ProxyView) -> Self {
        Self(view)
    }

    fn view(&self) -> &ProxyView {
        &self.0
    }
}

impl Drive {
    pub fn id(&self) -> Result<Option<String>, DecodeError> {
        self.0.string("id")
    }
}

/// SMART health of ATA drives.
#[derive(Debug, Clone)]
pub struct DriveAta(ProxyView);

impl DeviceView for DriveAta {
    const INTERFACE: &'static str = interface::ATA;
    const PROPERTIES: &'static [PropertyDescriptor] =
        &[PropertyDescriptor::new("smart_failing", "b", "SmartFailing")];

    fn from_view(view: ProxyView) -> Self {
        Self(view)
    }

    fn view(&self) -> &ProxyView {
        &self.0
    }
}

impl DriveAta {
    pub fn smart_failing(&self) -> Result<Option<bool>, DecodeError> {
        self.0.boolean("smart_failing")
    }
}

#[derive(Debug, Clone)]
pub struct BlockDevice(ProxyView);

impl DeviceView for BlockDevice {
    const INTERFACE: &'static str = interface::BLOCK;
    const PROPERTIES: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::new("crypto_backing_device", "o", "CryptoBackingDevice"),
        PropertyDescriptor::new("device", "ay", "Device"),
        PropertyDescriptor::new("hint_ignore", "b", "HintIgnore"),
        PropertyDescriptor::new("hint_system", "b", "HintSystem"),
        PropertyDescriptor::new("id", "s", "Id"),
        PropertyDescriptor::new("preferred_device", "ay", "PreferredDevice"),
        PropertyDescriptor::new("symlinks", "aay", "Symlinks"),
    ];

    fn from_view(view: ProxyView) -> Self {
        Self(view)
    }

    fn view(&self) -> &ProxyView {
        &self.0
    }
}

impl BlockDevice {
    /// Object path of the encrypted device backing this one, `/` if none.
    pub fn crypto_backing_device(&self) -> Result<Option<String>, DecodeError> {
        self.0.string("crypto_backing_device")
    }

    pub fn device(&self) -> Result<Option<String>, DecodeError> {
        self.0.string("device")
    }

    pub fn hint_ignore(&self) -> Result<Option<bool>, DecodeError> {
        self.0.boolean("hint_ignore")
    }

    pub fn hint_system(&self) -> Result<Option<bool>, DecodeError> {
        self.0.boolean("hint_system")
    }

    pub fn id(&self) -> Result<Option<String>, DecodeError> {
        self.0.string("id")
    }

    pub fn preferred_device(&self) -> Result<Option<String>, DecodeError> {
        self.0.string("preferred_device")
    }

    pub fn symlinks(&self) -> Result<Option<Vec<String>>, DecodeError> {
        self.0.strings("symlinks")
    }
}

#[derive(Debug, Clone)]
pub struct Partition(ProxyView);

impl DeviceView for Partition {
    const INTERFACE: &'static str = interface::PARTITION;
    const PROPERTIES: &'static [PropertyDescriptor] =
        &[PropertyDescriptor::new("number", "u", "Number")];

    fn from_view(view: ProxyView) -> Self {
        Self(view)
    }

    fn view(&self) -> &ProxyView {
        &self.0
    }
}

impl Partition {
    pub fn number(&self) -> Result<Option<u32>, DecodeError> {
        self.0.uint("number")
    }
}

#[derive(Debug, Clone)]
pub struct Filesystem(ProxyView);

impl DeviceView for Filesystem {
    const INTERFACE: &'static str = interface::FILESYSTEM;
    const PROPERTIES: &'static [PropertyDescriptor] =
        &[PropertyDescriptor::new("mount_points", "aay", "MountPoints")];

    fn from_view(view: ProxyView) -> Self {
        Self(view)
    }

    fn view(&self) -> &ProxyView {
        &self.0
    }
}

impl Filesystem {
    pub fn mount_points(&self) -> Result<Option<Vec<String>>, DecodeError> {
        self.0.strings("mount_points")
    }
}
