// SPDX-License-Identifier: GPL-3.0-only

//! Error types for UDisks2 operations

use thiserror::Error;

use crate::proxy::DecodeError;

#[derive(Error, Debug)]
pub enum UdisksError {
    #[error("Property decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Mount of {device} failed: {message}")]
    Mount { device: String, message: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

pub type Result<T> = std::result::Result<T, UdisksError>;
