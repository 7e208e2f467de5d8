// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for service and diagnostic operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("Invalid unit name for component {0}")]
    InvalidUnit(String),

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("Component already registered: {0}")]
    DuplicateComponent(String),

    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
