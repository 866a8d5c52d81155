use std::io;
use thiserror::Error;

use crate::core::optimizer::{Attribute, Capability};

/// Custom error type for corewarden
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Target vanished before the action could be applied
    #[error("Process {0} not found")]
    ProcessNotFound(u32),

    /// The OS refused the privilege required for the call
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Capability absent on this OS/build
    #[error("Unsupported capability: {0}")]
    Unsupported(Capability),

    #[error("Nothing to revert for process {0}")]
    NothingToRevert(u32),

    #[error("Partial revert for process {pid}: failed to restore {}", format_attributes(.failed))]
    PartialRevert { pid: u32, failed: Vec<Attribute> },

    /// System-critical processes and corewarden itself are never touched
    #[error("Refusing to act on protected process: {0}")]
    Protected(String),

    /// Raw OS failure, possibly transient
    #[error("OS error: {0}")]
    Os(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for corewarden
pub type Result<T> = std::result::Result<T, WardenError>;

fn format_attributes(attributes: &[Attribute]) -> String {
    attributes
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl WardenError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        WardenError::Config(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        WardenError::PermissionDenied(msg.into())
    }

    pub fn unsupported(capability: Capability) -> Self {
        WardenError::Unsupported(capability)
    }

    pub fn os<S: Into<String>>(msg: S) -> Self {
        WardenError::Os(msg.into())
    }

    pub fn protected<S: Into<String>>(name: S) -> Self {
        WardenError::Protected(name.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        WardenError::Other(msg.into())
    }

    /// Whether a retry of the same OS call may succeed.
    ///
    /// Only raw OS failures qualify: a missing process, a missing privilege or
    /// a missing capability will not change between attempts.
    pub fn is_transient(&self) -> bool {
        matches!(self, WardenError::Os(_))
    }

    /// The process is gone, either before or during the call
    pub fn is_process_gone(&self) -> bool {
        matches!(self, WardenError::ProcessNotFound(_))
    }
}
