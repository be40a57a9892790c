// SPDX-License-Identifier: MPL-2.0

//! Error types for the capability screens

use crate::backends::{BackendError, Capability};
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capability session errors
    Session(SessionError),
    /// Backend adapter errors outside a session (device listing, setup)
    Backend(BackendError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Errors surfaced by a capture session to its screen
///
/// None of these are fatal: the presenter maps each one to a view state
/// or a transient notice.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The capability is not authorized
    PermissionDenied(Capability),
    /// No device or platform service backs the capability
    CapabilityUnavailable(String),
    /// A single fix did not arrive in time
    StreamTimeout,
    /// The stream failed or ended while open
    StreamError(String),
    /// A single fix was requested while a watch is running
    Busy,
}

impl SessionError {
    /// Map an adapter error raised while using `capability`
    pub fn from_backend(capability: Capability, err: BackendError) -> Self {
        match err {
            BackendError::PermissionDenied(_) => SessionError::PermissionDenied(capability),
            BackendError::NotAvailable(msg) | BackendError::DeviceNotFound(msg) => {
                SessionError::CapabilityUnavailable(msg)
            }
            BackendError::Timeout => SessionError::StreamTimeout,
            other => SessionError::StreamError(other.to_string()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Session(e) => write!(f, "Session error: {}", e),
            AppError::Backend(e) => write!(f, "Backend error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::PermissionDenied(capability) => {
                write!(f, "Permission denied for {}", capability)
            }
            SessionError::CapabilityUnavailable(msg) => {
                write!(f, "Capability unavailable: {}", msg)
            }
            SessionError::StreamTimeout => write!(f, "Timed out waiting for a result"),
            SessionError::StreamError(msg) => write!(f, "Stream error: {}", msg),
            SessionError::Busy => write!(f, "Another request is already running"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SessionError {}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Backend(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
