// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Crate-level error type.
//!
//! Protocol failures seen by a peer are [`StatusCode`]s; this enum is what
//! the Rust API (server construction, config loading, socket setup) returns.

use crate::codec::EncodingError;
use crate::status::StatusCode;

/// Errors returned by the stack's Rust API.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration value is invalid.
    Config(String),
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
    /// Failed to bind the listening socket.
    BindFailed(String),

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Binary encoding or decoding failed.
    Encoding(EncodingError),
    /// Operation failed with a protocol status code.
    Status(StatusCode),

    /// Invalid state for the requested operation.
    InvalidState(String),
}

impl Error {
    /// Status code a peer would see for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Encoding(e) => e.status(),
            Error::Status(s) => *s,
            Error::InvalidState(_) => StatusCode::BAD_INVALID_STATE,
            Error::IoError(_) | Error::BindFailed(_) => StatusCode::BAD_COMMUNICATION_ERROR,
            Error::Config(_) | Error::ConfigFileNotFound(_) => StatusCode::BAD_INVALID_ARGUMENT,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::Encoding(e) => write!(f, "Encoding error: {}", e),
            Error::Status(s) => write!(f, "Status: {}", s),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

impl From<EncodingError> for Error {
    fn from(e: EncodingError) -> Self {
        Error::Encoding(e)
    }
}

impl From<StatusCode> for Error {
    fn from(s: StatusCode) -> Self {
        Error::Status(s)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let e: Error = EncodingError::InvalidData("x".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_DECODING_ERROR);
        let e: Error = StatusCode::BAD_TOO_MANY_SESSIONS.into();
        assert_eq!(e.status(), StatusCode::BAD_TOO_MANY_SESSIONS);
    }

    #[test]
    fn test_io_source() {
        use std::error::Error as _;
        let e: Error = std::io::Error::other("boom").into();
        assert!(e.source().is_some());
        assert!(e.to_string().contains("boom"));
    }
}
