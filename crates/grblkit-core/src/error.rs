//! Error handling for GrblKit
//!
//! Typed errors for the transport and protocol layers. Protocol-level
//! outcomes (an unacknowledged command, an unrecognized line) are not
//! errors: they surface as `bool` returns or are dropped silently by the
//! engine. The types here cover the faults that genuinely stop I/O.

use thiserror::Error;

/// Connection error type
///
/// Represents errors raised by the transport adapters: serial port,
/// TCP, and WebSocket connection issues.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Transport is not connected
    #[error("Not connected")]
    NotConnected,

    /// WebSocket error
    #[error("WebSocket error: {reason}")]
    WebSocketError {
        /// The reason for the WebSocket error.
        reason: String,
    },

    /// Serial port error
    #[error("Serial port error: {reason}")]
    SerialError {
        /// The reason for the serial port error.
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {reason}")]
    IoError {
        /// The reason for the I/O error.
        reason: String,
    },
}

/// Protocol error type
///
/// Reserved for callers that layer stricter handling on top of the
/// engine's silent-drop policy.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A response line could not be parsed
    #[error("Failed to parse response: {reason}")]
    ResponseParse {
        /// The reason the response parsing failed.
        reason: String,
    },

    /// Command was not acknowledged within the timeout
    #[error("Command not acknowledged after {timeout_ms}ms")]
    AckTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },
}

/// Main error type for GrblKit
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
