//! Error types for the RedBoxDb client.
//!
//! Every failure is a distinct variant so callers can tell apart "safe to
//! retry", "reconnect required", and "caller mistake, nothing was sent".

use std::time::Duration;

use thiserror::Error;

/// Client-side error types.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level connect was refused or the host was unreachable.
    #[error("Could not connect to RedBoxDb at {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The server closed the socket instead of acknowledging the handshake.
    #[error("Server rejected handshake for database '{database}' or disconnected")]
    HandshakeRejected { database: String },

    /// The stream ended while a frame was only partially read.
    #[error("Server disconnected mid-response (expected {expected} bytes, received {received})")]
    PeerClosed { expected: usize, received: usize },

    /// Vector length disagrees with the active session dimension.
    #[error("Vector dim {actual} != DB dim {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Operation attempted after `close()` or after a fatal error.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// No response within the configured bound.
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A previous request was abandoned before its response was consumed.
    #[error("Connection is desynchronized: a previous request did not complete")]
    Desynchronized,

    /// The server sent a response that violates the protocol.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// An argument cannot be represented on the wire.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Other I/O failure during communication.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

/// Whether an I/O error kind means the peer went away.
pub(crate) fn is_disconnect(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
    )
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        if is_disconnect(err.kind()) {
            // Byte counts are unknown here; the reader fills them in when it can
            ClientError::PeerClosed {
                expected: 0,
                received: 0,
            }
        } else {
            ClientError::Io(err)
        }
    }
}

impl ClientError {
    /// Failures after which retrying the operation (on a fresh connection) is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::ConnectFailed { .. } | ClientError::Timeout(_))
    }

    /// Failures that leave the connection unusable.
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            ClientError::PeerClosed { .. }
                | ClientError::HandshakeRejected { .. }
                | ClientError::Desynchronized
                | ClientError::ProtocolViolation(_)
                | ClientError::Timeout(_)
                | ClientError::Io(_)
        )
    }

    /// Failures caused by the caller where no bytes reached the socket.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ClientError::DimensionMismatch { .. }
                | ClientError::ConnectionClosed
                | ClientError::InvalidArgument(_)
        )
    }
}

/// Result alias used across the crate.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;
