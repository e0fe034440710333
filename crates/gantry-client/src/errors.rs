//! Error types for the control client.

use std::io;

use thiserror::Error;

use gantry_protocol::{EnvelopeError, ErrorInfo};

/// Errors surfaced by the client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to resolve the daemon's TCP address.
    #[error("failed to resolve daemon address {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Failed to establish the socket connection.
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Unix sockets are not available on this platform.
    #[cfg(not(unix))]
    #[error("unix socket transport is unsupported on this platform: {0}")]
    UnsupportedUnixTransport(String),
    /// The socket failed mid-exchange.
    #[error("connection to the daemon failed: {0}")]
    Io(#[from] io::Error),
    /// A wire envelope could not be encoded or decoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The daemon closed the connection before answering.
    #[error("daemon disconnected before sending a response")]
    Disconnected,
    /// The daemon answered with an error outcome.
    #[error(transparent)]
    Call(ErrorInfo),
    /// A typed stub received a result of the wrong shape.
    #[error("method <{method}> returned an unexpected value shape")]
    Shape { method: String },
}
