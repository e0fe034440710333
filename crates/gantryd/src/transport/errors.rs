//! Failure modes of the control socket.

use std::io;

use thiserror::Error;

/// Errors raised while opening or running the control socket.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured TCP host and port did not resolve.
    #[error("cannot resolve control address {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but yielded nothing to bind.
    #[error("control address {endpoint} resolved to no usable address")]
    NoAddress { endpoint: String },
    /// Binding the resolved address or socket path failed.
    #[error("cannot bind control socket {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    /// Switching the accept socket into polling mode failed.
    #[error("cannot configure control socket for polling: {0}")]
    Configure(#[source] io::Error),
    /// A live daemon already answers on the configured unix socket.
    #[cfg(unix)]
    #[error("another daemon is serving the control socket at {path}")]
    AlreadyServing { path: String },
    /// Something that is not a socket occupies the configured path.
    #[cfg(unix)]
    #[error("control socket path {path} is occupied by a non-socket file")]
    PathOccupied { path: String },
    /// An abandoned socket file could not be inspected or removed.
    #[cfg(unix)]
    #[error("cannot reclaim control socket {path}: {source}")]
    Reclaim {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Unix socket endpoints need a unix platform.
    #[cfg(not(unix))]
    #[error("unix control sockets are not supported on this platform")]
    UnixUnsupported,
    /// The accept thread exited by panicking.
    #[error("control socket accept thread panicked")]
    AcceptPanic,
}
