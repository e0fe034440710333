//! Socket transport for the control daemon.
//!
//! Binds the configured endpoint and accepts connections on a background
//! thread. Connections are long-lived: each one carries a stream of
//! newline-delimited call envelopes handled by the dispatch layer.

mod errors;
mod listener;
mod stream;

pub use self::errors::ListenerError;
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::stream::{ConnectionHandler, ConnectionStream};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
