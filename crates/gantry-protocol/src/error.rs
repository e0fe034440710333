//! Error taxonomy carried across the wire.
//!
//! Server-side failures are not forwarded as concrete error types; only a
//! coarse [`ErrorKind`] plus a human-readable message crosses the wire, and
//! callers branch on the kind.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Coarse failure categories reported in a [`crate::CallResponse`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ErrorKind {
    /// The envelope was malformed or could not be decoded.
    Protocol,
    /// Invalid registration or daemon configuration.
    Config,
    /// Unknown endpoint or method name.
    NotFound,
    /// The endpoint exists but its hardware is not initialised.
    NotReady,
    /// Operator-lock contention on claim, release, or auto-claim.
    Conflict,
    /// The underlying hardware driver call itself failed.
    Hardware,
}

/// Error payload attached to a failed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ErrorInfo {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable description of the failure.
    pub message: String,
}

impl ErrorInfo {
    /// Creates an error payload from a kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a `Protocol` error payload.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Creates a `NotFound` error payload.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a `NotReady` error payload.
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotReady, message)
    }

    /// Creates a `Conflict` error payload.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Creates a `Hardware` error payload.
    pub fn hardware(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Hardware, message)
    }
}
