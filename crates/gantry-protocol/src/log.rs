//! Structured diagnostic records shipped back inside call responses.
//!
//! Records are created while a request executes, buffered server-side, and
//! drained into that request's response. They never persist beyond one round
//! trip; the client is expected to re-emit them locally.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity of a diagnostic record, mirroring the daemon's tracing levels.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// One diagnostic event produced while handling a single request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Severity of the event.
    pub severity: Severity,
    /// Event message text.
    pub message: String,
    /// Component that produced the event.
    pub source: String,
    /// Unix timestamp in seconds at creation time.
    pub timestamp: f64,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(severity: Severity, source: impl Into<String>, message: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        Self {
            severity,
            message: message.into(),
            source: source.into(),
            timestamp,
        }
    }
}
