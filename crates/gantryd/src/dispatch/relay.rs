//! Bounded drain-on-read buffer for per-request diagnostics.
//!
//! Diagnostics raised while a request executes are buffered here, then
//! drained into that request's response so the remote caller can replay them
//! locally. The buffer is lossy by design: on overflow the oldest records are
//! dropped first. Records never cross request boundaries because the server
//! processes one request at a time.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use gantry_protocol::{LogRecord, Severity};

pub(crate) const RELAY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::relay");

/// Default record capacity, matching the bench controller's backlog size.
pub const RELAY_CAPACITY: usize = 1024;

/// Bounded FIFO of diagnostic records raised during one request.
#[derive(Debug)]
pub struct DiagnosticRelay {
    records: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
}

impl Default for DiagnosticRelay {
    fn default() -> Self {
        Self::with_capacity(RELAY_CAPACITY)
    }
}

impl DiagnosticRelay {
    /// Creates a relay with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a relay holding at most `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a record, dropping the oldest one when full.
    pub fn record(&self, record: LogRecord) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Atomically returns and clears the buffered records, oldest first.
    pub fn drain(&self) -> Vec<LogRecord> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        records.drain(..).collect()
    }

    /// Records an info-level event and mirrors it to the daemon log.
    pub fn info(&self, source: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: RELAY_TARGET, source, "{message}");
        self.record(LogRecord::new(Severity::Info, source, message));
    }

    /// Records a warning event and mirrors it to the daemon log.
    pub fn warn(&self, source: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(target: RELAY_TARGET, source, "{message}");
        self.record(LogRecord::new(Severity::Warning, source, message));
    }

    /// Records an error event and mirrors it to the daemon log.
    pub fn error(&self, source: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(target: RELAY_TARGET, source, "{message}");
        self.record(LogRecord::new(Severity::Error, source, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_records_in_order_and_clears() {
        let relay = DiagnosticRelay::new();
        relay.info("psu", "first");
        relay.warn("psu", "second");

        let drained = relay.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "first");
        assert_eq!(drained[0].severity, Severity::Info);
        assert_eq!(drained[1].severity, Severity::Warning);

        assert!(relay.drain().is_empty());
    }

    #[test]
    fn overflow_drops_oldest_records_first() {
        let relay = DiagnosticRelay::with_capacity(3);
        for index in 0..5 {
            relay.info("motion", format!("record-{index}"));
        }

        let drained = relay.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].message, "record-2");
        assert_eq!(drained[2].message, "record-4");
    }

    #[test]
    fn records_carry_their_source() {
        let relay = DiagnosticRelay::new();
        relay.error("camera", "capture device unavailable");
        let drained = relay.drain();
        assert_eq!(drained[0].source, "camera");
        assert_eq!(drained[0].severity, Severity::Error);
    }
}
