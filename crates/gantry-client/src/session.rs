//! Client session: one connection, one caller identity.
//!
//! The session writes one envelope per call and blocks for the single
//! response line. Diagnostic records carried back by the response are
//! replayed through `tracing` before the outcome is surfaced, so remote
//! driver chatter appears in the local log as if it happened here.

use std::io::Write;

use serde_json::{Map, Value, json};

use gantry_config::SocketEndpoint;
use gantry_protocol::{CallRequest, CallResponse, EnvelopeReader, LogRecord, Severity};

use crate::errors::ClientError;
use crate::transport::{Connection, connect};

const REPLAY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::replay");

/// Session with a running control daemon.
pub struct GantryClient {
    connection: Connection,
    reader: EnvelopeReader,
    caller_id: String,
}

impl GantryClient {
    /// Connects to the daemon at `endpoint`.
    ///
    /// The caller identity is `hostname@pid`, matching what the operator
    /// lock displays to other clients.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the connection cannot be established.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, ClientError> {
        let connection = connect(endpoint)?;
        Ok(Self {
            connection,
            reader: EnvelopeReader::new(),
            caller_id: format!("{}@{}", hostname(), std::process::id()),
        })
    }

    /// Identity this session presents to the daemon.
    #[must_use]
    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    /// Performs one remote call and returns its result value.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Call`] when the daemon reports an error
    /// outcome, and transport or envelope errors when the exchange fails.
    pub fn call(
        &mut self,
        endpoint: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, ClientError> {
        let request = CallRequest::new(&self.caller_id, endpoint, method)
            .with_args(args)
            .with_kwargs(kwargs);
        let line = request.encode()?;
        self.connection.write_all(&line)?;
        self.connection.flush()?;

        let Some(line) = self.reader.next_line(&mut self.connection)? else {
            return Err(ClientError::Disconnected);
        };
        let response = CallResponse::decode(&line)?;

        for record in &response.log_records {
            replay_record(record);
        }

        match response.outcome {
            gantry_protocol::Outcome::Result(value) => Ok(value),
            gantry_protocol::Outcome::Error(error) => Err(ClientError::Call(error)),
        }
    }

    /// Convenience call with positional arguments only.
    ///
    /// # Errors
    ///
    /// Same as [`GantryClient::call`].
    pub fn call_args(
        &mut self,
        endpoint: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, ClientError> {
        self.call(endpoint, method, args, Map::new())
    }

    /// True when this session currently holds the operator lock.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange fails.
    pub fn is_operator(&mut self) -> Result<bool, ClientError> {
        let value = self.call_args("", "is_operator", Vec::new())?;
        value.as_bool().ok_or(ClientError::Shape {
            method: "is_operator".to_string(),
        })
    }

    /// Claims the operator lock, optionally forcing it away from a stale
    /// holder.
    ///
    /// # Errors
    ///
    /// Returns a conflict [`ClientError::Call`] when another client holds
    /// the lock and `force` is false.
    pub fn claim_operator(&mut self, force: bool) -> Result<(), ClientError> {
        let args = if force { vec![json!(true)] } else { Vec::new() };
        self.call_args("", "claim_operator", args).map(|_| ())
    }

    /// Releases the operator lock held by this session.
    ///
    /// # Errors
    ///
    /// Returns a conflict [`ClientError::Call`] when another client holds
    /// the lock.
    pub fn release_operator(&mut self) -> Result<(), ClientError> {
        self.call_args("", "release_operator", Vec::new())
            .map(|_| ())
    }
}

impl Drop for GantryClient {
    fn drop(&mut self) {
        // Best-effort release so an exiting control process does not leave
        // the bench locked. Errors are irrelevant at this point.
        let _ = self.call_args("", "release_operator", Vec::new());
    }
}

fn replay_record(record: &LogRecord) {
    match record.severity {
        Severity::Debug => tracing::debug!(
            target: REPLAY_TARGET,
            source = %record.source,
            remote_timestamp = record.timestamp,
            "{}", record.message
        ),
        Severity::Info => tracing::info!(
            target: REPLAY_TARGET,
            source = %record.source,
            remote_timestamp = record.timestamp,
            "{}", record.message
        ),
        Severity::Warning => tracing::warn!(
            target: REPLAY_TARGET,
            source = %record.source,
            remote_timestamp = record.timestamp,
            "{}", record.message
        ),
        Severity::Error => tracing::error!(
            target: REPLAY_TARGET,
            source = %record.source,
            remote_timestamp = record.timestamp,
            "{}", record.message
        ),
    }
}

fn hostname() -> String {
    #[cfg(unix)]
    {
        let mut buffer = [0_u8; 256];
        // SAFETY: the buffer is valid for writes of its full length for the
        // duration of the call.
        let rc = unsafe { libc::gethostname(buffer.as_mut_ptr().cast(), buffer.len()) };
        if rc == 0 {
            let end = buffer
                .iter()
                .position(|byte| *byte == 0)
                .unwrap_or(buffer.len());
            if let Ok(name) = std::str::from_utf8(&buffer[..end])
                && !name.is_empty()
            {
                return name.to_string();
            }
        }
    }
    "localhost".to_string()
}
