//! Request and response envelopes with JSONL encode/decode.
//!
//! A request names the caller, the target endpoint, the method, and its
//! positional/keyword arguments. Argument values are structurally transparent
//! JSON data: numbers, strings, booleans, ordered sequences, and string-keyed
//! mappings; coordinate or voltage tuples travel as fixed-length arrays.
//!
//! A response carries the diagnostic records accumulated while serving the
//! request plus exactly one of a return value or an error, enforced by the
//! [`Outcome`] enum.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ErrorInfo;
use crate::log::LogRecord;

/// Upper bound on a single serialised envelope, framing newline included.
pub const MAX_ENVELOPE_BYTES: usize = 1024 * 1024;

/// A remote method invocation sent from a client to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Stable identifier of the calling process or session.
    pub caller_id: String,
    /// Target endpoint name; the empty string addresses the server-global
    /// pseudo-endpoint used for operator-lock management.
    #[serde(default)]
    pub endpoint: String,
    /// Wire name of the method to invoke.
    pub method: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl CallRequest {
    /// Creates a request without arguments.
    pub fn new(
        caller_id: impl Into<String>,
        endpoint: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            caller_id: caller_id.into(),
            endpoint: endpoint.into(),
            method: method.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Replaces the positional arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Replaces the keyword arguments.
    #[must_use]
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Parses a JSONL line into a request.
    ///
    /// Trailing whitespace (including the newline delimiter) is trimmed before
    /// parsing.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] if the line is empty or is not
    /// valid JSON matching the request schema.
    pub fn decode(line: &[u8]) -> Result<Self, EnvelopeError> {
        decode_line(line)
    }

    /// Serialises the request as one JSONL line.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Serialize`] if serialisation fails or
    /// [`EnvelopeError::TooLarge`] if the line exceeds [`MAX_ENVELOPE_BYTES`].
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        encode_line(self)
    }

    /// Validates that required fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidStructure`] when the method or caller
    /// field is empty.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.method.trim().is_empty() {
            return Err(EnvelopeError::invalid_structure("method field is empty"));
        }
        if self.caller_id.trim().is_empty() {
            return Err(EnvelopeError::invalid_structure("caller_id field is empty"));
        }
        Ok(())
    }
}

/// Mutually exclusive result of a call: a return value or an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The call completed and returned this value (possibly null).
    Result(Value),
    /// The call failed.
    Error(ErrorInfo),
}

/// The daemon's answer to one [`CallRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Diagnostics accumulated while serving the request, oldest first.
    #[serde(default)]
    pub log_records: Vec<LogRecord>,
    /// Return value or error, exactly one of the two.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl CallResponse {
    /// Creates a successful response.
    pub fn result(log_records: Vec<LogRecord>, value: Value) -> Self {
        Self {
            log_records,
            outcome: Outcome::Result(value),
        }
    }

    /// Creates a failed response.
    pub fn error(log_records: Vec<LogRecord>, error: ErrorInfo) -> Self {
        Self {
            log_records,
            outcome: Outcome::Error(error),
        }
    }

    /// True when the response carries an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Parses a JSONL line into a response.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] if the line is empty or is not
    /// valid JSON matching the response schema.
    pub fn decode(line: &[u8]) -> Result<Self, EnvelopeError> {
        decode_line(line)
    }

    /// Serialises the response as one JSONL line.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Serialize`] if serialisation fails or
    /// [`EnvelopeError::TooLarge`] if the line exceeds [`MAX_ENVELOPE_BYTES`].
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        encode_line(self)
    }
}

/// Errors surfaced while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Line could not be parsed as valid JSON of the expected schema.
    #[error("malformed envelope: {message}")]
    Malformed {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Envelope JSON parsed but violates a structural invariant.
    #[error("invalid envelope structure: {message}")]
    InvalidStructure { message: String },

    /// Envelope exceeds the maximum allowed size.
    #[error("envelope too large: {size} bytes exceeds {max} byte limit")]
    TooLarge { size: usize, max: usize },

    /// Envelope serialisation failed.
    #[error("failed to serialise envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    /// IO error while reading a framed line.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvelopeError {
    /// Creates a malformed-envelope error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an invalid-structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates a too-large error.
    pub fn too_large(size: usize) -> Self {
        Self::TooLarge {
            size,
            max: MAX_ENVELOPE_BYTES,
        }
    }

    /// Converts this failure into the wire error payload.
    ///
    /// All envelope failures map to the protocol kind; they are fatal to the
    /// affected request only, never to the serving process.
    #[must_use]
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::protocol(self.to_string())
    }
}

fn decode_line<T: serde::de::DeserializeOwned>(line: &[u8]) -> Result<T, EnvelopeError> {
    let trimmed = trim_trailing_whitespace(line);
    if trimmed.is_empty() {
        return Err(EnvelopeError::malformed("empty envelope line"));
    }
    serde_json::from_slice(trimmed).map_err(|source| EnvelopeError::Malformed {
        message: source.to_string(),
        source: Some(source),
    })
}

fn encode_line<T: Serialize>(envelope: &T) -> Result<Vec<u8>, EnvelopeError> {
    let mut line = serde_json::to_vec(envelope)?;
    line.push(b'\n');
    if line.len() > MAX_ENVELOPE_BYTES {
        return Err(EnvelopeError::too_large(line.len()));
    }
    Ok(line)
}

fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::log::Severity;

    use super::*;

    fn nested_request() -> CallRequest {
        let mut kwargs = Map::new();
        kwargs.insert("speed".into(), json!([10.0, 10.0, 2.5]));
        kwargs.insert(
            "options".into(),
            json!({"relative": false, "label": "scan-4", "retries": 3}),
        );
        CallRequest::new("bench@1234", "gantry", "move_to")
            .with_args(vec![json!(10.5), json!(22.25), json!(3.0)])
            .with_kwargs(kwargs)
    }

    #[test]
    fn request_round_trips_nested_values() {
        let request = nested_request();
        let line = request.encode().expect("encode request");
        assert!(line.ends_with(b"\n"));
        let back = CallRequest::decode(&line).expect("decode request");
        assert_eq!(back, request);
    }

    #[test]
    fn response_round_trips_result_and_records() {
        let response = CallResponse::result(
            vec![LogRecord::new(Severity::Info, "gantry", "motion complete")],
            json!([10.5, 22.25, 3.0]),
        );
        let line = response.encode().expect("encode response");
        let back = CallResponse::decode(&line).expect("decode response");
        assert_eq!(back, response);
    }

    #[test]
    fn response_serialises_result_xor_error() {
        let ok = CallResponse::result(Vec::new(), json!(12.0));
        let ok_json: Value =
            serde_json::from_slice(&ok.encode().expect("encode")).expect("parse");
        assert!(ok_json.get("result").is_some());
        assert!(ok_json.get("error").is_none());

        let failed = CallResponse::error(
            Vec::new(),
            ErrorInfo::new(ErrorKind::Conflict, "operator is claimed"),
        );
        let failed_json: Value =
            serde_json::from_slice(&failed.encode().expect("encode")).expect("parse");
        assert!(failed_json.get("result").is_none());
        assert!(failed_json.get("error").is_some());
        assert!(failed.is_error());
    }

    #[test]
    fn decode_rejects_empty_line() {
        let error = CallRequest::decode(b"  \n").expect_err("should reject");
        assert!(matches!(error, EnvelopeError::Malformed { .. }));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let error = CallRequest::decode(b"not json\n").expect_err("should reject");
        assert!(matches!(error, EnvelopeError::Malformed { .. }));
    }

    #[test]
    fn decode_trims_trailing_whitespace() {
        let request = CallRequest::new("bench@1", "", "is_operator");
        let mut line = request.encode().expect("encode");
        line.extend_from_slice(b"  \r\n");
        let back = CallRequest::decode(&line).expect("decode padded line");
        assert_eq!(back, request);
    }

    #[test]
    fn validate_rejects_empty_method() {
        let request = CallRequest::new("bench@1", "psu", "  ");
        let error = request.validate().expect_err("should reject");
        assert!(matches!(error, EnvelopeError::InvalidStructure { .. }));
    }

    #[test]
    fn validate_rejects_empty_caller() {
        let request = CallRequest::new("", "psu", "get_voltage");
        assert!(request.validate().is_err());
    }

    #[test]
    fn malformed_maps_to_protocol_kind() {
        let error = CallRequest::decode(b"{").expect_err("should reject");
        assert_eq!(error.to_error_info().kind, ErrorKind::Protocol);
    }

    #[test]
    fn decoded_floats_are_lossless() {
        let request = CallRequest::new("bench@1", "psu", "set_voltage")
            .with_args(vec![json!(1), json!(12.0625)]);
        let line = request.encode().expect("encode");
        let back = CallRequest::decode(&line).expect("decode");
        assert_eq!(back.args[1].as_f64(), Some(12.0625));
    }
}
