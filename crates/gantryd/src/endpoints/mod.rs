//! Hardware endpoint capability surface.
//!
//! Each remote-controllable subsystem implements [`Endpoint`]: it advertises
//! two disjoint method-name sets, answers a readiness probe, and routes wire
//! method names to ordinary declared methods through [`Endpoint::invoke`].
//! The dispatcher never touches endpoint internals directly; all mutation
//! happens through method invocations.
//!
//! The implementations in this crate are simulated drivers. They keep the
//! full method surface and state model of the physical devices (frame
//! capture, 3-axis motion, HV/LV board, auxiliary I/O, bench power supply,
//! waveform digitizer)
//! but back them with deterministic in-memory state, matching the original
//! test stand's "dummy" device mode. The real register-level plumbing is an
//! external collaborator and stays out of this crate.

mod camera;
mod drs;
mod hvlv;
mod motion;
mod psu;
mod senaux;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::dispatch::DiagnosticRelay;

pub use camera::CameraEndpoint;
pub use drs::DrsEndpoint;
pub use hvlv::HvlvEndpoint;
pub use motion::MotionEndpoint;
pub use psu::PowerSupplyEndpoint;
pub use senaux::SenAuxEndpoint;

/// Capability interface the dispatcher requires from every endpoint.
pub trait Endpoint: Send {
    /// Unique endpoint name within the registry.
    fn name(&self) -> &str;

    /// Read-only methods, safely callable by any client.
    fn telemetry_methods(&self) -> &'static [&'static str];

    /// Mutating methods reserved for the current operator.
    fn operation_methods(&self) -> &'static [&'static str];

    /// True once the underlying hardware handles are initialised.
    fn is_initialized(&self) -> bool;

    /// True when the endpoint is backed by a stand-in rather than hardware.
    fn is_dummy(&self) -> bool {
        false
    }

    /// True when `method` is routable by [`Endpoint::invoke`].
    ///
    /// The registry probes every advertised name through this at registration
    /// time so a missing method is a startup failure, not a first-call one.
    fn supports(&self, method: &str) -> bool;

    /// Invokes a declared method by its wire name.
    ///
    /// Called only with names the endpoint advertises. Diagnostics for the
    /// caller go through `relay`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when arguments are unusable or the driver
    /// call fails; the dispatcher reports these as hardware errors.
    fn invoke(
        &mut self,
        method: &str,
        call: &CallArgs<'_>,
        relay: &DiagnosticRelay,
    ) -> Result<Value, EndpointError>;
}

/// Positional and keyword arguments of one invocation.
///
/// Extractors accept a value either at its positional index or under its
/// keyword name, so clients may use whichever form is convenient.
#[derive(Debug, Clone, Copy)]
pub struct CallArgs<'a> {
    args: &'a [Value],
    kwargs: &'a Map<String, Value>,
}

impl<'a> CallArgs<'a> {
    /// Wraps a request's argument lists.
    #[must_use]
    pub fn new(args: &'a [Value], kwargs: &'a Map<String, Value>) -> Self {
        Self { args, kwargs }
    }

    fn lookup(&self, index: usize, name: &str) -> Option<&'a Value> {
        self.args.get(index).or_else(|| self.kwargs.get(name))
    }

    /// Raw value of an argument, if supplied.
    #[must_use]
    pub fn value(&self, index: usize, name: &str) -> Option<&'a Value> {
        self.lookup(index, name)
    }

    /// Required floating-point argument.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidArgument`] when missing or not numeric.
    pub fn f64(&self, index: usize, name: &str) -> Result<f64, EndpointError> {
        self.lookup(index, name)
            .and_then(Value::as_f64)
            .ok_or_else(|| EndpointError::invalid_argument(name, "expected a number"))
    }

    /// Required integer argument.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidArgument`] when missing or not an integer.
    pub fn i64(&self, index: usize, name: &str) -> Result<i64, EndpointError> {
        self.lookup(index, name)
            .and_then(Value::as_i64)
            .ok_or_else(|| EndpointError::invalid_argument(name, "expected an integer"))
    }

    /// Required boolean argument.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidArgument`] when missing or not a boolean.
    pub fn bool(&self, index: usize, name: &str) -> Result<bool, EndpointError> {
        self.lookup(index, name)
            .and_then(Value::as_bool)
            .ok_or_else(|| EndpointError::invalid_argument(name, "expected a boolean"))
    }

    /// Required string argument.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidArgument`] when missing or not a string.
    pub fn str(&self, index: usize, name: &str) -> Result<&'a str, EndpointError> {
        self.lookup(index, name)
            .and_then(Value::as_str)
            .ok_or_else(|| EndpointError::invalid_argument(name, "expected a string"))
    }

    /// Optional boolean argument.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::InvalidArgument`] when present but not a boolean.
    pub fn opt_bool(&self, index: usize, name: &str) -> Result<Option<bool>, EndpointError> {
        match self.lookup(index, name) {
            None => Ok(None),
            Some(value) => value
                .as_bool()
                .map(Some)
                .ok_or_else(|| EndpointError::invalid_argument(name, "expected a boolean")),
        }
    }
}

/// Errors raised by endpoint method invocations.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// An argument was missing or had the wrong type.
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// The simulated or physical driver rejected the call.
    #[error("{0}")]
    Driver(String),
}

impl EndpointError {
    /// Creates an invalid-argument error.
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a driver-failure error.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }
}

/// Reads the shared `dummy` flag from a `reset_devices` configuration value.
pub(crate) fn config_dummy_flag(config: &Value) -> bool {
    config
        .get("dummy")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn args_resolve_positionally_then_by_keyword() {
        let args = vec![json!(1)];
        let mut kwargs = Map::new();
        kwargs.insert("value".into(), json!(12.0));
        let call = CallArgs::new(&args, &kwargs);

        assert_eq!(call.i64(0, "channel").expect("channel"), 1);
        assert_eq!(call.f64(1, "value").expect("value"), 12.0);
    }

    #[test]
    fn positional_takes_precedence_over_keyword() {
        let args = vec![json!(3)];
        let mut kwargs = Map::new();
        kwargs.insert("channel".into(), json!(1));
        let call = CallArgs::new(&args, &kwargs);

        assert_eq!(call.i64(0, "channel").expect("channel"), 3);
    }

    #[test]
    fn missing_required_argument_is_rejected() {
        let args = Vec::new();
        let kwargs = Map::new();
        let call = CallArgs::new(&args, &kwargs);

        let error = call.f64(0, "value").expect_err("should reject");
        assert!(matches!(error, EndpointError::InvalidArgument { .. }));
    }

    #[test]
    fn optional_bool_distinguishes_absent_from_mistyped() {
        let args = vec![json!("yes")];
        let kwargs = Map::new();
        let call = CallArgs::new(&args, &kwargs);

        assert!(call.opt_bool(0, "force").is_err());
        assert_eq!(call.opt_bool(1, "other").expect("absent"), None);
    }
}
