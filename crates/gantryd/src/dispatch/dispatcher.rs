//! Request dispatch pipeline.
//!
//! Each decoded request runs through the same steps: lock-management
//! pseudo-methods are answered directly, everything else resolves an
//! endpoint, passes the readiness gate, is classified against the endpoint's
//! capability sets, auto-claims the operator lock for operation methods, and
//! finally invokes the declared method. Whatever happens, the diagnostics
//! accumulated along the way are drained into the response, and no failure
//! short of an IO error ever escapes to the serving loop.

use serde_json::Value;
use tracing::debug;

use gantry_protocol::{CallRequest, CallResponse, ErrorInfo};

use crate::endpoints::CallArgs;

use super::lock::OperatorLock;
use super::registry::EndpointRegistry;
use super::relay::DiagnosticRelay;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Lock-management methods served by the server-global pseudo-endpoint.
pub(crate) const PSEUDO_METHODS: &[&str] = &["is_operator", "claim_operator", "release_operator"];

/// True when `method` is a lock-management pseudo-method.
pub(crate) fn is_pseudo_method(method: &str) -> bool {
    PSEUDO_METHODS.contains(&method)
}

/// Serves call requests against the registry and operator lock.
pub struct Dispatcher {
    registry: EndpointRegistry,
    lock: OperatorLock,
    relay: DiagnosticRelay,
}

enum MethodClass {
    Telemetry,
    Operation,
}

impl Dispatcher {
    /// Creates a dispatcher owning the given registry, with an unclaimed lock.
    #[must_use]
    pub fn new(registry: EndpointRegistry) -> Self {
        Self {
            registry,
            lock: OperatorLock::new(),
            relay: DiagnosticRelay::new(),
        }
    }

    /// Registered endpoint names, for startup reporting.
    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    /// Handles one request end to end, producing exactly one response.
    pub fn handle(&mut self, request: &CallRequest) -> CallResponse {
        debug!(
            target: DISPATCH_TARGET,
            caller = %request.caller_id,
            endpoint = %request.endpoint,
            method = %request.method,
            "dispatching request"
        );
        let outcome = self.execute(request);
        let log_records = self.relay.drain();
        match outcome {
            Ok(value) => CallResponse::result(log_records, value),
            Err(error) => {
                debug!(
                    target: DISPATCH_TARGET,
                    method = %request.method,
                    kind = %error.kind,
                    "request failed: {}", error.message
                );
                CallResponse::error(log_records, error)
            }
        }
    }

    fn execute(&mut self, request: &CallRequest) -> Result<Value, ErrorInfo> {
        if let Err(error) = request.validate() {
            return Err(error.to_error_info());
        }

        // Lock management bypasses endpoint resolution entirely.
        match request.method.as_str() {
            "is_operator" => {
                return Ok(Value::Bool(self.lock.is_operator(&request.caller_id)));
            }
            "claim_operator" => {
                let call = CallArgs::new(&request.args, &request.kwargs);
                let force = call
                    .opt_bool(0, "force")
                    .map_err(|error| ErrorInfo::protocol(error.to_string()))?
                    .unwrap_or(false);
                self.lock
                    .claim(&request.caller_id, force, &self.relay)
                    .map_err(|error| ErrorInfo::conflict(error.to_string()))?;
                return Ok(Value::Null);
            }
            "release_operator" => {
                self.lock
                    .release(&request.caller_id, &self.relay)
                    .map_err(|error| ErrorInfo::conflict(error.to_string()))?;
                return Ok(Value::Null);
            }
            _ => {}
        }

        self.dispatch_endpoint(request)
    }

    fn dispatch_endpoint(&mut self, request: &CallRequest) -> Result<Value, ErrorInfo> {
        let Some(endpoint) = self.registry.lookup_mut(&request.endpoint) else {
            return Err(ErrorInfo::not_found(format!(
                "endpoint [{}] is not registered",
                request.endpoint
            )));
        };

        // Readiness probes are handle queries, not hardware calls; they stay
        // answerable while the endpoint is uninitialised.
        match request.method.as_str() {
            "is_initialized" => return Ok(Value::Bool(endpoint.is_initialized())),
            "is_dummy" => return Ok(Value::Bool(endpoint.is_dummy())),
            _ => {}
        }

        if !endpoint.is_initialized() {
            return Err(ErrorInfo::not_ready(format!(
                "endpoint [{}] is not initialized",
                request.endpoint
            )));
        }

        let class = if endpoint.telemetry_methods().contains(&request.method.as_str()) {
            MethodClass::Telemetry
        } else if endpoint.operation_methods().contains(&request.method.as_str()) {
            MethodClass::Operation
        } else {
            return Err(ErrorInfo::not_found(format!(
                "method <{}> of endpoint [{}] not recognized",
                request.method, request.endpoint
            )));
        };

        if matches!(class, MethodClass::Operation) {
            // Auto-claim: the first operation caller becomes operator without
            // an explicit claim step; contention fails before the driver runs.
            self.lock
                .claim(&request.caller_id, false, &self.relay)
                .map_err(|error| ErrorInfo::conflict(error.to_string()))?;
        }

        let call = CallArgs::new(&request.args, &request.kwargs);
        endpoint
            .invoke(&request.method, &call, &self.relay)
            .map_err(|error| ErrorInfo::hardware(error.to_string()))
    }
}
