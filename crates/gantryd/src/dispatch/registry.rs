//! Endpoint registry with fail-fast capability validation.
//!
//! The registry exclusively owns the endpoint handles for the daemon's
//! lifetime. Registration validates the advertised capability sets up front:
//! a duplicate endpoint name, a method advertised in both sets, a reserved
//! name, or an advertised method the handle cannot route is a fatal startup
//! error rather than a surprise at first call.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::endpoints::Endpoint;

use super::dispatcher::is_pseudo_method;

/// Method names every endpoint answers implicitly as telemetry.
pub(crate) const IMPLICIT_TELEMETRY: &[&str] = &["is_initialized", "is_dummy"];

/// Owns and indexes the endpoint handles served by one dispatcher.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<String, Box<dyn Endpoint>>,
}

/// Registration failures; all are configuration errors fatal to startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two endpoints share one name.
    #[error("duplicate endpoint name [{name}]")]
    DuplicateName { name: String },

    /// Endpoint name is reserved (the empty string addresses the
    /// server-global pseudo-endpoint).
    #[error("endpoint name may not be empty")]
    ReservedName,

    /// A method appears in both the telemetry and the operation set, making
    /// its lock classification ambiguous.
    #[error("endpoint [{endpoint}] advertises <{method}> in both capability sets")]
    AmbiguousMethod { endpoint: String, method: String },

    /// A method name collides with a lock-management pseudo-method or an
    /// implicit telemetry name.
    #[error("endpoint [{endpoint}] advertises reserved method name <{method}>")]
    ReservedMethod { endpoint: String, method: String },

    /// An advertised method is not routable on the handle.
    #[error("endpoint [{endpoint}] advertises <{method}> but cannot route it")]
    MissingMethod { endpoint: String, method: String },
}

impl EndpointRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an endpoint handle after validating its capability sets.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the name collides, a capability set is
    /// ambiguous or reserved, or an advertised method is not routable.
    pub fn register(&mut self, endpoint: Box<dyn Endpoint>) -> Result<(), RegistryError> {
        let name = endpoint.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::ReservedName);
        }
        if self.endpoints.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        validate_capabilities(endpoint.as_ref())?;
        self.endpoints.insert(name, endpoint);
        Ok(())
    }

    /// Mutable handle lookup by endpoint name.
    #[must_use]
    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut (dyn Endpoint + 'static)> {
        self.endpoints.get_mut(name).map(Box::as_mut)
    }

    /// Registered endpoint names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// True when no endpoint is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn validate_capabilities(endpoint: &dyn Endpoint) -> Result<(), RegistryError> {
    let telemetry = endpoint.telemetry_methods();
    let operations = endpoint.operation_methods();

    for method in telemetry.iter().chain(operations) {
        if is_pseudo_method(method) || IMPLICIT_TELEMETRY.contains(method) {
            return Err(RegistryError::ReservedMethod {
                endpoint: endpoint.name().to_string(),
                method: (*method).to_string(),
            });
        }
        if !endpoint.supports(method) {
            return Err(RegistryError::MissingMethod {
                endpoint: endpoint.name().to_string(),
                method: (*method).to_string(),
            });
        }
    }

    for method in telemetry {
        if operations.contains(method) {
            return Err(RegistryError::AmbiguousMethod {
                endpoint: endpoint.name().to_string(),
                method: (*method).to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::dispatch::DiagnosticRelay;
    use crate::endpoints::{CallArgs, EndpointError};

    use super::*;

    /// Minimal configurable endpoint for registry validation tests.
    struct ProbeEndpoint {
        name: &'static str,
        telemetry: &'static [&'static str],
        operations: &'static [&'static str],
        routable: &'static [&'static str],
    }

    impl Endpoint for ProbeEndpoint {
        fn name(&self) -> &str {
            self.name
        }

        fn telemetry_methods(&self) -> &'static [&'static str] {
            self.telemetry
        }

        fn operation_methods(&self) -> &'static [&'static str] {
            self.operations
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn supports(&self, method: &str) -> bool {
            self.routable.contains(&method)
        }

        fn invoke(
            &mut self,
            _method: &str,
            _call: &CallArgs<'_>,
            _relay: &DiagnosticRelay,
        ) -> Result<Value, EndpointError> {
            Ok(Value::Null)
        }
    }

    fn probe(
        name: &'static str,
        telemetry: &'static [&'static str],
        operations: &'static [&'static str],
        routable: &'static [&'static str],
    ) -> Box<dyn Endpoint> {
        Box::new(ProbeEndpoint {
            name,
            telemetry,
            operations,
            routable,
        })
    }

    #[test]
    fn registers_valid_endpoints() {
        let mut registry = EndpointRegistry::new();
        registry
            .register(probe("psu", &["get_voltage"], &["set_voltage"], &[
                "get_voltage",
                "set_voltage",
            ]))
            .expect("register psu");
        registry
            .register(probe("camera", &["get_frame"], &[], &["get_frame"]))
            .expect("register camera");

        assert_eq!(registry.len(), 2);
        assert!(registry.lookup_mut("psu").is_some());
        assert!(registry.lookup_mut("digitizer").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = EndpointRegistry::new();
        registry
            .register(probe("psu", &[], &[], &[]))
            .expect("first registration");
        let error = registry
            .register(probe("psu", &[], &[], &[]))
            .expect_err("should reject duplicate");
        assert!(matches!(error, RegistryError::DuplicateName { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rejects_empty_endpoint_name() {
        let mut registry = EndpointRegistry::new();
        let error = registry
            .register(probe("", &[], &[], &[]))
            .expect_err("should reject empty name");
        assert!(matches!(error, RegistryError::ReservedName));
    }

    #[test]
    fn rejects_unroutable_advertised_method() {
        let mut registry = EndpointRegistry::new();
        let error = registry
            .register(probe("psu", &["get_voltage"], &[], &[]))
            .expect_err("should fail fast");
        assert!(matches!(error, RegistryError::MissingMethod { .. }));
    }

    #[test]
    fn rejects_method_in_both_capability_sets() {
        let mut registry = EndpointRegistry::new();
        let error = registry
            .register(probe(
                "psu",
                &["set_voltage"],
                &["set_voltage"],
                &["set_voltage"],
            ))
            .expect_err("should reject ambiguity");
        assert!(matches!(error, RegistryError::AmbiguousMethod { .. }));
    }

    #[test]
    fn rejects_reserved_method_names() {
        let mut registry = EndpointRegistry::new();
        let error = registry
            .register(probe(
                "psu",
                &["claim_operator"],
                &[],
                &["claim_operator"],
            ))
            .expect_err("should reject reserved name");
        assert!(matches!(error, RegistryError::ReservedMethod { .. }));

        let error = registry
            .register(probe("aux", &["is_dummy"], &[], &["is_dummy"]))
            .expect_err("should reject implicit telemetry name");
        assert!(matches!(error, RegistryError::ReservedMethod { .. }));
    }
}
