//! Daemon bootstrap orchestration.
//!
//! Sequence: initialise telemetry, prepare the socket filesystem, build and
//! configure the endpoint registry from the driver sections of the
//! configuration, then start the listener serving the dispatcher. Every
//! failure along the way is fatal to startup and reported with its cause.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use gantry_config::{Config, SocketDirError};

use crate::dispatch::{
    CallConnectionHandler, DiagnosticRelay, Dispatcher, DispatcherHandle, EndpointRegistry,
    RegistryError,
};
use crate::endpoints::{
    CallArgs, CameraEndpoint, DrsEndpoint, Endpoint, EndpointError, HvlvEndpoint, MotionEndpoint,
    PowerSupplyEndpoint, SenAuxEndpoint,
};
use crate::telemetry::{self, TelemetryError};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        #[source]
        source: TelemetryError,
    },
    /// Socket filesystem preparation failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        #[source]
        source: SocketDirError,
    },
    /// Endpoint registration was rejected.
    #[error("failed to register endpoint: {source}")]
    Registry {
        #[source]
        source: RegistryError,
    },
    /// A driver section failed to apply during startup initialisation.
    #[error("failed to initialise endpoint [{endpoint}]: {source}")]
    Driver {
        endpoint: String,
        #[source]
        source: EndpointError,
    },
    /// The listener could not bind or start.
    #[error("failed to start listener: {source}")]
    Listener {
        #[source]
        source: ListenerError,
    },
}

/// Bootstraps the daemon and starts serving connections.
///
/// Returns the listener handle; the caller decides whether to join it or
/// keep it alive alongside other work.
///
/// # Errors
///
/// Returns [`BootstrapError`] when any startup stage fails.
pub fn bootstrap(config: &Config) -> Result<ListenerHandle, BootstrapError> {
    telemetry::initialise(config).map_err(|source| BootstrapError::Telemetry { source })?;

    config
        .listen
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let registry = build_registry(config)?;
    info!(
        target: BOOTSTRAP_TARGET,
        endpoints = registry.len(),
        listen = %config.listen,
        "starting control daemon"
    );

    let dispatcher = DispatcherHandle::new(Dispatcher::new(registry));
    let handler = Arc::new(CallConnectionHandler::new(dispatcher));
    let listener =
        SocketListener::bind(&config.listen).map_err(|source| BootstrapError::Listener { source })?;
    listener
        .start(handler)
        .map_err(|source| BootstrapError::Listener { source })
}

/// Builds the endpoint registry, applying configured driver sections.
///
/// Endpoints without a driver section stay unconfigured; they register but
/// answer `NotReady` until a client runs `reset_devices`.
///
/// # Errors
///
/// Returns [`BootstrapError`] when a driver section fails to apply or
/// registration is rejected.
pub fn build_registry(config: &Config) -> Result<EndpointRegistry, BootstrapError> {
    let endpoints: Vec<Box<dyn Endpoint>> = vec![
        Box::new(CameraEndpoint::new()),
        Box::new(DrsEndpoint::new()),
        Box::new(MotionEndpoint::new()),
        Box::new(HvlvEndpoint::new()),
        Box::new(SenAuxEndpoint::new()),
        Box::new(PowerSupplyEndpoint::new()),
    ];

    let relay = DiagnosticRelay::new();
    let mut registry = EndpointRegistry::new();
    for mut endpoint in endpoints {
        if let Some(section) = config.endpoint_config(endpoint.name()) {
            apply_driver_config(endpoint.as_mut(), section, &relay)?;
            info!(
                target: BOOTSTRAP_TARGET,
                endpoint = endpoint.name(),
                dummy = endpoint.is_dummy(),
                "endpoint initialised from configuration"
            );
        }
        registry
            .register(endpoint)
            .map_err(|source| BootstrapError::Registry { source })?;
        // Startup diagnostics went to the daemon log already; nothing is
        // waiting on the relay this early.
        relay.drain();
    }
    Ok(registry)
}

fn apply_driver_config(
    endpoint: &mut dyn Endpoint,
    section: &Value,
    relay: &DiagnosticRelay,
) -> Result<(), BootstrapError> {
    let args = vec![section.clone()];
    let kwargs = Map::new();
    let call = CallArgs::new(&args, &kwargs);
    endpoint
        .invoke("reset_devices", &call, relay)
        .map(|_| ())
        .map_err(|source| BootstrapError::Driver {
            endpoint: endpoint.name().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registry_contains_all_endpoints() {
        let config = Config::default();
        let registry = build_registry(&config).expect("build registry");
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, ["camera", "drs", "gantry", "hvlv", "psu", "senaux"]);
    }

    #[test]
    fn configured_endpoints_come_up_initialised() {
        let mut config = Config::default();
        config
            .endpoints
            .insert("psu".to_string(), json!({"dummy": true}));

        let mut registry = build_registry(&config).expect("build registry");
        let psu = registry.lookup_mut("psu").expect("psu registered");
        assert!(psu.is_initialized());
        assert!(psu.is_dummy());

        let camera = registry.lookup_mut("camera").expect("camera registered");
        assert!(!camera.is_initialized());
    }
}
