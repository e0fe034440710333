//! Remote hardware-control daemon for the gantry test stand.
//!
//! The daemon owns exclusive handles to the bench hardware and exposes them
//! over a socket as named endpoints with remotely callable methods. Requests
//! arrive as newline-delimited JSON envelopes, are processed strictly one at
//! a time, and every response carries back the diagnostic records raised
//! while it ran. Mutating methods are guarded by a single-operator lock so
//! only one control process can drive the hardware at a time, while read-only
//! telemetry stays open to all clients.

mod bootstrap;
pub mod dispatch;
pub mod endpoints;
mod telemetry;
pub mod transport;

pub use bootstrap::{BootstrapError, bootstrap, build_registry};
pub use telemetry::TelemetryError;
