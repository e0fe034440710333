//! Control-process client for the gantry hardware daemon.
//!
//! A [`GantryClient`] owns one socket connection and one caller identity
//! (`hostname@pid`). Typed stubs in [`endpoints`] expose every remote method
//! under its explicit wire name. Diagnostic records the daemon attaches to a
//! response are replayed through `tracing` locally before the outcome is
//! returned, and dropping the client releases the operator lock on a
//! best-effort basis.

mod endpoints;
mod errors;
mod session;
mod transport;

pub use endpoints::{Camera, Drs, Gantry, Hvlv, PowerSupply, SenAux};
pub use errors::ClientError;
pub use session::GantryClient;
