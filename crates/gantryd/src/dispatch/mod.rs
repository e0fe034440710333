//! Request dispatch: registry, operator lock, diagnostics, and the
//! connection-facing handler that ties them together.

mod dispatcher;
mod handler;
mod lock;
mod registry;
mod relay;

pub use self::dispatcher::Dispatcher;
pub use self::handler::{CallConnectionHandler, DispatcherHandle};
pub use self::lock::{LockError, OperatorLock};
pub use self::registry::{EndpointRegistry, RegistryError};
pub use self::relay::{DiagnosticRelay, RELAY_CAPACITY};
