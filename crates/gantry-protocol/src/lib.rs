//! Wire protocol shared by the gantry daemon and its clients.
//!
//! One message is one envelope: clients send a [`CallRequest`] naming a
//! hardware endpoint and a method, the daemon answers with a single
//! [`CallResponse`] carrying buffered diagnostics plus either a return value
//! or an [`ErrorInfo`]. Envelopes travel as JSONL, one line per message, in
//! strict request/response order. The reader tolerates peers that write
//! several request lines in one burst: excess bytes wait their turn instead
//! of being dropped.

mod envelope;
mod error;
mod frame;
mod log;

pub use envelope::{CallRequest, CallResponse, EnvelopeError, MAX_ENVELOPE_BYTES, Outcome};
pub use error::{ErrorInfo, ErrorKind};
pub use frame::EnvelopeReader;
pub use log::{LogRecord, Severity};
