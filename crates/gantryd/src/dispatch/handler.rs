//! Connection handler serving call envelopes against a shared dispatcher.
//!
//! Connections are long-lived: the handler loops reading one envelope line at
//! a time, dispatching it, and writing back exactly one response line, until
//! the peer disconnects. Requests from all connections funnel through one
//! dispatcher under a mutex, so the server processes one call at a time and
//! endpoint drivers never see concurrent invocations.

use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use gantry_protocol::{CallRequest, CallResponse, EnvelopeReader};

use super::dispatcher::{DISPATCH_TARGET, Dispatcher};
use crate::transport::{ConnectionHandler, ConnectionStream};

/// Cloneable, thread-safe handle to the single dispatcher instance.
#[derive(Clone)]
pub struct DispatcherHandle {
    inner: Arc<Mutex<Dispatcher>>,
}

impl DispatcherHandle {
    /// Wraps a dispatcher for shared access from connection threads.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dispatcher)),
        }
    }

    /// Dispatches one request under the serialisation lock.
    ///
    /// A poisoned lock is recovered rather than propagated: the dispatcher
    /// holds no invariant a panicked request could have broken half-way,
    /// since every state transition completes before control returns.
    pub fn handle_request(&self, request: &CallRequest) -> CallResponse {
        let mut dispatcher = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        dispatcher.handle(request)
    }
}

/// Connection handler that serves call envelopes over one stream.
pub struct CallConnectionHandler {
    dispatcher: DispatcherHandle,
}

impl CallConnectionHandler {
    /// Creates a handler serving requests through `dispatcher`.
    #[must_use]
    pub fn new(dispatcher: DispatcherHandle) -> Self {
        Self { dispatcher }
    }

    fn serve(&self, mut stream: ConnectionStream) {
        let mut reader = EnvelopeReader::new();
        loop {
            let line = match reader.next_line(&mut stream) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(target: DISPATCH_TARGET, "client disconnected");
                    return;
                }
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, %error, "failed to read request");
                    // Oversized or unreadable input leaves the stream
                    // unsynchronised; report once and drop the connection.
                    let response = CallResponse::error(Vec::new(), error.to_error_info());
                    let _ = write_response(&mut stream, &response);
                    return;
                }
            };

            let response = match CallRequest::decode(&line) {
                Ok(request) => self.dispatcher.handle_request(&request),
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, %error, "malformed request");
                    CallResponse::error(Vec::new(), error.to_error_info())
                }
            };

            if let Err(error) = write_response(&mut stream, &response) {
                warn!(target: DISPATCH_TARGET, %error, "failed to write response");
                return;
            }
        }
    }
}

impl ConnectionHandler for CallConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.serve(stream);
    }
}

fn write_response(
    stream: &mut ConnectionStream,
    response: &CallResponse,
) -> Result<(), std::io::Error> {
    let line = response
        .encode()
        .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error))?;
    let mut writer = BufWriter::new(stream);
    writer.write_all(&line)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    use gantry_protocol::{ErrorKind, Outcome};

    use crate::dispatch::{DiagnosticRelay, EndpointRegistry};
    use crate::endpoints::{CallArgs, Endpoint, EndpointError};

    use super::*;

    struct EchoEndpoint;

    impl Endpoint for EchoEndpoint {
        fn name(&self) -> &str {
            "echo"
        }

        fn telemetry_methods(&self) -> &'static [&'static str] {
            &["ping"]
        }

        fn operation_methods(&self) -> &'static [&'static str] {
            &[]
        }

        fn is_initialized(&self) -> bool {
            true
        }

        fn supports(&self, method: &str) -> bool {
            method == "ping"
        }

        fn invoke(
            &mut self,
            _method: &str,
            _call: &CallArgs<'_>,
            _relay: &DiagnosticRelay,
        ) -> Result<Value, EndpointError> {
            Ok(json!("pong"))
        }
    }

    #[fixture]
    fn dispatcher_handle() -> DispatcherHandle {
        let mut registry = EndpointRegistry::new();
        registry
            .register(Box::new(EchoEndpoint))
            .expect("register echo");
        DispatcherHandle::new(Dispatcher::new(registry))
    }

    struct HandlerTestHarness {
        client: TcpStream,
        server_handle: JoinHandle<()>,
    }

    impl HandlerTestHarness {
        fn send(&mut self, request: &[u8]) -> CallResponse {
            self.client.write_all(request).expect("write request");
            self.client.flush().expect("flush");

            let mut reader = BufReader::new(&mut self.client);
            let mut line = String::new();
            reader.read_line(&mut line).expect("read response");
            CallResponse::decode(line.as_bytes()).expect("decode response")
        }

        fn close_and_join(self) {
            drop(self.client);
            self.server_handle.join().expect("server join");
        }
    }

    fn create_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        (listener, addr)
    }

    #[fixture]
    fn harness(dispatcher_handle: DispatcherHandle) -> HandlerTestHarness {
        let (listener, addr) = create_listener();

        let server_handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            CallConnectionHandler::new(dispatcher_handle).handle(ConnectionStream::Tcp(stream));
        });

        let client = TcpStream::connect(addr).expect("connect");
        HandlerTestHarness {
            client,
            server_handle,
        }
    }

    #[rstest]
    fn handler_serves_multiple_requests_per_connection(mut harness: HandlerTestHarness) {
        let request = CallRequest::new("tester@1", "echo", "ping")
            .encode()
            .expect("encode");

        for _ in 0..3 {
            let response = harness.send(&request);
            assert!(matches!(
                response.outcome,
                Outcome::Result(Value::String(ref s)) if s == "pong"
            ));
        }

        harness.close_and_join();
    }

    #[rstest]
    fn handler_rejects_malformed_json_and_keeps_serving(mut harness: HandlerTestHarness) {
        let response = harness.send(b"not valid json\n");
        match response.outcome {
            Outcome::Error(error) => assert_eq!(error.kind, ErrorKind::Protocol),
            Outcome::Result(value) => panic!("expected protocol error, got {value}"),
        }

        // The connection survives a malformed line.
        let request = CallRequest::new("tester@1", "echo", "ping")
            .encode()
            .expect("encode");
        let response = harness.send(&request);
        assert!(!response.is_error());

        harness.close_and_join();
    }

    #[rstest]
    fn requests_batched_into_one_write_are_all_served(mut harness: HandlerTestHarness) {
        let mut batch = CallRequest::new("tester@1", "echo", "ping")
            .encode()
            .expect("encode first");
        batch.extend(
            CallRequest::new("tester@2", "echo", "ping")
                .encode()
                .expect("encode second"),
        );
        harness.client.write_all(&batch).expect("write batch");
        harness.client.flush().expect("flush");

        let mut reader = BufReader::new(&mut harness.client);
        for _ in 0..2 {
            let mut line = String::new();
            reader.read_line(&mut line).expect("read response");
            let response = CallResponse::decode(line.as_bytes()).expect("decode response");
            assert!(!response.is_error());
        }

        harness.close_and_join();
    }

    #[rstest]
    fn handler_reports_unknown_endpoint(mut harness: HandlerTestHarness) {
        let request = CallRequest::new("tester@1", "nonesuch", "ping")
            .encode()
            .expect("encode");
        let response = harness.send(&request);
        match response.outcome {
            Outcome::Error(error) => assert_eq!(error.kind, ErrorKind::NotFound),
            Outcome::Result(value) => panic!("expected not_found error, got {value}"),
        }

        harness.close_and_join();
    }
}
