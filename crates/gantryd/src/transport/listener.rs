//! Control socket accept loop.
//!
//! The daemon listens on one configured endpoint and serves each accepted
//! connection on its own thread. The accept socket runs non-blocking and is
//! polled, so a shutdown request takes effect within one poll interval
//! instead of hanging in `accept`. A unix socket file left behind by a
//! crashed daemon is reclaimed at bind time after probing that nothing
//! answers on it; a live socket or a foreign file at the path refuses the
//! bind.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use gantry_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const FAULT_BACKOFF: Duration = Duration::from_millis(200);

/// Control socket bound to the configured endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    socket: AcceptSocket,
}

#[derive(Debug)]
enum AcceptSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl AcceptSocket {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Accepts one pending connection, or `None` when nothing is waiting.
    fn poll(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().map(|(stream, _)| ConnectionStream::Tcp(stream)),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().map(|(stream, _)| ConnectionStream::Unix(stream)),
        };
        match accepted {
            Ok(stream) => {
                stream.set_blocking()?;
                Ok(Some(stream))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

impl SocketListener {
    /// Binds the configured control endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when resolution or binding fails, or when
    /// the configured unix socket path cannot be claimed.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let socket = match endpoint {
            SocketEndpoint::Tcp { host, port } => AcceptSocket::Tcp(bind_tcp(host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => AcceptSocket::Unix(bind_unix(path.as_str())?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => return Err(ListenerError::UnixUnsupported),
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Address actually bound, for TCP endpoints.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            AcceptSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            AcceptSocket::Unix(_) => None,
        }
    }

    /// Moves the listener onto a background accept thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Configure`] when the accept socket cannot be
    /// switched into polling mode; the socket file is removed in that case.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.socket.set_nonblocking() {
            self.remove_socket_file();
            return Err(ListenerError::Configure(source));
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let thread = thread::spawn(move || self.accept_until(&stop, handler));
        Ok(ListenerHandle {
            shutdown,
            thread: Some(thread),
        })
    }

    fn accept_until(self, stop: &AtomicBool, handler: Arc<dyn ConnectionHandler>) {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "control socket open"
        );
        let mut muted = None::<io::ErrorKind>;
        while !stop.load(Ordering::SeqCst) {
            match self.socket.poll() {
                Ok(Some(stream)) => {
                    muted = None;
                    debug!(target: LISTENER_TARGET, "control connection accepted");
                    let handler = Arc::clone(&handler);
                    thread::spawn(move || handler.handle(stream));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(error) => {
                    // A persistent fault would otherwise flood the log.
                    if muted != Some(error.kind()) {
                        warn!(
                            target: LISTENER_TARGET,
                            %error,
                            "accept failed on control socket"
                        );
                        muted = Some(error.kind());
                    }
                    thread::sleep(FAULT_BACKOFF);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.endpoint,
            "control socket closed"
        );
        self.remove_socket_file();
    }

    #[cfg(unix)]
    fn remove_socket_file(&self) {
        if let SocketEndpoint::Unix { path } = &self.endpoint
            && let Err(error) = std::fs::remove_file(path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: LISTENER_TARGET,
                %error,
                path = %path,
                "leaving control socket file behind"
            );
        }
    }

    #[cfg(not(unix))]
    fn remove_socket_file(&self) {}
}

/// Owner handle for the accept thread.
pub struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to wind down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Blocks until the accept loop has exited.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::AcceptPanic`] when the thread panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ListenerError::AcceptPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let label = format!("{host}:{port}");
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            endpoint: label.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::NoAddress {
            endpoint: label.clone(),
        })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind {
        endpoint: label,
        source,
    })
}

#[cfg(unix)]
fn bind_unix(path: &str) -> Result<UnixListener, ListenerError> {
    use std::os::unix::fs::FileTypeExt;

    let reclaim_error = |source| ListenerError::Reclaim {
        path: path.to_string(),
        source,
    };

    match std::fs::symlink_metadata(path) {
        Ok(metadata) => {
            if !metadata.file_type().is_socket() {
                return Err(ListenerError::PathOccupied {
                    path: path.to_string(),
                });
            }
            // Probe the leftover socket: an answer means a live daemon.
            match UnixStream::connect(path) {
                Ok(_) => {
                    return Err(ListenerError::AlreadyServing {
                        path: path.to_string(),
                    });
                }
                Err(error)
                    if matches!(
                        error.kind(),
                        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                    ) =>
                {
                    std::fs::remove_file(path).map_err(reclaim_error)?;
                }
                Err(source) => return Err(reclaim_error(source)),
            }
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(reclaim_error(source)),
    }

    UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        endpoint: format!("unix://{path}"),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;
    use std::sync::mpsc;

    use super::*;

    struct SignallingHandler {
        accepted: mpsc::Sender<()>,
    }

    impl ConnectionHandler for SignallingHandler {
        fn handle(&self, _stream: ConnectionStream) {
            let _ = self.accepted.send(());
        }
    }

    fn start_on(
        endpoint: &SocketEndpoint,
    ) -> (ListenerHandle, mpsc::Receiver<()>, Option<SocketAddr>) {
        let listener = SocketListener::bind(endpoint).expect("bind listener");
        let addr = listener.local_addr();
        let (accepted, connections) = mpsc::channel();
        let handle = listener
            .start(Arc::new(SignallingHandler { accepted }))
            .expect("start listener");
        (handle, connections, addr)
    }

    #[test]
    fn tcp_socket_serves_every_client() {
        let (handle, connections, addr) = start_on(&SocketEndpoint::tcp("127.0.0.1", 0));
        let addr = addr.expect("tcp address");

        let _first = TcpStream::connect(addr).expect("connect first client");
        let _second = TcpStream::connect(addr).expect("connect second client");

        for _ in 0..2 {
            connections
                .recv_timeout(Duration::from_secs(2))
                .expect("connection should reach the handler");
        }
        handle.shutdown();
        handle.join().expect("join accept thread");
    }

    #[cfg(unix)]
    #[test]
    fn abandoned_socket_file_is_reclaimed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("control.sock");
        drop(UnixListener::bind(&path).expect("bind stale listener"));
        assert!(path.exists(), "stale socket file should remain");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let (handle, connections, _) = start_on(&endpoint);

        UnixStream::connect(&path).expect("connect to reclaimed socket");
        connections
            .recv_timeout(Duration::from_secs(2))
            .expect("connection should reach the handler");

        handle.shutdown();
        handle.join().expect("join accept thread");
        assert!(!path.exists(), "socket file removed on shutdown");
    }

    #[cfg(unix)]
    #[test]
    fn live_socket_is_not_stolen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("control.sock");
        let _live = UnixListener::bind(&path).expect("bind live listener");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let error = SocketListener::bind(&endpoint).expect_err("bind should refuse");
        assert!(matches!(error, ListenerError::AlreadyServing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn foreign_file_at_the_socket_path_refuses_the_bind() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("control.sock");
        std::fs::write(&path, b"not a socket").expect("write file");

        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        let error = SocketListener::bind(&endpoint).expect_err("bind should refuse");
        assert!(matches!(error, ListenerError::PathOccupied { .. }));
        assert!(path.exists(), "the foreign file is left alone");
    }
}
