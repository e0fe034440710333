//! Where the daemon listens.
//!
//! A control endpoint is either a unix socket path or a TCP host and port.
//! The JSON form is tagged (`{"transport": "tcp", ...}`); the textual form
//! is a URL (`tcp://bench-pi:8989`, `unix:///run/gantry/control.sock`) used
//! on the command line.

use std::fmt;
use std::fs::DirBuilder;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Control socket address shared by the daemon and its clients.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// Unix domain socket at a filesystem path.
    Unix { path: Utf8PathBuf },
    /// TCP socket on a host and port.
    Tcp { host: String, port: u16 },
}

impl SocketEndpoint {
    /// Unix socket endpoint at `path`.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// TCP endpoint on `host:port`.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Creates the unix socket's parent directory, owner-only.
    ///
    /// TCP endpoints need no filesystem preparation.
    ///
    /// # Errors
    ///
    /// Returns [`SocketDirError`] when the path has no parent directory or
    /// the directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketDirError> {
        let Self::Unix { path } = self else {
            return Ok(());
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| SocketDirError::NoParent { path: path.clone() })?;

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        match builder.create(parent.as_std_path()) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(SocketDirError::Create {
                path: parent.to_path_buf(),
                source,
            }),
        }
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "tcp" => tcp_from_url(&url),
            "unix" => unix_from_url(&url),
            scheme => Err(AddressError::Scheme {
                scheme: scheme.to_string(),
            }),
        }
    }
}

fn tcp_from_url(url: &Url) -> Result<SocketEndpoint, AddressError> {
    let host = url.host_str().ok_or(AddressError::Host)?;
    let port = url.port().ok_or(AddressError::Port)?;
    Ok(SocketEndpoint::tcp(host, port))
}

fn unix_from_url(url: &Url) -> Result<SocketEndpoint, AddressError> {
    if url.path().is_empty() {
        return Err(AddressError::Path);
    }
    Ok(SocketEndpoint::unix(url.path()))
}

/// Errors parsing a control address from its URL form.
#[derive(Debug, Error)]
pub enum AddressError {
    /// Only `tcp://` and `unix://` addresses are understood.
    #[error("unknown control address scheme {scheme:?}")]
    Scheme { scheme: String },
    /// A TCP address needs a host.
    #[error("tcp control address needs a host")]
    Host,
    /// A TCP address needs an explicit port.
    #[error("tcp control address needs an explicit port")]
    Port,
    /// A unix address needs a socket path.
    #[error("unix control address needs a socket path")]
    Path,
    /// The address was not a well-formed URL.
    #[error("control address is not a valid URL: {0}")]
    Syntax(#[from] url::ParseError),
}

/// Errors preparing the unix socket directory.
#[derive(Debug, Error)]
pub enum SocketDirError {
    /// The socket path has no parent directory to create.
    #[error("socket path {path} has no parent directory")]
    NoParent { path: Utf8PathBuf },
    /// Creating the parent directory failed.
    #[error("cannot create socket directory {path}: {source}")]
    Create {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}
