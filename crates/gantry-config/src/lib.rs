//! Configuration shared by the gantry daemon and client.
//!
//! The daemon is configured from a single JSON file given on the command
//! line. The file names the socket to listen on, the logging policy, and an
//! optional driver section per hardware endpoint. Driver sections are opaque
//! here; they are handed to the endpoint's `reset_devices` operation at
//! startup.

mod logging;
mod socket;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{AddressError, SocketDirError, SocketEndpoint};

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Socket the daemon listens on and clients connect to.
    pub listen: SocketEndpoint,
    /// Tracing filter expression, e.g. `info` or `gantryd=debug`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Driver configuration per endpoint name, applied via `reset_devices`
    /// during startup. Opaque to the dispatch core.
    #[serde(default)]
    pub endpoints: BTreeMap<String, Value>,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketEndpoint::tcp("127.0.0.1", 8989),
            log_filter: default_log_filter(),
            log_format: LogFormat::default(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Loads the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when it is not valid configuration JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Driver configuration section for the named endpoint, if present.
    #[must_use]
    pub fn endpoint_config(&self, name: &str) -> Option<&Value> {
        self.endpoints.get(name)
    }
}

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Configuration file was not valid JSON of the expected shape.
    #[error("failed to parse configuration file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
