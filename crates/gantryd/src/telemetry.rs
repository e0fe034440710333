//! Daemon log output through `tracing`.
//!
//! Logs go to stderr; the filter expression and the output format (compact
//! for a human at a terminal, JSON for log shippers) come from the loaded
//! configuration. The subscriber is installed once per process, so several
//! daemon instances embedded in one test binary share the first
//! configuration that arrives.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use gantry_config::{Config, LogFormat};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Errors raised while installing the log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("log filter {spec:?} is invalid: {source}")]
    Filter {
        spec: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// Another subscriber already owns the global default.
    #[error("cannot install log subscriber: {0}")]
    Install(#[from] SetGlobalDefaultError),
}

/// Installs the global subscriber on the first call; later calls are no-ops.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or installation
/// fails.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    INSTALLED.get_or_try_init(|| install(config)).map(|_| ())
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|source| TelemetryError::Filter {
            spec: config.log_filter().to_string(),
            source,
        })?;

    let base = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        // Colour only when a human is watching.
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    match config.log_format() {
        LogFormat::Json => {
            let subscriber = base.json().flatten_event(true).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Compact => {
            let subscriber = base.compact().finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
