//! Logging setup.
//!
//! Diagnostics go to stderr through a global tracing subscriber so they never
//! mix with table output on stdout. The level comes from `PARKMON_LOG`
//! (an `EnvFilter` directive such as `debug` or `parkmon::poller=trace`).

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the filter directive
pub const LOG_ENV: &str = "PARKMON_LOG";

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid {LOG_ENV} directive: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
///
/// `quiet` lowers the default level to `error`; watch mode uses it so log
/// lines do not tear through the redrawn screen. An explicit `PARKMON_LOG`
/// always wins.
pub fn init(quiet: bool) -> Result<(), LoggingError> {
    let filter = build_env_filter(std::env::var(LOG_ENV).ok().as_deref(), quiet)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

fn default_directive(quiet: bool) -> &'static str {
    if quiet { "error" } else { "warn" }
}

fn build_env_filter(directive: Option<&str>, quiet: bool) -> Result<EnvFilter, LoggingError> {
    match directive.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directive) => Ok(EnvFilter::try_new(directive)?),
        None => Ok(EnvFilter::new(default_directive(quiet))),
    }
}
