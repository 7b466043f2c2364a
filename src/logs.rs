//! Logging setup.
use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevelArg;

/// Installs the global `tracing` subscriber.
///
/// An explicit `level` wins over `RUST_LOG`; without either the filter is `info`.
/// Output goes to stdout, which a daemonized supervisor has pointed at its log
/// file.
pub fn init_logging(level: Option<LogLevelArg>, ansi: bool) {
    let filter = if let Some(level) = level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();
}

/// Span wrapping every supervisor log line, carrying the operator's prefix.
pub fn supervisor_span(prefix: Option<&str>) -> Span {
    match prefix {
        Some(prefix) => tracing::info_span!("keepup", prefix = %prefix),
        None => tracing::info_span!("keepup"),
    }
}
