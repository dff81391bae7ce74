//! File-based tracing for the hook binary.
//!
//! The hook's stderr belongs to the coding agent, so diagnostics go to a
//! rolling file under the flightdeck log directory instead.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes tracing to `<logs>/hook.log`. The returned guard must stay
/// alive for the life of the process so buffered lines get flushed.
pub fn init() -> Option<WorkerGuard> {
    let logs_dir = flightdeck_core::config::logs_dir();

    let debug_enabled = std::env::var("FLIGHTDECK_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let appender = tracing_appender::rolling::daily(logs_dir, "hook.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    if result.is_err() {
        // A subscriber is already set (tests); keep going without one
        return None;
    }

    Some(guard)
}
