//! flightdeck-hook: lifecycle-event handler for Flightdeck session tracking.
//!
//! Invoked once per hook event by the coding agent; reads the event
//! document from stdin and updates the PID-keyed session record.
//!
//! Must never block or fail the caller: every internal failure is logged
//! and the process still exits 0.

mod handle;
mod logging;

use clap::Parser;

#[derive(Parser)]
#[command(name = "flightdeck-hook")]
#[command(about = "Flightdeck session state tracker")]
#[command(version)]
struct Cli {
    /// Hook event name (SessionStart, UserPromptSubmit, PreToolUse,
    /// PostToolUse, Stop, Notification, PermissionRequest, PreCompact,
    /// SessionEnd)
    #[arg(value_name = "HOOK_NAME")]
    hook_name: String,
}

fn main() {
    let _logging_guard = logging::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                let _ = e.print();
            } else {
                // Exit 0 even on a bad invocation: the caller must never
                // see this hook fail
                flightdeck_core::hooklog::log_error(
                    &flightdeck_core::config::logs_dir(),
                    &format!("bad invocation: {}", e),
                );
            }
            return;
        }
    };

    if let Err(e) = handle::run(&cli.hook_name) {
        tracing::error!(hook = %cli.hook_name, error = %e, "hook handling failed");
        flightdeck_core::hooklog::log_error(
            &flightdeck_core::config::logs_dir(),
            &format!("{}: {}", cli.hook_name, e),
        );
    }
    // Exit 0 unconditionally so the caller is never blocked or failed
}
